//! Chartproxy Repository Resolution
//!
//! This crate answers three questions for a chart install request:
//!
//! - **Which chart?** [`RepositoryResolver`] maps a chart download URL (or an
//!   opaque `<chart>--<repository>` index token) to a [`ChartInfo`].
//! - **How to reach the repository?** [`ConnectionConfigResolver`] finds the
//!   namespace-scoped or cluster-scoped registration and returns its
//!   [`RepositoryConnection`].
//! - **With which credentials?** [`CredentialProvisioner`] turns the secret and
//!   config references of a connection into short-lived local files.
//!
//! All cluster access goes through the narrow [`RepositoryStore`],
//! [`SecretStore`], and [`IndexSource`] traits, so everything here runs
//! against the in-memory fakes in [`mock`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chartproxy_repo::{ConnectionConfigResolver, CredentialProvisioner};
//! use chartproxy_repo::mock::{MockRepositoryStore, MockSecretStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repositories = Arc::new(MockRepositoryStore::new());
//! let secrets = Arc::new(MockSecretStore::new());
//!
//! let connection = ConnectionConfigResolver::new(repositories)
//!     .resolve("myrepo", "team-a")
//!     .await?;
//! let files = CredentialProvisioner::new(secrets, "openshift-config")
//!     .provision(&connection, "team-a")
//!     .await?;
//!
//! // ... hand files.cert_file() / key_file() / ca_file() to the fetcher ...
//! files.dispose()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ChartInfo`]: chartproxy_core::ChartInfo

pub mod connection;
pub mod credentials;
pub mod error;
pub mod http;
pub mod index;
pub mod mock;
pub mod repository;
pub mod resolver;
pub mod store;

// Re-exports for convenience
pub use connection::ConnectionConfigResolver;
pub use credentials::{
    CA_BUNDLE_KEY, CredentialFiles, CredentialProvisioner, TLS_CERT_KEY, TLS_KEY_KEY,
};
pub use error::{BoxError, RepoError, Result};
pub use http::HttpIndexSource;
pub use index::{ChartVersion, RepositoryIndex};
pub use repository::{
    ConnectionConfig, ConnectionConfigNamespaceScoped, HelmChartRepository,
    HelmChartRepositorySpec, ObjectReference, ProjectHelmChartRepository,
    ProjectHelmChartRepositorySpec, RegisteredRepository, RepositoryConnection, RepositoryScope,
};
pub use resolver::{
    INDEX_ENTRY_SEPARATOR, RepositoryResolver, find_chart_version, parse_index_entry,
    resolve_index_entry,
};
pub use store::{IndexSource, ObjectKind, RepositoryStore, SecretStore, StoreError};
