//! Narrow interfaces onto the cluster object stores
//!
//! Resolution only ever needs get-by-name, get-by-name-and-namespace, and
//! list-by-namespace. Implementations must be Send + Sync so one store can
//! serve concurrent requests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::error::BoxError;
use crate::index::RepositoryIndex;
use crate::repository::{HelmChartRepository, ProjectHelmChartRepository, RegisteredRepository};

/// Kind of cluster object a lookup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    HelmChartRepository,
    ProjectHelmChartRepository,
    Secret,
    ConfigMap,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HelmChartRepository => "helmchartrepository",
            Self::ProjectHelmChartRepository => "projecthelmchartrepository",
            Self::Secret => "secret",
            Self::ConfigMap => "configmap",
        };
        write!(f, "{}", s)
    }
}

/// Store lookup failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{name}' not found{}", namespace_suffix(.namespace))]
    NotFound {
        kind: ObjectKind,
        name: String,
        namespace: Option<String>,
    },

    #[error("{kind} '{name}' could not be decoded: {message}")]
    Decode {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    #[error("store backend error: {0}")]
    Backend(#[source] BoxError),
}

fn namespace_suffix(namespace: &Option<String>) -> String {
    namespace
        .as_deref()
        .map(|ns| format!(" in namespace '{}'", ns))
        .unwrap_or_default()
}

impl StoreError {
    /// Build a not-found error
    pub fn not_found(kind: ObjectKind, name: impl Into<String>, namespace: Option<&str>) -> Self {
        StoreError::NotFound {
            kind,
            name: name.into(),
            namespace: namespace.map(str::to_string),
        }
    }

    /// Check if the object simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Lookup of chart repository registrations
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Get a namespace-scoped repository by name
    async fn get_project_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ProjectHelmChartRepository, StoreError>;

    /// Get a cluster-scoped repository by name
    async fn get_cluster_repository(&self, name: &str) -> Result<HelmChartRepository, StoreError>;

    /// List namespace-scoped repositories in listing order
    async fn list_project_repositories(
        &self,
        namespace: &str,
    ) -> Result<Vec<ProjectHelmChartRepository>, StoreError>;

    /// List cluster-scoped repositories in listing order
    async fn list_cluster_repositories(&self) -> Result<Vec<HelmChartRepository>, StoreError>;
}

/// Lookup of secret-like and config-like objects as key to bytes maps
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a secret's data
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError>;

    /// Get a config map's data
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError>;
}

/// Retrieval of a repository's chart index
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Fetch the current index of a registered repository
    async fn fetch_index(&self, repository: &RegisteredRepository)
    -> Result<RepositoryIndex, BoxError>;
}
