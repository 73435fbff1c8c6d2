//! Chartproxy Kube - cluster integration and chart actions
//!
//! This crate provides:
//! - **Chart Actions**: fetch and install charts from registered repositories
//! - **Cluster Stores**: repository registrations, secrets, and config maps read through `kube`
//! - **Packaging Seam**: the narrow interface to the chart toolchain
//! - **Settings**: explicit packaging client configuration
//! - **Metrics**: install usage events

pub mod actions;
pub mod client;
pub mod error;
pub mod metrics;
pub mod packaging;
pub mod settings;

pub use actions::{ChartActions, ChartRequest, FetchedChart, InstallRequest, InstalledChart};
pub use client::{KubeRepositoryStore, KubeSecretStore};
pub use error::{ActionError, Result};
pub use metrics::{InstallCounter, MetricsSink};
pub use packaging::{ChartPathOptions, InstallTarget, PackagingClient};
pub use settings::{DEFAULT_SYSTEM_NAMESPACE, Settings};
