//! Error types for chartproxy-kube

use std::path::PathBuf;

use chartproxy_repo::{BoxError, RepoError};
use thiserror::Error;

/// Result type for chart fetch and install operations
pub type Result<T> = std::result::Result<T, ActionError>;

/// Errors that can occur while fetching or installing a chart
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActionError {
    /// Resolution or credential provisioning failed
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// The packaging client could not locate the chart archive
    #[error("error locating chart '{chart}'")]
    ChartLocate {
        chart: String,
        #[source]
        source: BoxError,
    },

    /// The chart archive could not be loaded
    #[error("failed to load chart from {}", path.display())]
    BundleLoadFailure {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The install collaborator rejected the release
    #[error("failed to install release '{release}' in namespace '{namespace}'")]
    InstallFailure {
        release: String,
        namespace: String,
        #[source]
        source: BoxError,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for ActionError {
    fn from(e: serde_yaml::Error) -> Self {
        ActionError::Serialization(e.to_string())
    }
}

impl ActionError {
    /// Check if the failure comes from a missing cluster object
    pub fn is_not_found(&self) -> bool {
        match self {
            ActionError::Repo(e) => e.is_not_found(),
            _ => false,
        }
    }
}
