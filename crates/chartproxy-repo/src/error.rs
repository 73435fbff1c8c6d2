//! Error types for repository resolution and credential provisioning

use thiserror::Error;

use crate::store::{ObjectKind, StoreError};

/// Boxed error from an external collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Repository resolution errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Resolution Errors ============
    #[error("repository '{name}' not found in namespace '{namespace}' or at cluster scope")]
    RepositoryNotFound {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("could not find a repository for the chart url {url:?} in namespace {namespace:?}")]
    ChartNotFoundInIndex { url: String, namespace: String },

    #[error("error listing repositories in namespace {namespace:?}")]
    RepositoryList {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("error producing the index file of repository {repository:?}{}", in_namespace(.namespace))]
    IndexFetch {
        repository: String,
        namespace: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("connection config of repository '{name}' is unusable: {reason}")]
    ConnectionConfigUnresolvable { name: String, reason: String },

    #[error("invalid index entry {entry:?}, expected '<chart>--<repository>'")]
    InvalidIndexEntry { entry: String },

    #[error("no chart version found in the file name of {url:?}")]
    VersionNotDerivable { url: String },

    // ============ Credential Errors ============
    #[error("failed to get secret '{name}' from namespace '{namespace}'")]
    SecretNotFound {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to get configmap '{name}' from namespace '{namespace}'")]
    ConfigNotFound {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to find '{key}' key in {kind} {object}")]
    MissingKey {
        key: String,
        kind: ObjectKind,
        object: String,
    },

    #[error("failed to write {kind} file")]
    CredentialFile {
        kind: &'static str,
        #[source]
        source: std::io::Error,
    },

    // ============ Index Errors ============
    #[error("index parse error: {message}")]
    IndexParse { message: String },

    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid repository URL {url:?}: {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

fn in_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace {:?}", ns),
        None => String::new(),
    }
}

impl RepoError {
    /// Whether the error originates from a missing cluster object
    pub fn is_not_found(&self) -> bool {
        match self {
            RepoError::RepositoryNotFound { .. } | RepoError::ChartNotFoundInIndex { .. } => true,
            RepoError::SecretNotFound { source, .. } | RepoError::ConfigNotFound { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            RepoError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::Network {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::IndexParse {
            message: e.to_string(),
        }
    }
}
