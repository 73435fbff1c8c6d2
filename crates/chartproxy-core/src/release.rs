//! Install results reported by the packaging client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chart::ChartMetadata;
use crate::values::Values;

/// A release produced by an install
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Release name
    pub name: String,

    /// Kubernetes namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Current status
    pub status: ReleaseStatus,

    /// Chart metadata at install time
    #[serde(default)]
    pub chart: Option<ChartMetadata>,

    /// Values used for this release
    #[serde(default)]
    pub values: Values,

    /// Rendered notes
    #[serde(default)]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Create a first-revision release for a fresh install
    pub fn installed(
        name: impl Into<String>,
        namespace: impl Into<String>,
        chart: Option<ChartMetadata>,
        values: Values,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            revision: 1,
            status: ReleaseStatus::Deployed,
            chart,
            values,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

/// Release status
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ReleaseStatus {
    #[default]
    Unknown,
    Deployed,
    Failed,
    PendingInstall,
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::PendingInstall => "pending-install",
        };
        write!(f, "{}", s)
    }
}
