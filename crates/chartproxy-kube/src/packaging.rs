//! Packaging client seam
//!
//! Chart archive retrieval, loading, and release installation belong to the
//! packaging toolchain. This module only shapes the requests handed to it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use chartproxy_core::{Chart, Release, Values};
use chartproxy_repo::{BoxError, CredentialFiles};

use crate::settings::Settings;

/// Where and how the packaging client should look for a chart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartPathOptions {
    /// Repository to resolve the chart name against
    pub repo_url: Option<String>,
    /// Exact chart version
    pub version: Option<String>,
    /// TLS client certificate file
    pub cert_file: Option<PathBuf>,
    /// TLS client key file
    pub key_file: Option<PathBuf>,
    /// CA bundle file
    pub ca_file: Option<PathBuf>,
}

impl ChartPathOptions {
    /// Point the lookup at a repository and version
    pub fn for_repository(repo_url: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            repo_url: Some(repo_url.into()),
            version: Some(version.into()).filter(|v: &String| !v.is_empty()),
            ..Default::default()
        }
    }

    /// Use the provisioned credential files for the download
    pub fn apply_credentials(&mut self, files: &CredentialFiles) {
        self.cert_file = files.cert_file().map(Path::to_path_buf);
        self.key_file = files.key_file().map(Path::to_path_buf);
        self.ca_file = files.ca_file().map(Path::to_path_buf);
    }
}

/// Install destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub namespace: String,
    pub release_name: String,
}

/// The packaging toolchain as seen by chart actions
#[async_trait]
pub trait PackagingClient: Send + Sync {
    /// Download or find the chart archive and return its local path
    ///
    /// `chart` is a chart name when `options.repo_url` is set and a URL or
    /// path otherwise.
    async fn locate_chart(
        &self,
        chart: &str,
        options: &ChartPathOptions,
        settings: &Settings,
    ) -> Result<PathBuf, BoxError>;

    /// Load a chart archive into memory
    async fn load(&self, path: &Path) -> Result<Chart, BoxError>;

    /// Install a loaded chart as a new release
    async fn install(
        &self,
        chart: Chart,
        target: &InstallTarget,
        values: Values,
    ) -> Result<Release, BoxError>;
}
