//! Chart fetch and install orchestration
//!
//! Both actions run the same strictly sequential pipeline:
//!
//! 1. Identify the chart (by URL scan or by index token)
//! 2. Resolve the repository's connection config
//! 3. Provision credential files
//! 4. Locate and load the chart through the packaging client
//!
//! Install then stamps the chart with its origin URL, runs the install, and
//! records a usage event. Any failure ends the request; credential files
//! written by a failed request are removed before the error is returned.

use std::path::PathBuf;
use std::sync::Arc;

use chartproxy_core::{CHART_URL_ANNOTATION, Chart, ChartInfo, Release, Values};
use chartproxy_repo::{
    ConnectionConfigResolver, CredentialFiles, CredentialProvisioner, HttpIndexSource,
    IndexSource, RepositoryResolver, RepositoryStore, SecretStore,
};

use crate::client::{KubeRepositoryStore, KubeSecretStore};
use crate::error::{ActionError, Result};
use crate::metrics::{InstallCounter, MetricsSink};
use crate::packaging::{ChartPathOptions, InstallTarget, PackagingClient};
use crate::settings::Settings;

/// A chart to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartRequest {
    /// Chart archive download URL
    pub url: String,

    /// Namespace the request is made from; empty fetches `url` directly
    pub namespace: String,

    /// `<chart>--<repository>` token; URL scanning is used when absent
    pub index_entry: Option<String>,

    /// Remove credential files once the action has finished with them
    pub cleanup_files: bool,
}

impl ChartRequest {
    /// Create a request with cleanup enabled
    pub fn new(url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            index_entry: None,
            cleanup_files: true,
        }
    }

    /// Identify the chart by index token
    pub fn with_index_entry(mut self, entry: impl Into<String>) -> Self {
        self.index_entry = Some(entry.into());
        self
    }

    /// Keep credential files and hand them to the caller
    pub fn keep_files(mut self) -> Self {
        self.cleanup_files = false;
        self
    }
}

/// A chart to install
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Chart to fetch; its namespace is also the install namespace
    pub chart: ChartRequest,
    /// Release name
    pub release_name: String,
    /// User-supplied values
    pub values: Values,
}

impl InstallRequest {
    /// Create an install request
    pub fn new(chart: ChartRequest, release_name: impl Into<String>, values: Values) -> Self {
        Self {
            chart,
            release_name: release_name.into(),
            values,
        }
    }
}

/// Outcome of a fetch
#[derive(Debug)]
pub struct FetchedChart {
    /// The loaded chart
    pub chart: Chart,
    /// Resolved identity, absent for direct fetches
    pub info: Option<ChartInfo>,
    /// Credential files left for the caller when cleanup was disabled
    pub credentials: Option<CredentialFiles>,
}

/// Outcome of an install
#[derive(Debug)]
pub struct InstalledChart {
    /// Release returned by the install collaborator
    pub release: Release,
    /// Resolved identity
    pub info: ChartInfo,
    /// Credential files left for the caller when cleanup was disabled
    pub credentials: Option<CredentialFiles>,
}

/// Everything known about a request once credentials are on disk
struct Prepared {
    info: ChartInfo,
    options: ChartPathOptions,
    files: CredentialFiles,
}

/// Chart fetch and install entry point
pub struct ChartActions {
    resolver: RepositoryResolver,
    connections: ConnectionConfigResolver,
    provisioner: CredentialProvisioner,
    packaging: Arc<dyn PackagingClient>,
    metrics: Arc<dyn MetricsSink>,
    settings: Settings,
}

impl ChartActions {
    /// Create actions over explicit collaborators
    ///
    /// Install events go to a fresh [`InstallCounter`] until
    /// [`with_metrics`](Self::with_metrics) replaces it.
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        indexes: Arc<dyn IndexSource>,
        secrets: Arc<dyn SecretStore>,
        packaging: Arc<dyn PackagingClient>,
        settings: Settings,
    ) -> Self {
        let mut provisioner = CredentialProvisioner::new(secrets, settings.system_namespace.clone());
        if let Some(dir) = &settings.temp_dir {
            provisioner = provisioner.with_temp_dir(dir);
        }

        Self {
            resolver: RepositoryResolver::new(repositories.clone(), indexes),
            connections: ConnectionConfigResolver::new(repositories),
            provisioner,
            packaging,
            metrics: Arc::new(InstallCounter::new()),
            settings,
        }
    }

    /// Create actions backed by a live cluster
    pub fn for_cluster(
        client: kube::Client,
        packaging: Arc<dyn PackagingClient>,
        settings: Settings,
    ) -> Result<Self> {
        let repositories = Arc::new(KubeRepositoryStore::new(client.clone()));
        let secrets: Arc<dyn SecretStore> = Arc::new(KubeSecretStore::new(client));
        let indexes = HttpIndexSource::new()?
            .with_credentials(secrets.clone(), settings.system_namespace.clone());

        Ok(Self::new(
            repositories,
            Arc::new(indexes),
            secrets,
            packaging,
            settings,
        ))
    }

    /// Send install events to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Settings passed to the packaging client
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fetch and load a chart
    pub async fn fetch_chart(&self, request: &ChartRequest) -> Result<FetchedChart> {
        if request.namespace.is_empty() {
            tracing::debug!(url = %request.url, "fetching chart without repository resolution");
            let path = self
                .locate(&request.url, &ChartPathOptions::default())
                .await?;
            let chart = self.load(path).await?;
            return Ok(FetchedChart {
                chart,
                info: None,
                credentials: None,
            });
        }

        let prepared = self.prepare(request).await?;
        let chart = match self.locate_and_load(&prepared).await {
            Ok(chart) => chart,
            Err(err) => return Err(discard(prepared.files, err)),
        };

        tracing::info!(
            chart = %prepared.info.name,
            version = %prepared.info.version,
            repository = %prepared.info.repository_name,
            "chart fetched"
        );

        Ok(FetchedChart {
            chart,
            info: Some(prepared.info),
            credentials: release_files(prepared.files, request.cleanup_files),
        })
    }

    /// Fetch a chart and install it as a new release
    pub async fn install_chart(&self, request: InstallRequest) -> Result<InstalledChart> {
        let InstallRequest {
            chart: chart_request,
            release_name,
            values,
        } = request;
        if chart_request.namespace.is_empty() {
            return Err(ActionError::InvalidConfig(
                "install requires a target namespace".to_string(),
            ));
        }

        let prepared = self.prepare(&chart_request).await?;
        let mut chart = match self.locate_and_load(&prepared).await {
            Ok(chart) => chart,
            Err(err) => return Err(discard(prepared.files, err)),
        };

        chart.annotate(CHART_URL_ANNOTATION, chart_request.url.clone());
        let chart_name = chart.name().map(str::to_string);
        let chart_version = chart.version().map(str::to_string);

        let target = InstallTarget {
            namespace: chart_request.namespace.clone(),
            release_name,
        };
        let release = match self.packaging.install(chart, &target, values).await {
            Ok(release) => release,
            Err(source) => {
                let err = ActionError::InstallFailure {
                    release: target.release_name,
                    namespace: target.namespace,
                    source,
                };
                return Err(discard(prepared.files, err));
            }
        };

        if let (Some(name), Some(version)) = (&chart_name, &chart_version) {
            self.metrics.record_install(name, version);
        }

        tracing::info!(
            release = %release.name,
            namespace = %release.namespace,
            chart = chart_name.as_deref().unwrap_or(&prepared.info.name),
            "chart installed"
        );

        Ok(InstalledChart {
            release,
            info: prepared.info,
            credentials: release_files(prepared.files, chart_request.cleanup_files),
        })
    }

    /// Identify the chart, resolve its connection, and provision credentials
    async fn prepare(&self, request: &ChartRequest) -> Result<Prepared> {
        let info = self
            .resolver
            .resolve(&request.url, &request.namespace, request.index_entry.as_deref())
            .await?;
        tracing::debug!(chart = %info, "resolved chart");

        let connection = self
            .connections
            .resolve(&info.repository_name, &request.namespace)
            .await?;

        let files = self
            .provisioner
            .provision(&connection, &request.namespace)
            .await?;

        let mut options = ChartPathOptions::for_repository(connection.url(), info.version.clone());
        options.apply_credentials(&files);

        Ok(Prepared {
            info,
            options,
            files,
        })
    }

    async fn locate_and_load(&self, prepared: &Prepared) -> Result<Chart> {
        let path = self.locate(&prepared.info.name, &prepared.options).await?;
        self.load(path).await
    }

    async fn locate(&self, chart: &str, options: &ChartPathOptions) -> Result<PathBuf> {
        self.packaging
            .locate_chart(chart, options, &self.settings)
            .await
            .map_err(|source| ActionError::ChartLocate {
                chart: chart.to_string(),
                source,
            })
    }

    async fn load(&self, path: PathBuf) -> Result<Chart> {
        match self.packaging.load(&path).await {
            Ok(chart) => Ok(chart),
            Err(source) => Err(ActionError::BundleLoadFailure { path, source }),
        }
    }
}

/// Dispose of credential files now, or hand them back to the caller
///
/// The action has already succeeded at this point, so a removal failure is
/// logged rather than returned.
fn release_files(files: CredentialFiles, cleanup: bool) -> Option<CredentialFiles> {
    if !cleanup {
        return Some(files);
    }
    if let Err(err) = files.dispose() {
        tracing::warn!(error = %err, "failed to remove credential files");
    }
    None
}

/// Remove a failed request's credential files and pass its error through
fn discard(files: CredentialFiles, err: ActionError) -> ActionError {
    if let Err(cleanup) = files.dispose() {
        tracing::warn!(error = %cleanup, "failed to remove credential files of a failed request");
    }
    err
}
