//! End-to-end tests for chart fetch and install

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chartproxy_core::{CHART_URL_ANNOTATION, Chart, Release, Values};
use chartproxy_kube::{
    ActionError, ChartActions, ChartPathOptions, ChartRequest, InstallCounter, InstallRequest,
    InstallTarget, PackagingClient, Settings,
};
use chartproxy_repo::mock::{MockIndexSource, MockRepositoryStore, MockSecretStore};
use chartproxy_repo::{
    BoxError, CA_BUNDLE_KEY, ChartVersion, HelmChartRepository, ObjectReference,
    ProjectHelmChartRepository, RepoError, RepositoryIndex, TLS_CERT_KEY, TLS_KEY_KEY,
};

const CHART_URL: &str = "https://charts.example.com/nginx-1.2.3.tgz";
const ARCHIVE: &str = "/var/cache/charts/nginx-1.2.3.tgz";

/// One `locate_chart` call as seen by the packaging client
#[derive(Debug, Clone)]
struct LocateCall {
    chart: String,
    options: ChartPathOptions,
    /// Credential files that existed when the call was made
    existing_files: Vec<PathBuf>,
}

#[derive(Default)]
struct Recorded {
    locates: Vec<LocateCall>,
    loads: Vec<PathBuf>,
    installs: Vec<(Chart, InstallTarget)>,
}

/// Packaging client that records every call
#[derive(Clone)]
struct RecordingPackaging {
    chart: Chart,
    fail_load: bool,
    fail_install: bool,
    obstruct_cleanup: bool,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingPackaging {
    fn new(chart: Chart) -> Self {
        Self {
            chart,
            fail_load: false,
            fail_install: false,
            obstruct_cleanup: false,
            recorded: Arc::default(),
        }
    }

    fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    /// Swap the located credential files for directories while loading,
    /// so that removing them afterwards fails
    fn obstructing_cleanup(mut self) -> Self {
        self.obstruct_cleanup = true;
        self
    }

    fn replace_credential_files_with_dirs(&self) {
        let recorded = self.recorded.lock().unwrap();
        let locate = recorded.locates.last().unwrap();
        for path in &locate.existing_files {
            std::fs::remove_file(path).unwrap();
            std::fs::create_dir(path).unwrap();
        }
    }

    fn locates(&self) -> Vec<LocateCall> {
        self.recorded.lock().unwrap().locates.clone()
    }

    fn load_count(&self) -> usize {
        self.recorded.lock().unwrap().loads.len()
    }

    fn installs(&self) -> Vec<(Chart, InstallTarget)> {
        self.recorded.lock().unwrap().installs.clone()
    }
}

#[async_trait]
impl PackagingClient for RecordingPackaging {
    async fn locate_chart(
        &self,
        chart: &str,
        options: &ChartPathOptions,
        _settings: &Settings,
    ) -> Result<PathBuf, BoxError> {
        let existing_files = [&options.cert_file, &options.key_file, &options.ca_file]
            .into_iter()
            .flatten()
            .filter(|p| p.exists())
            .cloned()
            .collect();
        self.recorded.lock().unwrap().locates.push(LocateCall {
            chart: chart.to_string(),
            options: options.clone(),
            existing_files,
        });
        Ok(PathBuf::from(ARCHIVE))
    }

    async fn load(&self, path: &Path) -> Result<Chart, BoxError> {
        self.recorded.lock().unwrap().loads.push(path.to_path_buf());
        if self.obstruct_cleanup {
            self.replace_credential_files_with_dirs();
        }
        if self.fail_load {
            return Err("chart archive is corrupt".into());
        }
        Ok(self.chart.clone())
    }

    async fn install(
        &self,
        chart: Chart,
        target: &InstallTarget,
        values: Values,
    ) -> Result<Release, BoxError> {
        let metadata = chart.metadata.clone();
        self.recorded
            .lock()
            .unwrap()
            .installs
            .push((chart, target.clone()));
        if self.fail_install {
            return Err("cannot re-use a name that is still in use".into());
        }
        Ok(Release::installed(
            &target.release_name,
            &target.namespace,
            metadata,
            values,
        ))
    }
}

fn nginx_index() -> RepositoryIndex {
    let mut index = RepositoryIndex::default();
    index.add_entry(ChartVersion::new("nginx", "1.2.3", CHART_URL));
    index
}

/// Namespace-scoped repository in team-a with a CA reference only
fn ca_only_project_repository() -> ProjectHelmChartRepository {
    let mut repository =
        ProjectHelmChartRepository::new("internal", "team-a", "https://charts.example.com");
    repository.spec.connection_config.ca = Some(ObjectReference::new("internal-ca"));
    repository
}

struct Fixture {
    actions: ChartActions,
    packaging: RecordingPackaging,
    metrics: Arc<InstallCounter>,
    repositories: MockRepositoryStore,
    secrets: MockSecretStore,
    temp_dir: tempfile::TempDir,
}

impl Fixture {
    fn new(
        repositories: MockRepositoryStore,
        indexes: MockIndexSource,
        secrets: MockSecretStore,
        packaging: RecordingPackaging,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            temp_dir: Some(temp_dir.path().to_path_buf()),
            ..Settings::default()
        };
        let metrics = Arc::new(InstallCounter::new());
        let actions = ChartActions::new(
            Arc::new(repositories.clone()),
            Arc::new(indexes),
            Arc::new(secrets.clone()),
            Arc::new(packaging.clone()),
            settings,
        )
        .with_metrics(metrics.clone());

        Self {
            actions,
            packaging,
            metrics,
            repositories,
            secrets,
            temp_dir,
        }
    }

    /// Project repository with a CA bundle, serving the nginx index
    fn ca_only(packaging: RecordingPackaging) -> Self {
        Self::new(
            MockRepositoryStore::new().with_project(ca_only_project_repository()),
            MockIndexSource::new().with_index("internal", nginx_index()),
            MockSecretStore::new().with_config_map(
                "team-a",
                "internal-ca",
                [(CA_BUNDLE_KEY, "-----BEGIN CERTIFICATE-----")],
            ),
            packaging,
        )
    }

    fn leftover_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

mod install {
    use super::*;

    #[tokio::test]
    async fn test_ca_only_repository_with_cleanup() {
        let fixture = Fixture::ca_only(RecordingPackaging::new(Chart::new("nginx", "1.2.3")));

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a"),
            "web",
            Values::new(),
        );
        let installed = fixture.actions.install_chart(request).await.unwrap();

        assert_eq!(installed.release.name, "web");
        assert_eq!(installed.release.namespace, "team-a");
        assert_eq!(installed.info.repository_name, "internal");
        assert_eq!(installed.info.repository_namespace.as_deref(), Some("team-a"));
        assert!(installed.credentials.is_none());

        let locates = fixture.packaging.locates();
        assert_eq!(locates.len(), 1);
        let locate = &locates[0];
        assert_eq!(locate.chart, "nginx");
        assert_eq!(locate.options.repo_url.as_deref(), Some("https://charts.example.com"));
        assert_eq!(locate.options.version.as_deref(), Some("1.2.3"));
        assert!(locate.options.cert_file.is_none());
        assert!(locate.options.key_file.is_none());

        // Exactly one CA file was provisioned and existed while the chart was located
        let ca_file = locate.options.ca_file.clone().unwrap();
        assert_eq!(locate.existing_files, vec![ca_file.clone()]);
        assert!(ca_file.starts_with(fixture.temp_dir.path()));
        assert!(!ca_file.exists());
        assert_eq!(fixture.leftover_files(), 0);

        assert_eq!(fixture.metrics.count("nginx", "1.2.3"), 1);
    }

    #[tokio::test]
    async fn test_chart_is_annotated_with_origin_url() {
        let fixture = Fixture::ca_only(RecordingPackaging::new(Chart::default()));

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a"),
            "web",
            Values::from_yaml("replicaCount: 2").unwrap(),
        );
        let installed = fixture.actions.install_chart(request).await.unwrap();

        let installs = fixture.packaging.installs();
        assert_eq!(installs.len(), 1);
        let (chart, target) = &installs[0];
        assert_eq!(chart.annotation(CHART_URL_ANNOTATION), Some(CHART_URL));
        assert_eq!(target.release_name, "web");
        assert_eq!(installed.release.values.get("replicaCount"), Some(&serde_json::json!(2)));

        // No metadata name or version, so no install event
        assert_eq!(fixture.metrics.total(), 0);
    }

    #[tokio::test]
    async fn test_keep_files_hands_credentials_to_caller() {
        let fixture = Fixture::ca_only(RecordingPackaging::new(Chart::new("nginx", "1.2.3")));

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a").keep_files(),
            "web",
            Values::new(),
        );
        let installed = fixture.actions.install_chart(request).await.unwrap();

        let credentials = installed.credentials.unwrap();
        assert_eq!(credentials.len(), 1);
        let ca_file = credentials.ca_file().unwrap().to_path_buf();
        assert!(ca_file.exists());

        credentials.dispose().unwrap();
        assert!(!ca_file.exists());
    }

    #[tokio::test]
    async fn test_install_failure_removes_files_and_skips_metrics() {
        let fixture = Fixture::ca_only(
            RecordingPackaging::new(Chart::new("nginx", "1.2.3")).failing_install(),
        );

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a").keep_files(),
            "web",
            Values::new(),
        );
        let err = fixture.actions.install_chart(request).await.unwrap_err();

        match err {
            ActionError::InstallFailure { release, namespace, .. } => {
                assert_eq!(release, "web");
                assert_eq!(namespace, "team-a");
            }
            other => panic!("expected InstallFailure, got {other:?}"),
        }
        assert_eq!(fixture.leftover_files(), 0);
        assert_eq!(fixture.metrics.total(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_aborts_before_install() {
        let fixture =
            Fixture::ca_only(RecordingPackaging::new(Chart::new("nginx", "1.2.3")).failing_load());

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a"),
            "web",
            Values::new(),
        );
        let err = fixture.actions.install_chart(request).await.unwrap_err();

        assert!(matches!(err, ActionError::BundleLoadFailure { ref path, .. } if path == Path::new(ARCHIVE)));
        assert!(fixture.packaging.installs().is_empty());
        assert_eq!(fixture.leftover_files(), 0);
        assert_eq!(fixture.metrics.total(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_error_does_not_fail_install() {
        let fixture = Fixture::ca_only(
            RecordingPackaging::new(Chart::new("nginx", "1.2.3")).obstructing_cleanup(),
        );

        let request = InstallRequest::new(
            ChartRequest::new(CHART_URL, "team-a"),
            "web",
            Values::new(),
        );
        let installed = fixture.actions.install_chart(request).await.unwrap();

        assert_eq!(installed.release.name, "web");
        assert!(installed.credentials.is_none());
        assert_eq!(fixture.packaging.installs().len(), 1);
        assert_eq!(fixture.metrics.count("nginx", "1.2.3"), 1);

        // The CA path is a directory now, so it survives cleanup
        let ca_file = fixture.packaging.locates()[0].options.ca_file.clone().unwrap();
        assert!(ca_file.is_dir());
    }

    #[tokio::test]
    async fn test_install_requires_namespace() {
        let fixture = Fixture::ca_only(RecordingPackaging::new(Chart::new("nginx", "1.2.3")));

        let request = InstallRequest::new(ChartRequest::new(CHART_URL, ""), "web", Values::new());
        let err = fixture.actions.install_chart(request).await.unwrap_err();

        assert!(matches!(err, ActionError::InvalidConfig(_)));
        assert!(fixture.packaging.locates().is_empty());
    }
}

mod fetch {
    use super::*;

    fn tls_cluster_fixture(packaging: RecordingPackaging) -> Fixture {
        let mut repository = HelmChartRepository::new("mychart-repo", "https://cluster.example.com");
        repository.spec.connection_config.tls_client_config = Some(ObjectReference::new("repo-tls"));

        Fixture::new(
            MockRepositoryStore::new().with_cluster(repository),
            MockIndexSource::new(),
            MockSecretStore::new().with_secret(
                "openshift-config",
                "repo-tls",
                [(TLS_CERT_KEY, "CERT"), (TLS_KEY_KEY, "KEY")],
            ),
            packaging,
        )
    }

    #[tokio::test]
    async fn test_index_entry_with_cluster_repository() {
        let fixture = tls_cluster_fixture(RecordingPackaging::new(Chart::new("mychart", "1.2.3")));

        let request = ChartRequest::new(
            "https://cluster.example.com/charts/mychart-1.2.3.tgz",
            "team-a",
        )
        .with_index_entry("mychart--mychart-repo");
        let fetched = fixture.actions.fetch_chart(&request).await.unwrap();

        let info = fetched.info.unwrap();
        assert_eq!(info.name, "mychart");
        assert_eq!(info.version, "1.2.3");
        assert_eq!(info.repository_name, "mychart-repo");
        assert!(fetched.credentials.is_none());
        assert_eq!(fetched.chart.name(), Some("mychart"));

        let locate = &fixture.packaging.locates()[0];
        assert_eq!(locate.chart, "mychart");
        assert_eq!(locate.options.version.as_deref(), Some("1.2.3"));
        assert_eq!(locate.options.repo_url.as_deref(), Some("https://cluster.example.com"));
        assert_eq!(locate.existing_files.len(), 2);
        assert!(locate.options.ca_file.is_none());

        // Files are gone once the chart is in memory
        assert_eq!(fixture.leftover_files(), 0);
        // Index tokens skip the repository scan
        assert_eq!(fixture.repositories.operation_counts().lists, 0);
    }

    #[tokio::test]
    async fn test_keep_files_hands_credentials_to_caller() {
        let fixture = tls_cluster_fixture(RecordingPackaging::new(Chart::new("mychart", "1.2.3")));

        let request = ChartRequest::new(
            "https://cluster.example.com/charts/mychart-1.2.3.tgz",
            "team-a",
        )
        .with_index_entry("mychart--mychart-repo")
        .keep_files();
        let fetched = fixture.actions.fetch_chart(&request).await.unwrap();

        let credentials = fetched.credentials.unwrap();
        assert_eq!(credentials.len(), 2);
        assert!(credentials.ca_file().is_none());
        let cert_file = credentials.cert_file().unwrap().to_path_buf();
        let key_file = credentials.key_file().unwrap().to_path_buf();
        assert_eq!(std::fs::read_to_string(&cert_file).unwrap(), "CERT");
        assert_eq!(std::fs::read_to_string(&key_file).unwrap(), "KEY");
        assert_eq!(fixture.leftover_files(), 2);

        let locate = &fixture.packaging.locates()[0];
        assert_eq!(locate.options.cert_file.as_ref(), Some(&cert_file));
        assert_eq!(locate.options.key_file.as_ref(), Some(&key_file));

        credentials.dispose().unwrap();
        assert_eq!(fixture.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_removes_files() {
        let fixture = tls_cluster_fixture(
            RecordingPackaging::new(Chart::new("mychart", "1.2.3")).failing_load(),
        );

        let request = ChartRequest::new(
            "https://cluster.example.com/charts/mychart-1.2.3.tgz",
            "team-a",
        )
        .with_index_entry("mychart--mychart-repo")
        .keep_files();
        let err = fixture.actions.fetch_chart(&request).await.unwrap_err();

        assert!(matches!(err, ActionError::BundleLoadFailure { ref path, .. } if path == Path::new(ARCHIVE)));
        assert_eq!(fixture.packaging.locates()[0].existing_files.len(), 2);
        assert_eq!(fixture.packaging.load_count(), 1);
        assert_eq!(fixture.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_error_does_not_fail_fetch() {
        let fixture = tls_cluster_fixture(
            RecordingPackaging::new(Chart::new("mychart", "1.2.3")).obstructing_cleanup(),
        );

        let request = ChartRequest::new(
            "https://cluster.example.com/charts/mychart-1.2.3.tgz",
            "team-a",
        )
        .with_index_entry("mychart--mychart-repo");
        let fetched = fixture.actions.fetch_chart(&request).await.unwrap();

        assert_eq!(fetched.chart.name(), Some("mychart"));
        assert!(fetched.credentials.is_none());
        assert_eq!(fixture.leftover_files(), 2);
    }

    #[tokio::test]
    async fn test_empty_namespace_fetches_url_directly() {
        let fixture = tls_cluster_fixture(RecordingPackaging::new(Chart::new("mychart", "1.2.3")));

        let request = ChartRequest::new("https://elsewhere.example.com/mychart-1.2.3.tgz", "");
        let fetched = fixture.actions.fetch_chart(&request).await.unwrap();

        assert!(fetched.info.is_none());
        let locate = &fixture.packaging.locates()[0];
        assert_eq!(locate.chart, "https://elsewhere.example.com/mychart-1.2.3.tgz");
        assert_eq!(locate.options, ChartPathOptions::default());

        let counts = fixture.repositories.operation_counts();
        assert_eq!(counts.project_gets + counts.cluster_gets + counts.lists, 0);
        assert_eq!(fixture.secrets.operation_counts().secret_gets, 0);
    }

    #[tokio::test]
    async fn test_unknown_repository_never_reaches_packaging() {
        let fixture = tls_cluster_fixture(RecordingPackaging::new(Chart::default()));

        let request = ChartRequest::new("https://cluster.example.com/other-0.1.0.tgz", "team-a")
            .with_index_entry("other--missing-repo");
        let err = fixture.actions.fetch_chart(&request).await.unwrap_err();

        assert!(matches!(err, ActionError::Repo(RepoError::RepositoryNotFound { .. })));
        assert!(err.is_not_found());
        assert!(fixture.packaging.locates().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tls_key_stops_before_locate() {
        let mut repository = HelmChartRepository::new("mychart-repo", "https://cluster.example.com");
        repository.spec.connection_config.tls_client_config = Some(ObjectReference::new("repo-tls"));
        let fixture = Fixture::new(
            MockRepositoryStore::new().with_cluster(repository),
            MockIndexSource::new(),
            MockSecretStore::new().with_secret("openshift-config", "repo-tls", [(TLS_CERT_KEY, "CERT")]),
            RecordingPackaging::new(Chart::default()),
        );

        let request = ChartRequest::new("https://cluster.example.com/mychart-1.2.3.tgz", "team-a")
            .with_index_entry("mychart--mychart-repo");
        let err = fixture.actions.fetch_chart(&request).await.unwrap_err();

        assert!(matches!(
            err,
            ActionError::Repo(RepoError::MissingKey { ref key, ref object, .. })
                if key == TLS_KEY_KEY && object == "repo-tls"
        ));
        assert!(fixture.packaging.locates().is_empty());
        assert_eq!(fixture.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_url_not_in_any_index() {
        let fixture = Fixture::ca_only(RecordingPackaging::new(Chart::default()));

        let request = ChartRequest::new("https://charts.example.com/unknown-9.9.9.tgz", "team-a");
        let err = fixture.actions.fetch_chart(&request).await.unwrap_err();

        assert!(matches!(err, ActionError::Repo(RepoError::ChartNotFoundInIndex { .. })));
        assert_eq!(fixture.secrets.operation_counts().config_map_gets, 0);
    }
}
