//! HTTP index source
//!
//! Fetches `<repository url>/index.yaml` for registered repositories. When a
//! secret store is attached, the repository's TLS client secret and CA config
//! map are loaded into the HTTP client for that request only.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::credentials::{CA_BUNDLE_KEY, TLS_CERT_KEY, TLS_KEY_KEY};
use crate::error::{BoxError, RepoError, Result};
use crate::index::RepositoryIndex;
use crate::repository::RegisteredRepository;
use crate::store::{IndexSource, ObjectKind, SecretStore};

const INDEX_FILE: &str = "index.yaml";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Index source backed by plain HTTP(S) repositories
#[derive(Clone)]
pub struct HttpIndexSource {
    client: reqwest::Client,
    credentials: Option<(Arc<dyn SecretStore>, String)>,
}

impl HttpIndexSource {
    /// Create a source without client credentials
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(reqwest::Client::builder())?,
            credentials: None,
        })
    }

    /// Load repository TLS material from `secrets` before each fetch
    ///
    /// References of cluster-scoped repositories without a namespace resolve
    /// against `system_namespace`.
    pub fn with_credentials(
        mut self,
        secrets: Arc<dyn SecretStore>,
        system_namespace: impl Into<String>,
    ) -> Self {
        self.credentials = Some((secrets, system_namespace.into()));
        self
    }

    /// Fetch and parse the index of a repository
    pub async fn fetch(&self, repository: &RegisteredRepository) -> Result<RepositoryIndex> {
        let index_url = index_url(repository.connection.url())?;
        let client = match &self.credentials {
            Some((secrets, system_namespace)) => {
                self.client_for(repository, secrets.as_ref(), system_namespace)
                    .await?
            }
            None => self.client.clone(),
        };

        tracing::debug!(repository = %repository.name, url = %index_url, "fetching repository index");

        let response = client.get(index_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Http {
                status: status.as_u16(),
                message: format!("GET {} failed", index_url),
            });
        }

        let body = response.bytes().await?;
        RepositoryIndex::from_bytes(&body)
    }

    async fn client_for(
        &self,
        repository: &RegisteredRepository,
        secrets: &dyn SecretStore,
        system_namespace: &str,
    ) -> Result<reqwest::Client> {
        let connection = &repository.connection;
        if connection.tls_client_config().is_none() && connection.ca().is_none() {
            return Ok(self.client.clone());
        }

        let scope = connection.scope();
        let caller_namespace = repository.namespace.as_deref().unwrap_or(system_namespace);
        let mut identity = None;
        let mut roots = Vec::new();

        if let Some(reference) = connection.tls_client_config() {
            let namespace = scope.reference_namespace(reference, caller_namespace, system_namespace);
            let secret = secrets.get_secret(namespace, &reference.name).await.map_err(|source| {
                RepoError::SecretNotFound {
                    name: reference.name.clone(),
                    namespace: namespace.to_string(),
                    source,
                }
            })?;

            // rustls wants certificate and key in one PEM buffer
            let mut pem = Vec::new();
            for key in [TLS_CERT_KEY, TLS_KEY_KEY] {
                let data = secret.get(key).ok_or_else(|| RepoError::MissingKey {
                    key: key.to_string(),
                    kind: ObjectKind::Secret,
                    object: reference.name.clone(),
                })?;
                pem.extend_from_slice(data);
                pem.push(b'\n');
            }
            identity = Some(reqwest::Identity::from_pem(&pem)?);
        }

        if let Some(reference) = connection.ca() {
            let namespace = scope.reference_namespace(reference, caller_namespace, system_namespace);
            let config_map = secrets
                .get_config_map(namespace, &reference.name)
                .await
                .map_err(|source| RepoError::ConfigNotFound {
                    name: reference.name.clone(),
                    namespace: namespace.to_string(),
                    source,
                })?;
            let bundle = config_map.get(CA_BUNDLE_KEY).ok_or_else(|| RepoError::MissingKey {
                key: CA_BUNDLE_KEY.to_string(),
                kind: ObjectKind::ConfigMap,
                object: reference.name.clone(),
            })?;
            roots = reqwest::Certificate::from_pem_bundle(bundle)?;
        }

        let mut builder = reqwest::Client::builder();
        if let Some(identity) = identity {
            builder = builder.identity(identity);
        }
        for certificate in roots {
            builder = builder.add_root_certificate(certificate);
        }
        build_client(builder)
    }
}

fn build_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client> {
    builder
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RepoError::Network {
            message: e.to_string(),
        })
}

/// URL of a repository's index file
pub fn index_url(repository_url: &str) -> Result<Url> {
    let invalid = |reason: String| RepoError::InvalidRepositoryUrl {
        url: repository_url.to_string(),
        reason,
    };

    let mut base = Url::parse(repository_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(INDEX_FILE).map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl IndexSource for HttpIndexSource {
    async fn fetch_index(&self, repository: &RegisteredRepository) -> std::result::Result<RepositoryIndex, BoxError> {
        self.fetch(repository).await.map_err(BoxError::from)
    }
}
