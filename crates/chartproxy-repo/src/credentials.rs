//! Short-lived credential files for repository fetches
//!
//! The packaging client only accepts TLS material as file paths, so secret
//! and config map bytes are written to fresh temp files per request:
//! - `tls.crt` / `tls.key` from the secret named by `tlsClientConfig`
//! - `ca-bundle.crt` from the config map named by `ca`
//!
//! Files are never shared between requests. The returned [`CredentialFiles`]
//! owns them until [`CredentialFiles::dispose`] is called; dropping the handle
//! leaves them on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RepoError, Result};
use crate::repository::RepositoryConnection;
use crate::store::{ObjectKind, SecretStore};

/// Secret key holding the client certificate
pub const TLS_CERT_KEY: &str = "tls.crt";
/// Secret key holding the client private key
pub const TLS_KEY_KEY: &str = "tls.key";
/// Config map key holding the CA bundle
pub const CA_BUNDLE_KEY: &str = "ca-bundle.crt";

const TLS_CERT_PREFIX: &str = "tlscrt-";
const TLS_KEY_PREFIX: &str = "tlskey-";
const CA_CERT_PREFIX: &str = "cacert-";

/// Credential files provisioned for one request
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "provisioned credential files stay on disk until disposed"]
pub struct CredentialFiles {
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    ca_file: Option<PathBuf>,
}

impl CredentialFiles {
    /// Client certificate path
    pub fn cert_file(&self) -> Option<&Path> {
        self.cert_file.as_deref()
    }

    /// Client private key path
    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    /// CA bundle path
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// All provisioned paths, certificate first
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        [&self.cert_file, &self.key_file, &self.ca_file]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }

    /// Number of provisioned files
    pub fn len(&self) -> usize {
        self.paths().count()
    }

    /// Whether nothing was provisioned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every provisioned file
    ///
    /// Files already gone are skipped. All removals are attempted; the first
    /// failure is returned.
    pub fn dispose(self) -> std::io::Result<()> {
        let mut first_error = None;
        for path in self.paths() {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed credential file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove credential file");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Writes secret-derived TLS material to temp files
#[derive(Clone)]
pub struct CredentialProvisioner {
    secrets: Arc<dyn SecretStore>,
    system_namespace: String,
    temp_dir: Option<PathBuf>,
}

impl CredentialProvisioner {
    /// Create a provisioner
    ///
    /// `system_namespace` holds the credential objects of cluster-scoped
    /// repositories whose references carry no namespace.
    pub fn new(secrets: Arc<dyn SecretStore>, system_namespace: impl Into<String>) -> Self {
        Self {
            secrets,
            system_namespace: system_namespace.into(),
            temp_dir: None,
        }
    }

    /// Write files under `dir` instead of the OS temp dir
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Provision the credential files a connection needs
    ///
    /// The TLS client step runs before the CA step. If any step fails, files
    /// this call already wrote are removed before the error is returned.
    pub async fn provision(
        &self,
        connection: &RepositoryConnection,
        namespace: &str,
    ) -> Result<CredentialFiles> {
        let mut files = CredentialFiles::default();
        match self.provision_into(connection, namespace, &mut files).await {
            Ok(()) => Ok(files),
            Err(err) => {
                if let Err(cleanup) = files.dispose() {
                    tracing::warn!(error = %cleanup, "partial credential files left behind");
                }
                Err(err)
            }
        }
    }

    async fn provision_into(
        &self,
        connection: &RepositoryConnection,
        namespace: &str,
        files: &mut CredentialFiles,
    ) -> Result<()> {
        let scope = connection.scope();

        if let Some(reference) = connection.tls_client_config() {
            let secret_namespace =
                scope.reference_namespace(reference, namespace, &self.system_namespace);
            let secret = self
                .secrets
                .get_secret(secret_namespace, &reference.name)
                .await
                .map_err(|source| RepoError::SecretNotFound {
                    name: reference.name.clone(),
                    namespace: secret_namespace.to_string(),
                    source,
                })?;

            let cert = require_key(&secret, TLS_CERT_KEY, ObjectKind::Secret, &reference.name)?;
            files.cert_file = Some(self.write_temp_file(cert, TLS_CERT_PREFIX, "TLS certificate")?);

            let key = require_key(&secret, TLS_KEY_KEY, ObjectKind::Secret, &reference.name)?;
            files.key_file = Some(self.write_temp_file(key, TLS_KEY_PREFIX, "TLS key")?);

            tracing::debug!(
                secret = %reference.name,
                namespace = secret_namespace,
                "provisioned TLS client credentials"
            );
        }

        if let Some(reference) = connection.ca() {
            let config_namespace =
                scope.reference_namespace(reference, namespace, &self.system_namespace);
            let config_map = self
                .secrets
                .get_config_map(config_namespace, &reference.name)
                .await
                .map_err(|source| RepoError::ConfigNotFound {
                    name: reference.name.clone(),
                    namespace: config_namespace.to_string(),
                    source,
                })?;

            let bundle =
                require_key(&config_map, CA_BUNDLE_KEY, ObjectKind::ConfigMap, &reference.name)?;
            files.ca_file = Some(self.write_temp_file(bundle, CA_CERT_PREFIX, "CA bundle")?);

            tracing::debug!(
                configmap = %reference.name,
                namespace = config_namespace,
                "provisioned CA bundle"
            );
        }

        if let Some(reference) = connection.basic_auth_config() {
            tracing::debug!(
                secret = %reference.name,
                "basic auth config is not used for chart fetches"
            );
        }

        Ok(())
    }

    fn write_temp_file(&self, data: &[u8], prefix: &str, kind: &'static str) -> Result<PathBuf> {
        let to_error = |source| RepoError::CredentialFile { kind, source };

        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(to_error)?;

        file.write_all(data).map_err(to_error)?;
        file.flush().map_err(to_error)?;

        // Keep the file past the handle's drop; CredentialFiles owns removal
        file.into_temp_path().keep().map_err(|e| to_error(e.error))
    }
}

fn require_key<'a>(
    data: &'a BTreeMap<String, Vec<u8>>,
    key: &str,
    kind: ObjectKind,
    object: &str,
) -> Result<&'a [u8]> {
    data.get(key)
        .map(Vec::as_slice)
        .ok_or_else(|| RepoError::MissingKey {
            key: key.to_string(),
            kind,
            object: object.to_string(),
        })
}
