//! Connection config lookup with namespace-then-cluster fallback

use std::sync::Arc;

use crate::error::{RepoError, Result};
use crate::repository::RepositoryConnection;
use crate::store::RepositoryStore;

/// Finds the registration behind a repository name
///
/// A namespace-scoped registration always shadows a cluster-scoped one with
/// the same name.
#[derive(Clone)]
pub struct ConnectionConfigResolver {
    repositories: Arc<dyn RepositoryStore>,
}

impl ConnectionConfigResolver {
    /// Create a resolver over the given repository store
    pub fn new(repositories: Arc<dyn RepositoryStore>) -> Self {
        Self { repositories }
    }

    /// Resolve the active connection config of `name` as seen from `namespace`
    ///
    /// Any failure of the namespace-scoped lookup moves on to the cluster
    /// lookup; only the cluster lookup's error is reported.
    pub async fn resolve(&self, name: &str, namespace: &str) -> Result<RepositoryConnection> {
        let connection = match self.repositories.get_project_repository(namespace, name).await {
            Ok(repository) => {
                RepositoryConnection::Namespaced(repository.spec.connection_config)
            }
            Err(project_err) => {
                tracing::debug!(
                    repository = name,
                    namespace,
                    error = %project_err,
                    "no namespace-scoped repository, trying cluster scope"
                );
                let repository = self
                    .repositories
                    .get_cluster_repository(name)
                    .await
                    .map_err(|source| {
                        tracing::warn!(
                            repository = name,
                            namespace,
                            error = %source,
                            "chart repository not found at either scope"
                        );
                        RepoError::RepositoryNotFound {
                            name: name.to_string(),
                            namespace: namespace.to_string(),
                            source,
                        }
                    })?;
                RepositoryConnection::Cluster(repository.spec.connection_config)
            }
        };

        if connection.url().trim().is_empty() {
            return Err(RepoError::ConnectionConfigUnresolvable {
                name: name.to_string(),
                reason: "repository URL is empty".to_string(),
            });
        }

        Ok(connection)
    }
}
