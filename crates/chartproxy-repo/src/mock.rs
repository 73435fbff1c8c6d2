//! In-memory stores for testing
//!
//! These stand in for the cluster and the repository servers so resolution
//! and provisioning can be exercised without a Kubernetes API server.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::BoxError;
use crate::index::RepositoryIndex;
use crate::repository::{HelmChartRepository, ProjectHelmChartRepository, RegisteredRepository};
use crate::store::{IndexSource, ObjectKind, RepositoryStore, SecretStore, StoreError};

/// Counts of lookups performed, for assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub project_gets: usize,
    pub cluster_gets: usize,
    pub lists: usize,
    pub secret_gets: usize,
    pub config_map_gets: usize,
    pub index_fetches: usize,
}

/// In-memory repository registrations
///
/// Listing returns registrations in insertion order.
#[derive(Clone, Default)]
pub struct MockRepositoryStore {
    project: Arc<RwLock<Vec<ProjectHelmChartRepository>>>,
    cluster: Arc<RwLock<Vec<HelmChartRepository>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockRepositoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace-scoped registration
    pub fn with_project(self, repository: ProjectHelmChartRepository) -> Self {
        self.project.write().unwrap().push(repository);
        self
    }

    /// Add a cluster-scoped registration
    pub fn with_cluster(self, repository: HelmChartRepository) -> Self {
        self.cluster.write().unwrap().push(repository);
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        f(&mut self.operations.write().unwrap());
    }
}

#[async_trait]
impl RepositoryStore for MockRepositoryStore {
    async fn get_project_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ProjectHelmChartRepository, StoreError> {
        self.count(|ops| ops.project_gets += 1);
        self.project
            .read()
            .unwrap()
            .iter()
            .find(|r| r.namespace == namespace && r.name == name)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(ObjectKind::ProjectHelmChartRepository, name, Some(namespace))
            })
    }

    async fn get_cluster_repository(&self, name: &str) -> Result<HelmChartRepository, StoreError> {
        self.count(|ops| ops.cluster_gets += 1);
        self.cluster
            .read()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ObjectKind::HelmChartRepository, name, None))
    }

    async fn list_project_repositories(
        &self,
        namespace: &str,
    ) -> Result<Vec<ProjectHelmChartRepository>, StoreError> {
        self.count(|ops| ops.lists += 1);
        Ok(self
            .project
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_cluster_repositories(&self) -> Result<Vec<HelmChartRepository>, StoreError> {
        self.count(|ops| ops.lists += 1);
        Ok(self.cluster.read().unwrap().clone())
    }
}

type ObjectData = BTreeMap<String, Vec<u8>>;

/// In-memory secrets and config maps
#[derive(Clone, Default)]
pub struct MockSecretStore {
    /// (namespace, name) -> data
    secrets: Arc<RwLock<HashMap<(String, String), ObjectData>>>,
    config_maps: Arc<RwLock<HashMap<(String, String), ObjectData>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockSecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    pub fn with_secret<K, V>(
        self,
        namespace: &str,
        name: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.secrets
            .write()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), collect_data(data));
        self
    }

    /// Add a config map
    pub fn with_config_map<K, V>(
        self,
        namespace: &str,
        name: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.config_maps
            .write()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), collect_data(data));
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

fn collect_data<K, V>(data: impl IntoIterator<Item = (K, V)>) -> ObjectData
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<ObjectData, StoreError> {
        self.operations.write().unwrap().secret_gets += 1;
        self.secrets
            .read()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ObjectKind::Secret, name, Some(namespace)))
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ObjectData, StoreError> {
        self.operations.write().unwrap().config_map_gets += 1;
        self.config_maps
            .read()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ObjectKind::ConfigMap, name, Some(namespace)))
    }
}

/// In-memory repository indexes keyed by repository name
///
/// Fetching the index of a repository with no registered index fails.
#[derive(Clone, Default)]
pub struct MockIndexSource {
    indexes: Arc<RwLock<HashMap<String, RepositoryIndex>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockIndexSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the index served for `repository`
    pub fn with_index(self, repository: &str, index: RepositoryIndex) -> Self {
        self.indexes
            .write()
            .unwrap()
            .insert(repository.to_string(), index);
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

#[async_trait]
impl IndexSource for MockIndexSource {
    async fn fetch_index(&self, repository: &RegisteredRepository) -> Result<RepositoryIndex, BoxError> {
        self.operations.write().unwrap().index_fetches += 1;
        self.indexes
            .read()
            .unwrap()
            .get(&repository.name)
            .cloned()
            .ok_or_else(|| format!("no index served for repository {}", repository.name).into())
    }
}
