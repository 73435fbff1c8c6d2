//! Kubernetes-backed stores
//!
//! Repository registrations are read as dynamic objects of the
//! `helm.openshift.io/v1beta1` API group; secrets and config maps through
//! the typed core API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Client;
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use chartproxy_repo::{
    HelmChartRepository, ObjectKind, ProjectHelmChartRepository, RepositoryStore, SecretStore,
    StoreError,
};

const HELM_GROUP: &str = "helm.openshift.io";
const HELM_VERSION: &str = "v1beta1";

fn cluster_repository_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(HELM_GROUP, HELM_VERSION, "HelmChartRepository");
    ApiResource::from_gvk_with_plural(&gvk, "helmchartrepositories")
}

fn project_repository_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(HELM_GROUP, HELM_VERSION, "ProjectHelmChartRepository");
    ApiResource::from_gvk_with_plural(&gvk, "projecthelmchartrepositories")
}

/// Map a kube error to a store error, keeping 404s distinguishable
fn store_error(
    err: kube::Error,
    kind: ObjectKind,
    name: &str,
    namespace: Option<&str>,
) -> StoreError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => StoreError::not_found(kind, name, namespace),
        other => StoreError::Backend(Box::new(other)),
    }
}

fn decode_spec<T: DeserializeOwned + Default>(
    object: &DynamicObject,
    kind: ObjectKind,
) -> Result<T, StoreError> {
    match object.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone()).map_err(|e| StoreError::Decode {
            kind,
            name: object.metadata.name.clone().unwrap_or_default(),
            message: e.to_string(),
        }),
        None => Ok(T::default()),
    }
}

fn to_cluster_repository(object: &DynamicObject) -> Result<HelmChartRepository, StoreError> {
    Ok(HelmChartRepository {
        name: object.metadata.name.clone().unwrap_or_default(),
        spec: decode_spec(object, ObjectKind::HelmChartRepository)?,
    })
}

fn to_project_repository(
    object: &DynamicObject,
    namespace: &str,
) -> Result<ProjectHelmChartRepository, StoreError> {
    Ok(ProjectHelmChartRepository {
        name: object.metadata.name.clone().unwrap_or_default(),
        namespace: object
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string()),
        spec: decode_spec(object, ObjectKind::ProjectHelmChartRepository)?,
    })
}

/// Repository registrations read from the cluster
#[derive(Clone)]
pub struct KubeRepositoryStore {
    client: Client,
}

impl KubeRepositoryStore {
    /// Create with an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cluster_api(&self) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &cluster_repository_resource())
    }

    fn project_api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &project_repository_resource())
    }
}

#[async_trait]
impl RepositoryStore for KubeRepositoryStore {
    async fn get_project_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ProjectHelmChartRepository, StoreError> {
        let object = self.project_api(namespace).get(name).await.map_err(|e| {
            store_error(e, ObjectKind::ProjectHelmChartRepository, name, Some(namespace))
        })?;
        to_project_repository(&object, namespace)
    }

    async fn get_cluster_repository(&self, name: &str) -> Result<HelmChartRepository, StoreError> {
        let object = self
            .cluster_api()
            .get(name)
            .await
            .map_err(|e| store_error(e, ObjectKind::HelmChartRepository, name, None))?;
        to_cluster_repository(&object)
    }

    async fn list_project_repositories(
        &self,
        namespace: &str,
    ) -> Result<Vec<ProjectHelmChartRepository>, StoreError> {
        let list = self
            .project_api(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        list.items
            .iter()
            .map(|object| to_project_repository(object, namespace))
            .collect()
    }

    async fn list_cluster_repositories(&self) -> Result<Vec<HelmChartRepository>, StoreError> {
        let list = self
            .cluster_api()
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        list.items.iter().map(to_cluster_repository).collect()
    }
}

/// Secrets and config maps read from the cluster
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Create with an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Merge a secret's `stringData` over its `data`
fn secret_data(secret: Secret) -> BTreeMap<String, Vec<u8>> {
    let mut data: BTreeMap<String, Vec<u8>> = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.0))
        .collect();
    for (key, value) in secret.string_data.unwrap_or_default() {
        data.insert(key, value.into_bytes());
    }
    data
}

/// Merge a config map's `binaryData` and `data`
fn config_map_data(config_map: ConfigMap) -> BTreeMap<String, Vec<u8>> {
    let mut data: BTreeMap<String, Vec<u8>> = config_map
        .binary_data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.0))
        .collect();
    for (key, value) in config_map.data.unwrap_or_default() {
        data.insert(key, value.into_bytes());
    }
    data
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(name)
            .await
            .map_err(|e| store_error(e, ObjectKind::Secret, name, Some(namespace)))?;
        Ok(secret_data(secret))
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get(name)
            .await
            .map_err(|e| store_error(e, ObjectKind::ConfigMap, name, Some(namespace)))?;
        Ok(config_map_data(config_map))
    }
}
