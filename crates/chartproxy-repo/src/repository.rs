//! Chart repository registrations
//!
//! Two resource kinds register repositories in the `helm.openshift.io/v1beta1`
//! API group:
//! - `HelmChartRepository`: cluster-scoped, visible everywhere
//! - `ProjectHelmChartRepository`: namespace-scoped, visible in one namespace
//!
//! Their connection configs have different shapes. [`RepositoryConnection`]
//! carries exactly one of them, and its [`RepositoryScope`] decides which
//! namespace an unqualified credential reference lives in.

use serde::{Deserialize, Serialize};

/// Pointer to a secret or config map holding credential bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Object name
    pub name: String,

    /// Object namespace; empty or absent means "use the scope default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    /// Reference without an explicit namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Reference pinned to a namespace
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Explicit namespace, if one is set and non-empty
    pub fn explicit_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

/// Connection config of a cluster-scoped repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Repository URL
    #[serde(default)]
    pub url: String,

    /// Config map holding `ca-bundle.crt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<ObjectReference>,

    /// Secret holding `tls.crt` and `tls.key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_config: Option<ObjectReference>,
}

/// Connection config of a namespace-scoped repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfigNamespaceScoped {
    /// Repository URL
    #[serde(default)]
    pub url: String,

    /// Config map holding `ca-bundle.crt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<ObjectReference>,

    /// Secret holding `tls.crt` and `tls.key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_config: Option<ObjectReference>,

    /// Secret holding `username` and `password`
    ///
    /// Parsed but never provisioned; fetches only use TLS material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth_config: Option<ObjectReference>,
}

/// Spec of a `HelmChartRepository`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartRepositorySpec {
    /// Skip this repository when enumerating charts
    #[serde(default)]
    pub disabled: bool,

    /// Display name
    #[serde(default, rename = "name")]
    pub display_name: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// How to reach the repository
    #[serde(default)]
    pub connection_config: ConnectionConfig,
}

/// Spec of a `ProjectHelmChartRepository`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHelmChartRepositorySpec {
    /// Skip this repository when enumerating charts
    #[serde(default)]
    pub disabled: bool,

    /// Display name
    #[serde(default, rename = "name")]
    pub display_name: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// How to reach the repository
    #[serde(default)]
    pub connection_config: ConnectionConfigNamespaceScoped,
}

/// Cluster-scoped repository registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmChartRepository {
    /// Object name
    pub name: String,
    /// Spec
    pub spec: HelmChartRepositorySpec,
}

impl HelmChartRepository {
    /// Create a registration pointing at `url`
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: HelmChartRepositorySpec {
                connection_config: ConnectionConfig {
                    url: url.into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

/// Namespace-scoped repository registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHelmChartRepository {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// Spec
    pub spec: ProjectHelmChartRepositorySpec,
}

impl ProjectHelmChartRepository {
    /// Create a registration in `namespace` pointing at `url`
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            spec: ProjectHelmChartRepositorySpec {
                connection_config: ConnectionConfigNamespaceScoped {
                    url: url.into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

/// Where a repository is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryScope {
    /// `HelmChartRepository`
    Cluster,
    /// `ProjectHelmChartRepository`
    Namespaced,
}

impl RepositoryScope {
    /// Namespace a credential reference resolves against
    ///
    /// The reference's own namespace wins; otherwise cluster-scoped
    /// repositories read from `system_namespace` and namespace-scoped ones
    /// from the caller's namespace.
    pub fn reference_namespace<'a>(
        self,
        reference: &'a ObjectReference,
        caller_namespace: &'a str,
        system_namespace: &'a str,
    ) -> &'a str {
        match (reference.explicit_namespace(), self) {
            (Some(ns), _) => ns,
            (None, RepositoryScope::Cluster) => system_namespace,
            (None, RepositoryScope::Namespaced) => caller_namespace,
        }
    }
}

/// The one active connection config of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryConnection {
    Cluster(ConnectionConfig),
    Namespaced(ConnectionConfigNamespaceScoped),
}

impl RepositoryConnection {
    /// Scope of the registration this config came from
    pub fn scope(&self) -> RepositoryScope {
        match self {
            Self::Cluster(_) => RepositoryScope::Cluster,
            Self::Namespaced(_) => RepositoryScope::Namespaced,
        }
    }

    /// Repository URL
    pub fn url(&self) -> &str {
        match self {
            Self::Cluster(c) => &c.url,
            Self::Namespaced(c) => &c.url,
        }
    }

    /// CA config map reference
    pub fn ca(&self) -> Option<&ObjectReference> {
        match self {
            Self::Cluster(c) => c.ca.as_ref(),
            Self::Namespaced(c) => c.ca.as_ref(),
        }
    }

    /// TLS client secret reference
    pub fn tls_client_config(&self) -> Option<&ObjectReference> {
        match self {
            Self::Cluster(c) => c.tls_client_config.as_ref(),
            Self::Namespaced(c) => c.tls_client_config.as_ref(),
        }
    }

    /// Basic auth secret reference (namespace-scoped repositories only)
    pub fn basic_auth_config(&self) -> Option<&ObjectReference> {
        match self {
            Self::Cluster(_) => None,
            Self::Namespaced(c) => c.basic_auth_config.as_ref(),
        }
    }
}

/// A repository visible from some namespace, as enumerated for URL matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRepository {
    /// Object name
    pub name: String,
    /// Namespace, `None` for cluster-scoped registrations
    pub namespace: Option<String>,
    /// Connection config
    pub connection: RepositoryConnection,
}

impl From<HelmChartRepository> for RegisteredRepository {
    fn from(repo: HelmChartRepository) -> Self {
        Self {
            name: repo.name,
            namespace: None,
            connection: RepositoryConnection::Cluster(repo.spec.connection_config),
        }
    }
}

impl From<ProjectHelmChartRepository> for RegisteredRepository {
    fn from(repo: ProjectHelmChartRepository) -> Self {
        Self {
            name: repo.name,
            namespace: Some(repo.namespace),
            connection: RepositoryConnection::Namespaced(repo.spec.connection_config),
        }
    }
}
