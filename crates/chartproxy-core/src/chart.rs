//! Loaded charts and resolved chart identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::values::Values;

/// Annotation stamped on a chart with the URL it was installed from
pub const CHART_URL_ANNOTATION: &str = "chart_url";

/// A chart loaded into memory by the packaging client
///
/// Metadata is optional because archives without a usable `Chart.yaml`
/// still load; callers that need metadata create it on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Chart.yaml contents
    #[serde(default)]
    pub metadata: Option<ChartMetadata>,

    /// Default values shipped with the chart
    #[serde(default)]
    pub values: Values,

    /// Templates and other files in the archive
    #[serde(default)]
    pub files: Vec<ChartFile>,
}

impl Chart {
    /// Create a chart with the given name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            metadata: Some(ChartMetadata {
                name: name.into(),
                version: version.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Set an annotation, creating the metadata and annotation map if absent
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata
            .get_or_insert_with(ChartMetadata::default)
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }

    /// Get an annotation value
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .annotations
            .as_ref()?
            .get(key)
            .map(String::as_str)
    }

    /// Chart name, if metadata is present and the name is set
    pub fn name(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Chart version, if metadata is present and the version is set
    pub fn version(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .map(|m| m.version.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Chart.yaml metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default)]
    pub api_version: String,

    /// Chart name
    #[serde(default)]
    pub name: String,

    /// Chart version
    #[serde(default)]
    pub version: String,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Home URL
    #[serde(default)]
    pub home: Option<String>,

    /// Icon URL
    #[serde(default)]
    pub icon: Option<String>,

    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Annotations
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// A file inside a chart archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartFile {
    /// Path relative to the chart root
    pub name: String,
    /// Raw contents
    pub data: Vec<u8>,
}

/// Identity of exactly one resolvable chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    /// Chart name as listed in the repository index
    pub name: String,

    /// Chart version
    pub version: String,

    /// Name of the registered repository serving the chart
    pub repository_name: String,

    /// Namespace of the repository registration, `None` when cluster-scoped
    pub repository_namespace: Option<String>,
}

impl fmt::Display for ChartInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} from ", self.name, self.version)?;
        match &self.repository_namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.repository_name),
            None => write!(f, "{}", self.repository_name),
        }
    }
}
