//! Packaging client settings
//!
//! Passed explicitly to every chart lookup instead of living in process-wide
//! state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Namespace holding credentials of cluster-scoped repositories
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "openshift-config";

const APP_DIR: &str = "chartproxy";

/// Settings threaded into the packaging client and credential provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Directory for downloaded charts and cached indexes
    pub repository_cache: PathBuf,

    /// Repository list used by the packaging client
    pub repository_config: PathBuf,

    /// OCI registry credentials used by the packaging client
    pub registry_config: PathBuf,

    /// Namespace for credential references of cluster-scoped repositories
    pub system_namespace: String,

    /// Directory for provisioned credential files, OS temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let cache = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        let config = dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);

        Self {
            repository_cache: cache.join("repository"),
            repository_config: config.join("repositories.yaml"),
            registry_config: config.join("registry").join("config.json"),
            system_namespace: DEFAULT_SYSTEM_NAMESPACE.to_string(),
            temp_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file; absent keys keep their defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.system_namespace, "openshift-config");
        assert!(settings.temp_dir.is_none());
        assert!(settings.repository_cache.ends_with("chartproxy/repository"));
        assert!(settings.repository_config.ends_with("chartproxy/repositories.yaml"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "systemNamespace: cluster-config\ntempDir: /var/run/chartproxy\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.system_namespace, "cluster-config");
        assert_eq!(settings.temp_dir, Some(PathBuf::from("/var/run/chartproxy")));
        assert_eq!(settings.repository_cache, Settings::default().repository_cache);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Settings::load_from(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(missing, ActionError::Io(_)));

        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "systemNamespace: [unterminated").unwrap();
        let broken = Settings::load_from(&path).unwrap_err();
        assert!(matches!(broken, ActionError::Serialization(_)));
    }
}
