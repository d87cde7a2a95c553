//! Configuration management for clientgen code generation.
//!
//! This module defines the `Config` struct holding the settings of a
//! generation run. The configuration can be loaded from a YAML or TOML file,
//! created programmatically, or assembled from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use clientgen_core::config::Config;
//! use clientgen_core::registry::RegistryScope;
//!
//! // Create a new config programmatically
//! let mut config = Config::new("design/pets.yaml", "gen");
//! config.registry_scope = RegistryScope::PerRun;
//! config.workers = Some(4);
//!
//! // Or load from a config file
//! # async fn load() -> clientgen_core::Result<()> {
//! let config = Config::from_file("clientgen.toml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::registry::RegistryScope;
use crate::templates::TemplateKind;

/// Configuration for a clientgen run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path or http(s) URL of the service schema
    pub schema: String,

    /// Root directory of the generated tree
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Package path the generated code imports service modules from
    #[serde(default = "default_genpkg")]
    pub genpkg: String,

    /// Transport directory below the output root
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Crate path providing validation helpers to generated code
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Lifetime of the declaration registry
    #[serde(default)]
    pub registry_scope: RegistryScope,

    /// Number of services generated concurrently (defaults to the CPU count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Template set to render with
    #[serde(default)]
    pub template_kind: TemplateKind,

    /// Directory of custom templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,
}

impl Config {
    /// Create a new Config with default values
    pub fn new(schema: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            output_dir: output_dir.into(),
            genpkg: default_genpkg(),
            transport: default_transport(),
            runtime: default_runtime(),
            registry_scope: RegistryScope::default(),
            workers: None,
            template_kind: TemplateKind::default(),
            template_dir: None,
        }
    }

    /// Load configuration from a file. `.toml` files are read as TOML,
    /// everything else as YAML.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file, in the format implied by its extension
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| crate::Error::config(format!("Failed to serialize configuration: {e}")))?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content).await?;
        Ok(())
    }

    /// Worker count to use; never zero
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template_dir.as_ref().map(PathBuf::from)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

fn default_output_dir() -> String {
    "gen".to_string()
}

fn default_genpkg() -> String {
    "crate".to_string()
}

fn default_transport() -> String {
    "http".to_string()
}

fn default_runtime() -> String {
    "clientgen_runtime".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_roundtrip() -> crate::Result<()> {
        let dir = tempdir()?;

        let mut config = Config::new("design/pets.yaml", "out");
        config.registry_scope = RegistryScope::PerRun;
        config.workers = Some(3);

        for name in ["clientgen.yaml", "clientgen.toml"] {
            let file_path = dir.path().join(name);
            config.save(&file_path).await?;
            let loaded = Config::from_file(&file_path).await?;
            assert_eq!(loaded, config);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_minimal_file_uses_defaults() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("clientgen.yaml");
        fs::write(&file_path, "schema: pets.yaml\n").await?;

        let config = Config::from_file(&file_path).await?;
        assert_eq!(config.schema, "pets.yaml");
        assert_eq!(config.output_dir, "gen");
        assert_eq!(config.genpkg, "crate");
        assert_eq!(config.transport, "http");
        assert_eq!(config.registry_scope, RegistryScope::PerService);
        assert_eq!(config.template_kind, TemplateKind::Rust);
        assert_eq!(config.template_dir, None);
        Ok(())
    }

    #[test]
    fn test_worker_count_is_positive() {
        let mut config = Config::new("pets.yaml", "gen");
        assert!(config.worker_count() >= 1);
        config.workers = Some(0);
        assert_eq!(config.worker_count(), 1);
    }
}
