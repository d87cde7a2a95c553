//! Manifest file format for clientgen templates.
//!
//! A custom template directory may carry a `manifest.yaml` (or
//! `manifest.toml`) naming the template file used for each section kind and
//! the extension of the generated artifact. Kinds it does not list use the
//! conventional `<kind>.tera` file name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::planner::SectionKind;

/// The root manifest structure for a template set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    /// The name of the template set
    pub name: String,

    /// A short description of what the templates generate
    #[serde(default)]
    pub description: String,

    /// The version of the template set (should follow semantic versioning)
    #[serde(default = "default_version")]
    pub version: String,

    /// Extension of generated artifacts, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Template file per section kind (e.g. `validator: checks.tera`)
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

impl Default for TemplateManifest {
    fn default() -> Self {
        Self {
            name: String::from("rust"),
            description: String::from("Rust client types"),
            version: default_version(),
            extension: default_extension(),
            sections: BTreeMap::new(),
        }
    }
}

fn default_version() -> String {
    String::from("0.1.0")
}

fn default_extension() -> String {
    String::from("rs")
}

/// Conventional template file name of a section kind
pub fn default_template_name(kind: SectionKind) -> String {
    format!("{}.tera", kind.as_str().replace('-', "_"))
}

impl TemplateManifest {
    /// Template file rendering sections of `kind`
    pub fn template_for(&self, kind: SectionKind) -> String {
        self.sections
            .get(kind.as_str())
            .cloned()
            .unwrap_or_else(|| default_template_name(kind))
    }

    /// Load the manifest of a template directory, trying YAML first, then
    /// TOML. A directory without a manifest gets the defaults.
    pub async fn load_from_dir(template_dir: &Path) -> crate::Result<Self> {
        let yaml_path = template_dir.join("manifest.yaml");
        let toml_path = template_dir.join("manifest.toml");

        let manifest: Self = if yaml_path.exists() {
            let content = fs::read_to_string(&yaml_path).await?;
            serde_yaml::from_str(&content).map_err(|e| {
                crate::Error::template(format!(
                    "Invalid YAML in template manifest at {}: {}",
                    yaml_path.display(),
                    e
                ))
            })?
        } else if toml_path.exists() {
            let content = fs::read_to_string(&toml_path).await?;
            toml::from_str(&content)?
        } else {
            log::debug!("No manifest in {}, using defaults", template_dir.display());
            return Ok(Self::default());
        };

        for key in manifest.sections.keys() {
            if !SectionKind::all().iter().any(|k| k.as_str() == key) {
                return Err(crate::Error::template(format!(
                    "Unknown section kind '{}' in template manifest at {}",
                    key,
                    template_dir.display()
                )));
            }
        }
        Ok(manifest)
    }
}
