//! Template system for section rendering

// Internal imports (std, crate)
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    manifest::TemplateManifest,
    planner::SectionKind,
};

use super::TemplateKind;

// External imports (alphabetized)
use tera::{Context, Tera, Value};

/// Rust templates shipped with the library
const EMBEDDED: &[(&str, &str)] = &[
    ("header.tera", include_str!("../../templates/rust/header.tera")),
    ("type_declaration.tera", include_str!("../../templates/rust/type_declaration.tera")),
    ("body_constructor.tera", include_str!("../../templates/rust/body_constructor.tera")),
    ("result_constructor.tera", include_str!("../../templates/rust/result_constructor.tera")),
    ("expanded_type.tera", include_str!("../../templates/rust/expanded_type.tera")),
    ("transform_helper.tera", include_str!("../../templates/rust/transform_helper.tera")),
    ("validator.tera", include_str!("../../templates/rust/validator.tera")),
    (
        "expanded_type_validator.tera",
        include_str!("../../templates/rust/expanded_type_validator.tera"),
    ),
];

/// Loads section templates and renders sections with them
#[derive(Debug, Clone)]
pub struct TemplateManager {
    /// Cached Tera template engine instance
    tera: Arc<Tera>,
    kind: TemplateKind,
    /// Directory custom templates were loaded from
    template_dir: Option<PathBuf>,
    manifest: TemplateManifest,
}

impl TemplateManager {
    /// Create a TemplateManager for the given template kind.
    ///
    /// `Rust` uses the embedded templates; `Custom` requires `template_dir`
    /// and loads every `*.tera` file below it.
    pub async fn new(kind: TemplateKind, template_dir: Option<PathBuf>) -> Result<Self> {
        match (kind, template_dir) {
            (TemplateKind::Rust, None) => Self::embedded(),
            (TemplateKind::Rust, Some(dir)) => {
                log::warn!(
                    "Ignoring template directory {} for embedded rust templates",
                    dir.display()
                );
                Self::embedded()
            }
            (TemplateKind::Custom, Some(dir)) => Self::from_dir(&dir).await,
            (TemplateKind::Custom, None) => Err(Error::config(
                "custom templates require a template directory",
            )),
        }
    }

    /// TemplateManager over the embedded Rust templates
    pub fn embedded() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(EMBEDDED.iter().copied())
            .map_err(|e| Error::template(format!("Failed to parse embedded templates: {}", describe(&e))))?;
        register_filters(&mut tera);
        let manager = Self {
            tera: Arc::new(tera),
            kind: TemplateKind::Rust,
            template_dir: None,
            manifest: TemplateManifest::default(),
        };
        manager.check_sections()?;
        Ok(manager)
    }

    async fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::template(format!(
                "Template directory not found: {}",
                dir.display()
            )));
        }
        let manifest = TemplateManifest::load_from_dir(dir).await?;
        let glob = format!("{}/**/*.tera", dir.display());
        let mut tera = Tera::new(&glob)
            .map_err(|e| Error::template(format!("Failed to parse templates: {}", describe(&e))))?;
        register_filters(&mut tera);
        log::debug!(
            "Loaded templates from {}: {:?}",
            dir.display(),
            tera.get_template_names().collect::<Vec<_>>()
        );

        let manager = Self {
            tera: Arc::new(tera),
            kind: TemplateKind::Custom,
            template_dir: Some(dir.to_path_buf()),
            manifest,
        };
        manager.check_sections()?;
        Ok(manager)
    }

    /// Every section kind must have a template
    fn check_sections(&self) -> Result<()> {
        for kind in SectionKind::all() {
            let name = self.manifest.template_for(*kind);
            if !self.has_template(&name) {
                return Err(Error::template(format!(
                    "Missing template '{}' for {} sections",
                    name, kind
                )));
            }
        }
        Ok(())
    }

    /// Get the template kind this template manager is configured for
    pub fn template_kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    /// Get a reference to the template manifest
    pub fn manifest(&self) -> &TemplateManifest {
        &self.manifest
    }

    /// Extension of the artifacts these templates produce
    pub fn extension(&self) -> &str {
        &self.manifest.extension
    }

    /// Check if a template exists
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template(name).is_ok()
    }

    /// Render one section. The error message includes the tera error chain.
    pub fn render(&self, kind: SectionKind, context: &Context) -> std::result::Result<String, String> {
        let name = self.manifest.template_for(kind);
        log::debug!("Rendering {} section with template: {}", kind, name);
        self.tera.render(&name, context).map_err(|e| {
            log::error!("Template rendering failed for '{}': {}", name, e);
            describe(&e)
        })
    }
}

/// Message of a tera error with its sources
fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn register_filters(tera: &mut Tera) {
    tera.register_filter("doc", doc_filter);
}

/// Turns text into line comments: `{{ text | doc(indent=4, prefix="// ") }}`.
/// The prefix defaults to `/// `.
fn doc_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Null => "",
        other => return Err(tera::Error::msg(format!("doc filter expects a string, got {}", other))),
    };
    let indent = args.get("indent").and_then(Value::as_u64).unwrap_or(0) as usize;
    let prefix = args.get("prefix").and_then(Value::as_str).unwrap_or("/// ");
    let pad = " ".repeat(indent);

    let lines: Vec<String> = text
        .trim()
        .lines()
        .map(|line| format!("{pad}{prefix}{}", line.trim_end()).trim_end().to_string())
        .collect();
    Ok(Value::String(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::default_template_name;
    use tempfile::tempdir;

    #[test]
    fn test_embedded_templates_cover_every_section() {
        let manager = TemplateManager::embedded().expect("embedded templates");
        for kind in SectionKind::all() {
            assert!(manager.has_template(&default_template_name(*kind)));
        }
        assert_eq!(EMBEDDED.len(), SectionKind::all().len());
        assert_eq!(manager.extension(), "rs");
    }

    #[test]
    fn test_doc_filter() {
        let mut args = HashMap::new();
        let out = doc_filter(&Value::from("First line.\nSecond line."), &args).unwrap();
        assert_eq!(out, Value::from("/// First line.\n/// Second line."));

        args.insert("indent".to_string(), Value::from(4));
        args.insert("prefix".to_string(), Value::from("// "));
        let out = doc_filter(&Value::from("Note"), &args).unwrap();
        assert_eq!(out, Value::from("    // Note"));
    }

    #[tokio::test]
    async fn test_custom_dir_requires_every_template() -> crate::Result<()> {
        let dir = tempdir()?;
        tokio::fs::write(dir.path().join("header.tera"), "// {{ service.name }}").await?;
        let err = TemplateManager::new(TemplateKind::Custom, Some(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing template"));
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_kind_without_dir_is_a_config_error() {
        let err = TemplateManager::new(TemplateKind::Custom, None).await.unwrap_err();
        assert_eq!(err.kind(), "Config");
    }
}
