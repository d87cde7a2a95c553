//! Artifact assembly.
//!
//! The assembler renders every section of a [`Plan`] with its template and
//! concatenates the results in plan order. Rendering only reads the
//! descriptors, so the same plan always yields the same text.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tera::Context;

use crate::descriptors::ServiceDescriptors;
use crate::error::{Error, Result};
use crate::planner::{Plan, Section, SectionTarget};
use crate::templates::TemplateManager;

/// Generated source of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub service: String,
    pub path: PathBuf,
    pub text: String,
}

/// Settings that end up in every artifact
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Root of the generated tree
    pub output_dir: PathBuf,
    /// Transport directory under the root (`http`)
    pub transport: String,
    /// Package path the service modules are imported from
    pub genpkg: String,
    /// Crate path providing validation errors
    pub runtime: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactAssembler {
    templates: Arc<TemplateManager>,
    options: AssemblyOptions,
}

impl ArtifactAssembler {
    pub fn new(templates: Arc<TemplateManager>, options: AssemblyOptions) -> Self {
        Self { templates, options }
    }

    pub fn templates(&self) -> &TemplateManager {
        &self.templates
    }

    /// `<root>/<transport>/<slug>/client/types.<ext>`
    pub fn artifact_path(&self, slug: &str) -> PathBuf {
        self.options
            .output_dir
            .join(&self.options.transport)
            .join(slug)
            .join("client")
            .join(format!("types.{}", self.templates.extension()))
    }

    /// Render the sections of `plan` into the artifact of `service`.
    pub fn assemble(&self, service: &ServiceDescriptors, plan: &Plan) -> Result<Artifact> {
        let mut parts = Vec::with_capacity(plan.sections.len());
        for section in &plan.sections {
            let context = self.context(service, section);
            let text = self.templates.render(section.kind, &context).map_err(|message| {
                Error::render(&service.name, section.kind.as_str(), &section.name, message)
            })?;
            parts.push(text.trim_end().to_string());
        }

        let mut text = parts.join("\n\n");
        text.push('\n');
        let path = self.artifact_path(&service.slug);
        log::info!(
            "Assembled {} sections for service '{}' into {}",
            plan.sections.len(),
            service.name,
            path.display()
        );
        Ok(Artifact {
            service: service.name.clone(),
            path,
            text,
        })
    }

    fn context(&self, service: &ServiceDescriptors, section: &Section) -> Context {
        let mut context = Context::new();
        context.insert("runtime", &self.options.runtime);
        context.insert("genpkg", &self.options.genpkg);
        context.insert("kind", section.kind.as_str());

        match section.target {
            SectionTarget::Header => {
                context.insert(
                    "service",
                    &json!({
                        "name": service.name,
                        "slug": service.slug,
                        "description": service.description,
                    }),
                );
            }
            SectionTarget::Body(id) => context.insert("decl", service.body(id)),
            SectionTarget::Expanded(id) => context.insert("decl", service.expanded_type(id)),
            SectionTarget::Init(id) => context.insert("init", service.init(id)),
            SectionTarget::View(id, index) => {
                let expanded = service.expanded_type(id);
                context.insert("expanded", expanded);
                context.insert("view", &expanded.views[index]);
            }
            SectionTarget::Helper(id) => context.insert("helper", service.helper(id)),
            SectionTarget::Validate(id) => context.insert("validate", &service.body(id).validate),
            SectionTarget::ExpandedValidate(id) => {
                context.insert("validate", &service.expanded_type(id).validate)
            }
        }
        context
    }
}
