//! Section planning.
//!
//! A [`Plan`] is the ordered list of sections of one artifact. It is produced
//! by running a fixed table of [`PlanPhase`]s over the service descriptors;
//! each phase appends the sections of one kind, so the phase table alone
//! fixes the layout of every generated file:
//!
//! | phase        | sections                                                  |
//! |--------------|-----------------------------------------------------------|
//! | header       | file header                                               |
//! | declarations | request, response, error and attribute bodies, expanded types |
//! | constructors | body constructors, then result constructors               |
//! | views        | expanded-type conversions, one per view                   |
//! | helpers      | transform helpers                                         |
//! | validators   | body validators, then expanded-type validators            |
//!
//! Type declarations go through the [`DeduplicationRegistry`]; a name already
//! claimed is skipped. Constructors and validators are never skipped because
//! of that, they refer to the first claimed declaration of the name.
//!
//! Registry keys are qualified: bodies of an endpoint are keyed by the
//! service slug and their name, so they never collide with another service.
//! Attribute and expanded types are built from schema types alone and are
//! keyed by their plain name, which lets a shared registry declare them once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::descriptors::{
    BodyDescriptor, BodyId, BodyOwner, ExpandedId, HelperId, InitId, ServiceDescriptors,
};
use crate::error::{Error, Result};
use crate::registry::DeduplicationRegistry;
use crate::schema::SchemaModel;

/// Kind of a section; selects the template it is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Header,
    TypeDeclaration,
    BodyConstructor,
    ResultConstructor,
    ExpandedType,
    TransformHelper,
    Validator,
    ExpandedTypeValidator,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::TypeDeclaration => "type-declaration",
            Self::BodyConstructor => "body-constructor",
            Self::ResultConstructor => "result-constructor",
            Self::ExpandedType => "expanded-type",
            Self::TransformHelper => "transform-helper",
            Self::Validator => "validator",
            Self::ExpandedTypeValidator => "expanded-type-validator",
        }
    }

    pub fn all() -> &'static [SectionKind] {
        &[
            Self::Header,
            Self::TypeDeclaration,
            Self::BodyConstructor,
            Self::ResultConstructor,
            Self::ExpandedType,
            Self::TransformHelper,
            Self::Validator,
            Self::ExpandedTypeValidator,
        ]
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor a section is rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionTarget {
    Header,
    Body(BodyId),
    Expanded(ExpandedId),
    Init(InitId),
    /// A view of an expanded type, by index
    View(ExpandedId, usize),
    Helper(HelperId),
    Validate(BodyId),
    ExpandedValidate(ExpandedId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub target: SectionTarget,
    /// Declared type or function name
    pub name: String,
    /// Local type names the section refers to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Ordered sections of one artifact
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub service: String,
    pub sections: Vec<Section>,
}

impl Plan {
    pub fn count(&self, kind: SectionKind) -> usize {
        self.sections.iter().filter(|s| s.kind == kind).count()
    }

    pub fn names(&self, kind: SectionKind) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter(move |s| s.kind == kind)
            .map(|s| s.name.as_str())
    }
}

/// State shared by the phases of one plan
pub struct PlanContext<'a> {
    pub service: &'a ServiceDescriptors,
    pub schema: &'a SchemaModel,
    registry: &'a DeduplicationRegistry,
    sections: Vec<Section>,
    claimed: Vec<String>,
}

impl<'a> PlanContext<'a> {
    fn push(&mut self, kind: SectionKind, target: SectionTarget, name: impl Into<String>, references: Vec<String>) {
        self.sections.push(Section {
            kind,
            target,
            name: name.into(),
            references,
        });
    }

    /// Claim a registry key; false when it was already emitted.
    fn claim(&mut self, key: String) -> bool {
        if self.registry.claim_or_skip(&key) {
            self.claimed.push(key);
            true
        } else {
            false
        }
    }

    fn inconsistency(&self, endpoint: &str, path: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::inconsistency(&self.service.name, endpoint, path, reason)
    }
}

/// One step of planning
pub trait PlanPhase: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()>;
}

struct HeaderPhase;
struct DeclarationPhase;
struct ConstructorPhase;
struct ViewPhase;
struct HelperPhase;
struct ValidatorPhase;

static PHASES: &[&dyn PlanPhase] = &[
    &HeaderPhase,
    &DeclarationPhase,
    &ConstructorPhase,
    &ViewPhase,
    &HelperPhase,
    &ValidatorPhase,
];

/// Registry key of a declared body
fn body_key(service: &ServiceDescriptors, body: &BodyDescriptor) -> String {
    match body.owner {
        BodyOwner::Attribute => body.type_name.clone(),
        BodyOwner::Request | BodyOwner::Response | BodyOwner::Error => {
            format!("{}::{}", service.slug, body.type_name)
        }
    }
}

/// Declared bodies: request bodies, then response bodies, then error bodies,
/// then attribute types.
fn declaration_order(d: &ServiceDescriptors) -> Vec<BodyId> {
    let requests = d.endpoints.iter().filter_map(|e| e.payload.request_body);
    let responses = d
        .endpoints
        .iter()
        .flat_map(|e| e.result.responses.iter().filter_map(|r| r.body));
    let errors = d.endpoints.iter().flat_map(|e| e.errors.iter().filter_map(|r| r.body));
    requests
        .chain(responses)
        .chain(errors)
        .chain(d.attribute_types.iter().copied())
        .filter(|id| d.body(*id).declared)
        .collect()
}

impl PlanPhase for HeaderPhase {
    fn name(&self) -> &'static str {
        "header"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let name = cx.service.name.clone();
        cx.push(SectionKind::Header, SectionTarget::Header, name, Vec::new());
        Ok(())
    }
}

impl PlanPhase for DeclarationPhase {
    fn name(&self) -> &'static str {
        "declarations"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let d = cx.service;
        for id in declaration_order(d) {
            let body = d.body(id);
            if cx.claim(body_key(d, body)) {
                cx.push(SectionKind::TypeDeclaration, SectionTarget::Body(id), &body.type_name, Vec::new());
            }
        }
        for (i, expanded) in d.expanded.iter().enumerate() {
            if cx.schema.user_type(&expanded.base).is_none() {
                return Err(cx.inconsistency(&expanded.base, "type", format!("expanded type '{}' is not declared", expanded.base)));
            }
            if cx.claim(expanded.type_name.clone()) {
                cx.push(
                    SectionKind::TypeDeclaration,
                    SectionTarget::Expanded(ExpandedId(i)),
                    &expanded.type_name,
                    Vec::new(),
                );
            }
        }
        Ok(())
    }
}

impl PlanPhase for ConstructorPhase {
    fn name(&self) -> &'static str {
        "constructors"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let d = cx.service;
        for ep in &d.endpoints {
            let Some(body_id) = ep.payload.request_body else { continue };
            let body = d.body(body_id);
            if let Some(init) = body.init {
                let references = if body.declared { vec![body.type_name.clone()] } else { Vec::new() };
                cx.push(SectionKind::BodyConstructor, SectionTarget::Init(init), &d.init(init).name, references);
            }
        }

        for ep in &d.endpoints {
            let results = ep
                .result
                .responses
                .iter()
                .map(|r| (r.body, r.result_init))
                .chain(ep.errors.iter().map(|e| (e.body, e.result_init)));
            for (body, init) in results {
                let Some(init) = init else { continue };
                let descriptor = d.init(init);
                if let Some(view) = &descriptor.view {
                    let viewed = cx.schema.user_type(&view.type_name).and_then(|t| t.view(&view.view));
                    if viewed.is_none() {
                        return Err(cx.inconsistency(
                            &ep.name,
                            format!("{}.view", descriptor.name),
                            format!("view '{}' is not declared on '{}'", view.view, view.type_name),
                        ));
                    }
                }
                let references = body
                    .map(|id| d.body(id))
                    .filter(|b| b.declared)
                    .map(|b| vec![b.type_name.clone()])
                    .unwrap_or_default();
                cx.push(SectionKind::ResultConstructor, SectionTarget::Init(init), &descriptor.name, references);
            }
        }
        Ok(())
    }
}

impl PlanPhase for ViewPhase {
    fn name(&self) -> &'static str {
        "views"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let d = cx.service;
        for (i, expanded) in d.expanded.iter().enumerate() {
            let base = cx.schema.user_type(&expanded.base);
            for (j, view) in expanded.views.iter().enumerate() {
                // every view must map to a declared result type
                if base.and_then(|t| t.view(&view.view)).is_none() || cx.schema.user_type(&view.target).is_none() {
                    return Err(cx.inconsistency(
                        &expanded.base,
                        format!("views.{}", view.view),
                        format!("view '{}' has no result type '{}'", view.view, view.target),
                    ));
                }
                cx.push(
                    SectionKind::ExpandedType,
                    SectionTarget::View(ExpandedId(i), j),
                    format!("{}::{}", expanded.type_name, view.function),
                    vec![expanded.type_name.clone()],
                );
            }
        }
        Ok(())
    }
}

impl PlanPhase for HelperPhase {
    fn name(&self) -> &'static str {
        "helpers"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let d = cx.service;
        let mut seen = HashSet::new();
        for (i, helper) in d.helpers.iter().enumerate() {
            if seen.insert(helper.name.as_str()) {
                cx.push(
                    SectionKind::TransformHelper,
                    SectionTarget::Helper(HelperId(i)),
                    &helper.name,
                    vec![helper.source.clone(), helper.target.clone()],
                );
            }
        }
        Ok(())
    }
}

impl PlanPhase for ValidatorPhase {
    fn name(&self) -> &'static str {
        "validators"
    }

    fn plan(&self, cx: &mut PlanContext<'_>) -> Result<()> {
        let d = cx.service;
        // one validator per type name within an artifact
        let mut seen = HashSet::new();
        for id in declaration_order(d) {
            let body = d.body(id);
            if let Some(validate) = &body.validate {
                if seen.insert(validate.type_name.as_str()) {
                    cx.push(SectionKind::Validator, SectionTarget::Validate(id), &validate.type_name, vec![validate.type_name.clone()]);
                }
            }
        }
        for (i, expanded) in d.expanded.iter().enumerate() {
            if let Some(validate) = &expanded.validate {
                if seen.insert(validate.type_name.as_str()) {
                    cx.push(
                        SectionKind::ExpandedTypeValidator,
                        SectionTarget::ExpandedValidate(ExpandedId(i)),
                        &validate.type_name,
                        vec![validate.type_name.clone()],
                    );
                }
            }
        }
        Ok(())
    }
}

/// Check that every locally declared type precedes its first use.
fn check_ordering(service: &str, sections: &[Section]) -> Result<()> {
    let declared: HashMap<&str, usize> = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == SectionKind::TypeDeclaration)
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    for (i, section) in sections.iter().enumerate() {
        for reference in &section.references {
            if let Some(at) = declared.get(reference.as_str()) {
                if *at > i {
                    return Err(Error::inconsistency(
                        service,
                        "",
                        &section.name,
                        format!("'{reference}' is declared after its first use"),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Plan the sections of one service.
///
/// Claims made against the registry are released again if planning fails,
/// so a failed service never hides declarations from the others.
pub fn plan(service: &ServiceDescriptors, schema: &SchemaModel, registry: &DeduplicationRegistry) -> Result<Plan> {
    let mut cx = PlanContext {
        service,
        schema,
        registry,
        sections: Vec::new(),
        claimed: Vec::new(),
    };
    for phase in PHASES {
        if let Err(e) = phase.plan(&mut cx) {
            registry.release(cx.claimed.iter().map(String::as_str));
            return Err(e);
        }
        log::debug!("Planned phase '{}' for service '{}'", phase.name(), service.name);
    }
    if let Err(e) = check_ordering(&service.name, &cx.sections) {
        registry.release(cx.claimed.iter().map(String::as_str));
        return Err(e);
    }
    log::info!("Planned {} sections for service '{}'", cx.sections.len(), service.name);
    Ok(Plan {
        service: service.name.clone(),
        sections: cx.sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::rust::RustTarget;
    use crate::builders::BodyDescriptorBuilder;

    const SCHEMA: &str = r#"
types:
  - name: Payload
    fields:
      - { name: id, type: string, required: true }
  - name: Pet
    fields:
      - { name: id, type: string, required: true }
      - { name: owner, type: Owner }
    views:
      - { name: tiny, fields: [id] }
      - { name: full, fields: [id, owner] }
      - { name: tag, result: PetTag, fields: [id] }
  - name: PetTag
    fields:
      - { name: id, type: string, required: true }
  - name: Owner
    fields:
      - { name: name, type: string, required: true }
  - name: Count
    fields:
      - { name: count, type: int64, required: true }
      - { name: label, type: string }
services:
  - name: pets
    endpoints:
      - { name: show, payload: Payload, result: Pet }
      - { name: update, payload: Payload, result: Pet }
  - name: owners
    endpoints:
      - { name: find, payload: Payload, result: Pet }
"#;

    fn descriptors(schema: &SchemaModel, index: usize) -> ServiceDescriptors {
        let service = &schema.services[index];
        let target = RustTarget::new(crate::utils::service_slug(&service.name), "rt");
        BodyDescriptorBuilder::new(schema, service, &target)
            .build()
            .expect("descriptors")
    }

    fn schema() -> SchemaModel {
        SchemaModel::parse_content(SCHEMA).expect("schema")
    }

    #[test]
    fn test_phase_order() {
        let schema = schema();
        let plan = plan(&descriptors(&schema, 0), &schema, &DeduplicationRegistry::new()).expect("plan");
        let kinds: Vec<_> = plan.sections.iter().map(|s| s.kind).collect();
        let mut last = 0;
        for kind in kinds {
            let rank = SectionKind::all().iter().position(|k| *k == kind).expect("known kind");
            assert!(rank >= last, "{kind} out of order");
            last = rank;
        }
        assert_eq!(plan.sections[0].kind, SectionKind::Header);
    }

    #[test]
    fn test_no_duplicate_declarations() {
        let schema = schema();
        let plan = plan(&descriptors(&schema, 0), &schema, &DeduplicationRegistry::new()).expect("plan");
        let names: Vec<_> = plan.names(SectionKind::TypeDeclaration).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.iter().filter(|n| **n == "OwnerResponseBody").count(), 1);
        assert_eq!(plan.count(SectionKind::BodyConstructor), 2);
        assert_eq!(plan.count(SectionKind::ResultConstructor), 2);
    }

    #[test]
    fn test_every_view_has_a_section() {
        let schema = schema();
        let plan = plan(&descriptors(&schema, 0), &schema, &DeduplicationRegistry::new()).expect("plan");
        assert_eq!(
            plan.names(SectionKind::ExpandedType).collect::<Vec<_>>(),
            vec![
                "PetExpanded::as_tiny_view",
                "PetExpanded::as_full_view",
                "PetExpanded::as_tag_view",
            ]
        );
        let targets: Vec<_> = plan
            .sections
            .iter()
            .filter_map(|s| match s.target {
                SectionTarget::View(id, index) => Some((id.0, index)),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![(0, 0), (0, 1), (0, 2)]);
        assert_eq!(plan.count(SectionKind::ExpandedTypeValidator), 1);
    }

    #[test]
    fn test_shared_registry_skips_declarations_but_keeps_validators() {
        let schema = schema();
        let registry = DeduplicationRegistry::new();
        plan(&descriptors(&schema, 0), &schema, &registry).expect("first plan");
        let second = plan(&descriptors(&schema, 1), &schema, &registry).expect("second plan");
        let declared: Vec<_> = second.names(SectionKind::TypeDeclaration).collect();
        assert!(!declared.contains(&"OwnerResponseBody"));
        assert!(!declared.contains(&"PetExpanded"));
        assert!(second.names(SectionKind::Validator).any(|n| n == "OwnerResponseBody"));
    }

    #[test]
    fn test_endpoint_bodies_are_keyed_by_service() {
        let yaml = format!("{SCHEMA}  - name: counters\n    endpoints:\n      - {{ name: show, payload: Count }}\n");
        let schema = SchemaModel::parse_content(&yaml).expect("schema");
        let registry = DeduplicationRegistry::new();
        let first = plan(&descriptors(&schema, 0), &schema, &registry).expect("first plan");
        let second = plan(&descriptors(&schema, 2), &schema, &registry).expect("second plan");

        assert!(first.names(SectionKind::TypeDeclaration).any(|n| n == "ShowRequestBody"));
        assert!(second.names(SectionKind::TypeDeclaration).any(|n| n == "ShowRequestBody"));
        assert!(registry.is_claimed("pets::ShowRequestBody"));
        assert!(registry.is_claimed("counters::ShowRequestBody"));
        assert!(registry.is_claimed("OwnerResponseBody"));
    }

    #[test]
    fn test_failed_plan_releases_claims() {
        let schema = schema();
        let registry = DeduplicationRegistry::new();
        let mut broken = descriptors(&schema, 0);
        broken.expanded[0].views[0].target = "Missing".to_string();
        assert!(matches!(plan(&broken, &schema, &registry), Err(Error::SchemaInconsistency { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ordering_violation_is_reported() {
        let sections = vec![
            Section {
                kind: SectionKind::BodyConstructor,
                target: SectionTarget::Init(InitId(0)),
                name: "new_show_request_body".into(),
                references: vec!["ShowRequestBody".into()],
            },
            Section {
                kind: SectionKind::TypeDeclaration,
                target: SectionTarget::Body(BodyId(0)),
                name: "ShowRequestBody".into(),
                references: Vec::new(),
            },
        ];
        assert!(check_ordering("pets", &sections).is_err());
    }
}
