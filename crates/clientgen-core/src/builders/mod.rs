//! Descriptor builders and the language seam they emit through.
//!
//! [`BodyDescriptorBuilder`] walks one service of the schema and produces its
//! [`ServiceDescriptors`]: request, response and error bodies, shared
//! body-attribute types, constructors, validators, expanded types and the
//! transform helpers they need. Everything language specific (type
//! references, conversion expressions, validation code) goes through a
//! [`TargetLanguage`].
pub mod rust;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value as JsonValue;

use crate::descriptors::{
    ArgumentDescriptor, BodyDescriptor, BodyId, BodyOwner, EndpointDescriptor, ErrorDescriptor,
    ExpandedId, ExpandedTypeDescriptor, FieldDescriptor, HelperId, InitDescriptor, InitId,
    PayloadDescriptor, ResponseDescriptor, ResultDescriptor, ReturnInfo, ServiceDescriptors,
    TransformHelperDescriptor, ValidateDescriptor, ViewDescriptor, ViewRef,
};
use crate::error::{Error, Result};
use crate::policy::{self, FieldContext, FieldKind, FieldShape, Representation};
use crate::schema::{
    BodyDef, EndpointDef, FieldDef, Mapping, SchemaModel, ServiceDef, TypeRef, UserType, ViewDef,
};
use crate::templates::TemplateKind;
use crate::utils::{service_slug, status_name, to_upper_camel_case};

/// Which family of generated types a reference points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Payload and result types of the service module
    Service,
    /// Types encoded into request bodies
    RequestBody,
    /// Types decoded from response and error bodies
    ResponseBody,
}

impl Side {
    /// Context fields of nested types on this side resolve in
    fn context(self) -> FieldContext {
        match self {
            Self::Service | Self::RequestBody => FieldContext::Payload,
            Self::ResponseBody => FieldContext::Body,
        }
    }
}

/// A place expression a conversion reads from
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// A local the conversion may move out of
    Owned(&'a str),
    /// A place behind a shared reference
    Borrowed(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub repr: Representation,
    pub side: Side,
}

impl Slot {
    pub fn new(repr: Representation, side: Side) -> Self {
        Self { repr, side }
    }
}

/// A single field conversion between two slots
#[derive(Debug, Clone, Copy)]
pub struct Conversion<'a> {
    pub source: Source<'a>,
    pub ty: &'a TypeRef,
    pub from: Slot,
    pub to: Slot,
    /// Default used when an optional source is absent and the target is a value
    pub default: Option<&'a JsonValue>,
}

/// A field that needs at least one validation
#[derive(Debug, Clone, Copy)]
pub struct FieldCheck<'a> {
    pub field: &'a FieldDescriptor,
    pub def: &'a FieldDef,
    /// The field's type (or its collection elements) has a validator
    pub nested_validated: bool,
}

impl FieldCheck<'_> {
    fn is_needed(&self) -> bool {
        (self.def.required && self.field.representation.is_optional())
            || !self.def.constraints.is_empty()
            || self.nested_validated
    }
}

/// Called by conversions that need a shared helper: `(type, from, to)` to
/// the helper's function name.
pub type HelperFn<'a> = dyn FnMut(&str, Side, Side) -> Result<String> + 'a;

/// Language-specific code generation used by the builder.
pub trait TargetLanguage: fmt::Debug + Send + Sync {
    /// Name of the user type `name` on `side`
    fn type_name(&self, name: &str, side: Side) -> String;

    /// Reference to a field type with the given representation
    fn type_ref(&self, ty: &TypeRef, repr: Representation, side: Side) -> String;

    /// Reference used for arguments passed by shared reference
    fn borrowed(&self, type_ref: &str) -> String;

    fn field_ident(&self, name: &str) -> String;

    fn function_name(&self, name: &str) -> String;

    /// Expression converting one field between two slots
    fn convert(&self, conv: Conversion<'_>, helper: &mut HelperFn<'_>) -> Result<String>;

    /// Expression for a field no source provides
    fn default_value(&self, ty: &TypeRef, repr: Representation, default: Option<&JsonValue>) -> String;

    /// Wraps a value expression into the given representation
    fn wrap(&self, expr: &str, ty: &TypeRef, repr: Representation) -> String;

    /// Code building `type_ref` from field expressions, after `prelude` bindings
    fn construct(
        &self,
        prelude: &[(String, String)],
        type_ref: &str,
        fields: &[(String, String)],
        indent: usize,
    ) -> String;

    /// Statements checking the given fields; `context` prefixes error paths
    fn validation(&self, checks: &[FieldCheck<'_>], context: &str, indent: usize) -> String;
}

/// Pick the target language for a template kind. Custom templates re-skin
/// the Rust output, so both kinds share the Rust target.
pub fn target_for(kind: TemplateKind, runtime: &str, service_module: &str) -> Box<dyn TargetLanguage> {
    match kind {
        TemplateKind::Rust | TemplateKind::Custom => {
            Box::new(rust::RustTarget::new(service_module, runtime))
        }
    }
}

/// Names handed out within one artifact. A name already taken gets the
/// first free numeric suffix: `ShowResponseBody`, `ShowResponseBody2`, ...
#[derive(Debug, Default)]
struct NameScope {
    /// Taken names, with the last suffix tried for each
    taken: HashMap<String, usize>,
}

impl NameScope {
    fn reserve(&mut self, name: &str) {
        self.taken.entry(name.to_string()).or_insert(1);
    }

    fn unique(&mut self, name: &str) -> String {
        let Some(&last) = self.taken.get(name) else {
            self.taken.insert(name.to_string(), 1);
            return name.to_string();
        };
        let mut n = last;
        loop {
            n += 1;
            let candidate = format!("{name}{n}");
            if !self.taken.contains_key(&candidate) {
                self.taken.insert(name.to_string(), n);
                self.taken.insert(candidate.clone(), 1);
                return candidate;
            }
        }
    }
}

/// Identity of a shared body-attribute type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShapeKey {
    side: Side,
    type_name: String,
}

/// Argument or body shape compared to decide whether a constructor is needed
#[derive(Debug, PartialEq, Eq)]
struct Shape {
    type_name: Option<String>,
    members: Vec<(String, String)>,
}

/// How the body of a message is bound to the fields of its type
enum Binding<'a> {
    /// No field travels in the body
    Empty,
    /// A struct made of these fields
    Struct(Vec<&'a FieldDef>),
    /// The body is a struct mirroring the object type of this field
    Wrapped(&'a FieldDef, &'a UserType),
    /// The body is the bare value of this primitive or collection field
    Bare(&'a FieldDef),
}

/// Builds the descriptors of one service.
#[derive(Debug)]
pub struct BodyDescriptorBuilder<'a> {
    schema: &'a SchemaModel,
    service: &'a ServiceDef,
    target: &'a dyn TargetLanguage,
    out: ServiceDescriptors,
    attributes: HashMap<ShapeKey, BodyId>,
    helpers: HashMap<String, HelperId>,
    expanded: HashMap<String, ExpandedId>,
    /// Declared type names of the artifact
    types: NameScope,
    /// Constructor names of the artifact
    functions: NameScope,
    /// Endpoint (or type) being built, for error context
    location: String,
}

impl<'a> BodyDescriptorBuilder<'a> {
    pub fn new(schema: &'a SchemaModel, service: &'a ServiceDef, target: &'a dyn TargetLanguage) -> Self {
        Self {
            schema,
            service,
            target,
            out: ServiceDescriptors::default(),
            attributes: HashMap::new(),
            helpers: HashMap::new(),
            expanded: HashMap::new(),
            types: NameScope::default(),
            functions: NameScope::default(),
            location: String::new(),
        }
    }

    /// Build the descriptors of every endpoint of the service.
    pub fn build(mut self) -> Result<ServiceDescriptors> {
        let service = self.service;
        self.out.name = service.name.clone();
        self.out.slug = service_slug(&service.name);
        self.out.description = service.description.clone();
        self.reserve_attribute_names()?;

        for ep in &service.endpoints {
            self.location = ep.name.clone();
            let descriptor = self.endpoint(ep)?;
            self.out.endpoints.push(descriptor);
        }

        for ep in &service.endpoints {
            self.location = ep.name.clone();
            if let Some(name) = &ep.result {
                let ty = self.lookup(name, "result")?;
                if !ty.views.is_empty() {
                    self.expanded_type(ty)?;
                }
            }
        }

        log::debug!(
            "Built {} bodies, {} constructors, {} expanded types and {} helpers for service '{}'",
            self.out.bodies.len(),
            self.out.inits.len(),
            self.out.expanded.len(),
            self.out.helpers.len(),
            service.name
        );
        Ok(self.out)
    }

    /// Attribute types keep the plain `{Type}RequestBody` and
    /// `{Type}ResponseBody` names; endpoint bodies are named around them.
    fn reserve_attribute_names(&mut self) -> Result<()> {
        let schema = self.schema;
        let mut generated: HashMap<String, &'a str> = HashMap::new();
        for ty in &schema.types {
            for side in [Side::RequestBody, Side::ResponseBody] {
                let name = self.target.type_name(&ty.name, side);
                if let Some(other) = generated.insert(name.clone(), &ty.name) {
                    return Err(self.inconsistency(
                        format!("types.{}", ty.name),
                        format!("type '{}' generates '{name}', which type '{other}' already uses", ty.name),
                    ));
                }
                self.types.reserve(&name);
            }
        }
        Ok(())
    }

    fn inconsistency(&self, path: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::inconsistency(&self.service.name, &self.location, path, reason)
    }

    fn lookup(&self, name: &str, path: &str) -> Result<&'a UserType> {
        let schema: &'a SchemaModel = self.schema;
        schema
            .user_type(name)
            .ok_or_else(|| self.inconsistency(path, format!("type '{name}' is not declared")))
    }

    fn field_of(&self, ty: &'a UserType, name: &str, path: &str) -> Result<&'a FieldDef> {
        ty.field(name).ok_or_else(|| {
            self.inconsistency(path, format!("field '{name}' is not declared on '{}'", ty.name))
        })
    }

    fn resolve(&self, field: &FieldDef, context: FieldContext, path: &str) -> Result<Representation> {
        let shape = FieldShape {
            required: field.required,
            has_default: field.has_default(),
            kind: FieldKind::of(&field.ty),
        };
        policy::resolve(shape, context, &format!("{}.{}", self.service.name, path))
    }

    /// Resolve a field and make sure the body-attribute types it references exist.
    fn field(
        &mut self,
        field: &FieldDef,
        context: FieldContext,
        side: Side,
        path: &str,
    ) -> Result<FieldDescriptor> {
        let repr = self.resolve(field, context, path)?;
        if side != Side::Service {
            for name in field.ty.named_types() {
                self.attribute_type(name, side)?;
            }
        }
        Ok(FieldDescriptor {
            ident: self.target.field_ident(&field.name),
            wire_name: field.wire_name().to_string(),
            type_ref: self.target.type_ref(&field.ty, repr, side),
            representation: repr,
            description: field.description.clone(),
        })
    }

    fn fields(
        &mut self,
        defs: &[&FieldDef],
        context: FieldContext,
        side: Side,
        path: &str,
    ) -> Result<Vec<FieldDescriptor>> {
        defs.iter()
            .map(|f| self.field(f, context, side, &format!("{path}.{}", f.name)))
            .collect()
    }

    /// Shared type for a user type nested in a body; built once per shape.
    fn attribute_type(&mut self, name: &str, side: Side) -> Result<BodyId> {
        let key = ShapeKey {
            side,
            type_name: name.to_string(),
        };
        if let Some(id) = self.attributes.get(&key) {
            return Ok(*id);
        }
        let ty = self.lookup(name, name)?;
        let type_name = self.target.type_name(name, side);

        // reserve the slot first so recursive types resolve to it
        let id = BodyId(self.out.bodies.len());
        self.out.bodies.push(BodyDescriptor {
            owner: BodyOwner::Attribute,
            type_name: type_name.clone(),
            type_ref: type_name.clone(),
            description: String::new(),
            fields: Vec::new(),
            declared: true,
            init: None,
            validate: None,
        });
        self.attributes.insert(key, id);

        let defs: Vec<&FieldDef> = ty.fields.iter().collect();
        let fields = self.fields(&defs, side.context(), side, name)?;
        let validate = self.validation(&type_name, &fields, &defs, side, "body");
        let description = ty.description.clone().unwrap_or_else(|| match side {
            Side::ResponseBody => format!("{type_name} is used to define fields on response body types."),
            _ => format!("{type_name} is used to define fields on request body types."),
        });

        let body = &mut self.out.bodies[id.0];
        body.description = description;
        body.fields = fields;
        body.validate = validate;
        self.out.attribute_types.push(id);
        Ok(id)
    }

    fn nested_validated(&self, ty: &TypeRef, side: Side) -> bool {
        let named = match ty {
            TypeRef::Named(name) => name,
            TypeRef::Array(elem) | TypeRef::Map(_, elem) => match elem.as_ref() {
                TypeRef::Named(name) => name,
                _ => return false,
            },
            TypeRef::Primitive(_) => return false,
        };
        let key = ShapeKey {
            side,
            type_name: named.clone(),
        };
        self.attributes
            .get(&key)
            .is_some_and(|id| self.out.bodies[id.0].validate.is_some())
    }

    fn validation(
        &self,
        type_name: &str,
        fields: &[FieldDescriptor],
        defs: &[&FieldDef],
        side: Side,
        context: &str,
    ) -> Option<ValidateDescriptor> {
        let checks: Vec<FieldCheck<'_>> = fields
            .iter()
            .zip(defs)
            .map(|(field, def)| FieldCheck {
                field,
                def,
                nested_validated: self.nested_validated(&def.ty, side),
            })
            .filter(FieldCheck::is_needed)
            .collect();
        if checks.is_empty() {
            return None;
        }
        Some(ValidateDescriptor {
            type_name: type_name.to_string(),
            code: self.target.validation(&checks, context, 8),
        })
    }

    /// Conversion expression, registering helpers as needed.
    fn convert(&mut self, conv: Conversion<'_>) -> Result<String> {
        let target = self.target;
        target.convert(conv, &mut |name, from, to| self.helper(name, from, to))
    }

    /// Name of the helper converting `name` values between sides.
    fn helper(&mut self, name: &str, from: Side, to: Side) -> Result<String> {
        let module = self.out.slug.clone();
        let raw = match (from, to) {
            (Side::Service, Side::RequestBody) => format!("marshal_{module}_{name}_to_{name}_request_body"),
            (Side::ResponseBody, Side::Service) => format!("unmarshal_{name}_response_body_to_{module}_{name}"),
            (Side::RequestBody, Side::Service) => format!("unmarshal_{name}_request_body_to_{module}_{name}"),
            (Side::Service, Side::ResponseBody) => format!("marshal_{module}_{name}_to_{name}_response_body"),
            _ => format!("convert_{name}_{from:?}_to_{to:?}"),
        };
        let fn_name = self.target.function_name(&raw);
        if self.helpers.contains_key(&fn_name) {
            return Ok(fn_name);
        }
        let ty = self.lookup(name, name)?;
        let source = self.target.type_name(name, from);
        let target_ref = self.target.type_name(name, to);

        let id = HelperId(self.out.helpers.len());
        self.out.helpers.push(TransformHelperDescriptor {
            name: fn_name.clone(),
            description: format!("{fn_name} builds a value of type {target_ref} from a value of type {source}."),
            source,
            target: target_ref.clone(),
            code: String::new(),
        });
        self.helpers.insert(fn_name.clone(), id);

        let mut assignments = Vec::with_capacity(ty.fields.len());
        for f in &ty.fields {
            let path = format!("{name}.{}", f.name);
            let from_repr = self.resolve(f, from.context(), &path)?;
            let to_repr = self.resolve(f, to.context(), &path)?;
            let place = format!("v.{}", self.target.field_ident(&f.name));
            let expr = self.convert(Conversion {
                source: Source::Borrowed(&place),
                ty: &f.ty,
                from: Slot::new(from_repr, from),
                to: Slot::new(to_repr, to),
                default: f.default.as_ref(),
            })?;
            assignments.push((self.target.field_ident(&f.name), expr));
        }
        self.out.helpers[id.0].code = self.target.construct(&[], &target_ref, &assignments, 4);
        Ok(fn_name)
    }

    /// Decide which fields of `ty` travel in the body.
    fn bind(
        &self,
        ty: &'a UserType,
        excluded: &HashSet<&str>,
        body: Option<&BodyDef>,
        view: Option<&ViewDef>,
        path: &str,
    ) -> Result<Binding<'a>> {
        let in_view = |name: &str| view.map_or(true, |v| v.fields.iter().any(|f| f == name));
        let members: Vec<&'a FieldDef> = match body {
            None => ty
                .fields
                .iter()
                .filter(|f| !excluded.contains(f.name.as_str()) && in_view(&f.name))
                .collect(),
            Some(BodyDef::Fields(names)) => {
                for name in names {
                    self.field_of(ty, name, path)?;
                }
                ty.fields.iter().filter(|f| names.contains(&f.name)).collect()
            }
            Some(BodyDef::Attribute(name)) => {
                let field = self.field_of(ty, name, path)?;
                return Ok(match &field.ty {
                    TypeRef::Named(nested) => Binding::Wrapped(field, self.lookup(nested, path)?),
                    _ => Binding::Bare(field),
                });
            }
        };
        Ok(if members.is_empty() {
            Binding::Empty
        } else {
            Binding::Struct(members)
        })
    }

    fn mapped_fields(&self, ty: &'a UserType, mappings: &[Mapping], path: &str) -> Result<Vec<&'a FieldDef>> {
        mappings
            .iter()
            .map(|m| self.field_of(ty, m.field(), &format!("{path}.{}", m.field())))
            .collect()
    }

    fn endpoint(&mut self, ep: &'a EndpointDef) -> Result<EndpointDescriptor> {
        let payload = ep
            .payload
            .as_deref()
            .map(|name| self.lookup(name, &format!("{}.payload", ep.name)))
            .transpose()?;
        let result = ep
            .result
            .as_deref()
            .map(|name| self.lookup(name, &format!("{}.result", ep.name)))
            .transpose()?;

        let mappings: Vec<&Mapping> = ep.request.headers.iter().chain(&ep.request.params).collect();
        if !mappings.is_empty() {
            let payload = payload.ok_or_else(|| {
                self.inconsistency(
                    format!("{}.request", ep.name),
                    "request parameters are mapped but the endpoint has no payload",
                )
            })?;
            // mapped fields must be encodable in headers and parameters
            for m in mappings {
                let path = format!("{}.request.{}", ep.name, m.field());
                let field = self.field_of(payload, m.field(), &path)?;
                self.resolve(field, FieldContext::RequestParam, &path)?;
            }
        }

        let request_body = match payload {
            Some(payload) => self.request_body(ep, payload)?,
            None => None,
        };

        let responses = ep.responses();
        let mut response_descriptors = Vec::with_capacity(responses.len());
        for (i, resp) in responses.iter().enumerate() {
            let path = format!("{}.responses[{i}]", ep.name);
            let (body, result_init) = match result {
                Some(result) => {
                    let view = match &resp.view {
                        Some(view) => Some(result.view(view).ok_or_else(|| {
                            self.inconsistency(
                                format!("{path}.view"),
                                format!("view '{view}' is not declared on '{}'", result.name),
                            )
                        })?),
                        None => None,
                    };
                    let suffix = if responses.len() > 1 {
                        status_name(resp.status)
                    } else {
                        String::new()
                    };
                    self.result_mapping(ResultMapping {
                        ty: result,
                        headers: &resp.headers,
                        body: resp.body.as_ref(),
                        view,
                        body_name: format!("{}{suffix}ResponseBody", to_upper_camel_case(&ep.name)),
                        init_name: format!("new_{}_{}{}", ep.name, result.name, suffix),
                        owner: BodyOwner::Response,
                        label: format!("the \"{}\" response", resp.status),
                        path,
                    })?
                }
                None if resp.view.is_some() || resp.body.is_some() || !resp.headers.is_empty() => {
                    return Err(self.inconsistency(path, "response maps result fields but the endpoint has no result"));
                }
                None => (None, None),
            };
            response_descriptors.push(ResponseDescriptor {
                status: resp.status,
                body,
                result_init,
            });
        }

        let mut errors = Vec::with_capacity(ep.errors.len());
        for (i, err) in ep.errors.iter().enumerate() {
            let path = format!("{}.errors[{i}]", ep.name);
            let ty = self.lookup(&err.ty, &format!("{path}.type"))?;
            let error_name = to_upper_camel_case(&err.name);
            let (body, result_init) = self.result_mapping(ResultMapping {
                ty,
                headers: &err.headers,
                body: err.body.as_ref(),
                view: None,
                body_name: format!("{}{error_name}ResponseBody", to_upper_camel_case(&ep.name)),
                init_name: format!("new_{}_{}", ep.name, err.name),
                owner: BodyOwner::Error,
                label: format!("the \"{}\" error response", err.name),
                path,
            })?;
            errors.push(ErrorDescriptor {
                name: err.name.clone(),
                type_name: ty.name.clone(),
                status: err.status,
                body,
                result_init,
            });
        }

        Ok(EndpointDescriptor {
            name: ep.name.clone(),
            payload: PayloadDescriptor {
                type_name: payload.map(|p| p.name.clone()),
                request_body,
            },
            result: ResultDescriptor {
                type_name: result.map(|r| r.name.clone()),
                responses: response_descriptors,
            },
            errors,
        })
    }

    fn request_body(&mut self, ep: &'a EndpointDef, payload: &'a UserType) -> Result<Option<BodyId>> {
        let path = format!("{}.request.body", ep.name);
        let excluded: HashSet<&str> = ep
            .request
            .headers
            .iter()
            .chain(&ep.request.params)
            .map(Mapping::field)
            .collect();
        let binding = self.bind(payload, &excluded, ep.request.body.as_ref(), None, &path)?;
        let candidate = format!("{}RequestBody", to_upper_camel_case(&ep.name));
        let body_name = match &binding {
            Binding::Struct(_) | Binding::Wrapped(..) => self.types.unique(&candidate),
            Binding::Empty | Binding::Bare(_) => candidate,
        };
        let target = self.target;

        // arguments come from the payload, in declaration order
        let arg_defs: Vec<&'a FieldDef> = match &binding {
            Binding::Empty => return Ok(None),
            Binding::Struct(defs) => defs.clone(),
            Binding::Wrapped(field, _) | Binding::Bare(field) => vec![*field],
        };
        let mut args = Vec::with_capacity(arg_defs.len());
        for f in &arg_defs {
            let repr = self.resolve(f, FieldContext::Payload, &format!("{}.payload.{}", ep.name, f.name))?;
            args.push(ArgumentDescriptor {
                name: target.field_ident(&f.name),
                type_ref: target.type_ref(&f.ty, repr, Side::Service),
                representation: repr,
                field_name: None,
            });
        }

        let mut prelude = Vec::new();
        let (fields, declared, type_ref, code) = match &binding {
            Binding::Empty => return Ok(None),
            Binding::Struct(defs) => {
                let fields = self.fields(defs, FieldContext::Payload, Side::RequestBody, &path)?;
                let mut assignments = Vec::with_capacity(fields.len());
                for ((def, field), arg) in defs.iter().zip(&fields).zip(args.iter_mut()) {
                    arg.field_name = Some(field.ident.clone());
                    let expr = self.convert(Conversion {
                        source: Source::Owned(&arg.name),
                        ty: &def.ty,
                        from: Slot::new(arg.representation, Side::Service),
                        to: Slot::new(field.representation, Side::RequestBody),
                        default: def.default.as_ref(),
                    })?;
                    assignments.push((field.ident.clone(), expr));
                }
                let code = target.construct(&prelude, &body_name, &assignments, 4);
                (fields, true, body_name.clone(), code)
            }
            Binding::Wrapped(field, nested) => {
                let defs: Vec<&'a FieldDef> = nested.fields.iter().collect();
                let fields = self.fields(&defs, FieldContext::Payload, Side::RequestBody, &path)?;
                let unwrapped = self.convert(Conversion {
                    source: Source::Owned(&args[0].name),
                    ty: &field.ty,
                    from: Slot::new(args[0].representation, Side::Service),
                    to: Slot::new(Representation::Value, Side::Service),
                    default: None,
                })?;
                prelude.push(("v".to_string(), unwrapped));
                let mut assignments = Vec::with_capacity(fields.len());
                for (def, fd) in defs.iter().zip(&fields) {
                    let from = self.resolve(def, Side::Service.context(), &format!("{}.{}", nested.name, def.name))?;
                    let place = format!("v.{}", fd.ident);
                    let expr = self.convert(Conversion {
                        source: Source::Owned(&place),
                        ty: &def.ty,
                        from: Slot::new(from, Side::Service),
                        to: Slot::new(fd.representation, Side::RequestBody),
                        default: def.default.as_ref(),
                    })?;
                    assignments.push((fd.ident.clone(), expr));
                }
                let code = target.construct(&prelude, &body_name, &assignments, 4);
                (fields, true, body_name.clone(), code)
            }
            Binding::Bare(field) => {
                let mut fd = self.field(field, FieldContext::Payload, Side::RequestBody, &path)?;
                fd.ident = args[0].name.clone();
                let type_ref = fd.type_ref.clone();
                let expr = self.convert(Conversion {
                    source: Source::Owned(&args[0].name),
                    ty: &field.ty,
                    from: Slot::new(args[0].representation, Side::Service),
                    to: Slot::new(fd.representation, Side::RequestBody),
                    default: None,
                })?;
                let code = format!("    {expr}");
                (vec![fd], false, type_ref, code)
            }
        };

        let source = Shape {
            type_name: declared.then(|| payload.name.clone()),
            members: arg_defs
                .iter()
                .zip(&args)
                .map(|(def, arg)| (def.name.clone(), arg.type_ref.clone()))
                .collect(),
        };
        let shape = Shape {
            type_name: declared.then(|| body_name.clone()),
            members: fields
                .iter()
                .map(|f| (f.wire_name.clone(), f.type_ref.clone()))
                .collect(),
        };
        let init = if source != shape {
            let name = self.functions.unique(&target.function_name(&format!("new_{}_request_body", ep.name)));
            let id = InitId(self.out.inits.len());
            self.out.inits.push(InitDescriptor {
                description: format!(
                    "{name} builds the HTTP request body from the payload of the \"{}\" endpoint of the \"{}\" service.",
                    ep.name, self.service.name
                ),
                name,
                args,
                returns: ReturnInfo {
                    type_name: if declared { body_name.clone() } else { field_name(&binding) },
                    type_ref: type_ref.clone(),
                    is_struct: declared,
                    attribute: None,
                },
                code,
                view: None,
            });
            Some(id)
        } else {
            None
        };

        let validate = if declared {
            let defs = match &binding {
                Binding::Struct(defs) => defs.clone(),
                Binding::Wrapped(_, nested) => nested.fields.iter().collect(),
                _ => Vec::new(),
            };
            self.validation(&body_name, &fields, &defs, Side::RequestBody, "body")
        } else {
            None
        };

        let id = BodyId(self.out.bodies.len());
        self.out.bodies.push(BodyDescriptor {
            owner: BodyOwner::Request,
            description: format!(
                "{body_name} is the type of the \"{}\" service \"{}\" endpoint HTTP request body.",
                self.service.name, ep.name
            ),
            type_name: if declared { body_name } else { field_name(&binding) },
            type_ref,
            fields,
            declared,
            init,
            validate,
        });
        Ok(Some(id))
    }

    fn result_mapping(&mut self, m: ResultMapping<'a, '_>) -> Result<(Option<BodyId>, Option<InitId>)> {
        let target = self.target;
        if let Some(view) = m.view {
            for name in &view.fields {
                self.field_of(m.ty, name, &format!("{}.view.{name}", m.path))?;
            }
        }

        let mut headers = self.mapped_fields(m.ty, m.headers, &format!("{}.headers", m.path))?;
        // constructor arguments follow the declaration order of the type
        headers.sort_by_key(|h| m.ty.fields.iter().position(|f| f.name == h.name));
        let excluded: HashSet<&str> = headers.iter().map(|h| h.name.as_str()).collect();
        let binding = self.bind(m.ty, &excluded, m.body, m.view, &format!("{}.body", m.path))?;

        let body_defs: Vec<&'a FieldDef> = match &binding {
            Binding::Empty => Vec::new(),
            Binding::Struct(defs) => defs.clone(),
            Binding::Wrapped(_, nested) => nested.fields.iter().collect(),
            Binding::Bare(_) => Vec::new(),
        };
        let body = match &binding {
            Binding::Empty => None,
            Binding::Struct(_) | Binding::Wrapped(..) => {
                let body_name = self.types.unique(&m.body_name);
                let fields = self.fields(&body_defs, FieldContext::Body, Side::ResponseBody, &m.path)?;
                let validate = self.validation(&body_name, &fields, &body_defs, Side::ResponseBody, "body");
                Some(BodyDescriptor {
                    owner: m.owner,
                    type_name: body_name.clone(),
                    type_ref: body_name.clone(),
                    description: format!(
                        "{body_name} is the type of the \"{}\" service HTTP response body for {}.",
                        self.service.name, m.label
                    ),
                    fields,
                    declared: true,
                    init: None,
                    validate,
                })
            }
            Binding::Bare(field) => {
                for name in field.ty.named_types() {
                    self.attribute_type(name, Side::ResponseBody)?;
                }
                let type_ref = target.type_ref(&field.ty, Representation::Value, Side::ResponseBody);
                Some(BodyDescriptor {
                    owner: m.owner,
                    type_name: field.name.clone(),
                    type_ref: type_ref.clone(),
                    description: String::new(),
                    fields: vec![FieldDescriptor {
                        ident: target.field_ident(&field.name),
                        wire_name: field.wire_name().to_string(),
                        type_ref,
                        representation: Representation::Value,
                        description: field.description.clone(),
                    }],
                    declared: false,
                    init: None,
                    validate: None,
                })
            }
        };

        if body.is_none() && headers.is_empty() {
            return Ok((None, None));
        }

        let mut args = Vec::new();
        if let Some(body) = &body {
            args.push(ArgumentDescriptor {
                name: "body".to_string(),
                type_ref: target.borrowed(&body.type_ref),
                representation: Representation::Value,
                field_name: None,
            });
        }
        let mut header_reprs = HashMap::new();
        for h in &headers {
            let repr = self.resolve(h, FieldContext::ResponseHeader, &format!("{}.headers.{}", m.path, h.name))?;
            header_reprs.insert(h.name.as_str(), repr);
            args.push(ArgumentDescriptor {
                name: target.field_ident(&h.name),
                type_ref: target.type_ref(&h.ty, repr, Side::Service),
                representation: repr,
                field_name: Some(target.field_ident(&h.name)),
            });
        }

        let mut prelude = Vec::new();
        let mut attribute = None;
        let mut assignments = Vec::with_capacity(m.ty.fields.len());
        for rf in &m.ty.fields {
            let ident = target.field_ident(&rf.name);
            let res_repr = self.resolve(rf, FieldContext::Result, &format!("{}.{}", m.ty.name, rf.name))?;
            let to = Slot::new(res_repr, Side::Service);
            let expr = if let Some(repr) = header_reprs.get(rf.name.as_str()) {
                self.convert(Conversion {
                    source: Source::Owned(&ident),
                    ty: &rf.ty,
                    from: Slot::new(*repr, Side::Service),
                    to,
                    default: rf.default.as_ref(),
                })?
            } else {
                match &binding {
                    Binding::Struct(defs) if defs.iter().any(|d| d.name == rf.name) => {
                        let place = format!("body.{ident}");
                        let from = self.resolve(rf, FieldContext::Body, &format!("{}.{}", m.path, rf.name))?;
                        self.convert(Conversion {
                            source: Source::Borrowed(&place),
                            ty: &rf.ty,
                            from: Slot::new(from, Side::ResponseBody),
                            to,
                            default: rf.default.as_ref(),
                        })?
                    }
                    Binding::Wrapped(field, nested) if field.name == rf.name => {
                        let mut inner = Vec::with_capacity(nested.fields.len());
                        for nf in &nested.fields {
                            let nested_ident = target.field_ident(&nf.name);
                            let nested_repr =
                                self.resolve(nf, Side::Service.context(), &format!("{}.{}", nested.name, nf.name))?;
                            let body_repr =
                                self.resolve(nf, FieldContext::Body, &format!("{}.{}", m.path, nf.name))?;
                            let place = format!("body.{nested_ident}");
                            let expr = self.convert(Conversion {
                                source: Source::Borrowed(&place),
                                ty: &nf.ty,
                                from: Slot::new(body_repr, Side::ResponseBody),
                                to: Slot::new(nested_repr, Side::Service),
                                default: nf.default.as_ref(),
                            })?;
                            inner.push((nested_ident, expr));
                        }
                        let nested_ref = target.type_name(&nested.name, Side::Service);
                        let value = target.construct(&[], &nested_ref, &inner, 4);
                        prelude.push(("v".to_string(), value.trim_start().to_string()));
                        attribute = Some(ident.clone());
                        target.wrap("v", &rf.ty, res_repr)
                    }
                    Binding::Bare(field) if field.name == rf.name => {
                        attribute = Some(ident.clone());
                        self.convert(Conversion {
                            source: Source::Borrowed("body"),
                            ty: &rf.ty,
                            from: Slot::new(Representation::Value, Side::ResponseBody),
                            to,
                            default: None,
                        })?
                    }
                    _ => target.default_value(&rf.ty, res_repr, rf.default.as_ref()),
                }
            };
            assignments.push((ident, expr));
        }

        let result_ref = target.type_name(&m.ty.name, Side::Service);
        let name = self.functions.unique(&target.function_name(&m.init_name));
        let init_id = InitId(self.out.inits.len());
        self.out.inits.push(InitDescriptor {
            description: format!("{name} builds a \"{}\" service result from {}.", self.service.name, m.label),
            name,
            args,
            returns: ReturnInfo {
                type_name: m.ty.name.clone(),
                type_ref: result_ref.clone(),
                is_struct: true,
                attribute,
            },
            code: target.construct(&prelude, &result_ref, &assignments, 4),
            view: m.view.map(|v| ViewRef {
                type_name: m.ty.name.clone(),
                view: v.name.clone(),
            }),
        });

        let body_id = body.map(|b| {
            let id = BodyId(self.out.bodies.len());
            self.out.bodies.push(b);
            id
        });
        Ok((body_id, Some(init_id)))
    }

    fn expanded_type(&mut self, ty: &'a UserType) -> Result<ExpandedId> {
        if let Some(id) = self.expanded.get(&ty.name) {
            return Ok(*id);
        }
        let target = self.target;
        self.location = ty.name.clone();
        let type_name = format!("{}Expanded", to_upper_camel_case(&ty.name));
        let defs: Vec<&'a FieldDef> = ty.fields.iter().collect();
        let fields = self.fields(&defs, FieldContext::Body, Side::ResponseBody, &ty.name)?;
        let validate = self.validation(&type_name, &fields, &defs, Side::ResponseBody, "body");

        let mut views = Vec::with_capacity(ty.views.len());
        for (i, view) in ty.views.iter().enumerate() {
            let path = format!("{}.views[{i}]", ty.name);
            let result_name = view.result.as_deref().unwrap_or(&ty.name);
            let result = self.lookup(result_name, &format!("{path}.result"))?;
            for name in &view.fields {
                let base = self.field_of(ty, name, &format!("{path}.fields"))?;
                let projected = self.field_of(result, name, &format!("{path}.result"))?;
                if base.ty != projected.ty {
                    return Err(self.inconsistency(
                        format!("{path}.fields.{name}"),
                        format!("field type '{}' differs from '{}' on '{}'", base.ty, projected.ty, result.name),
                    ));
                }
            }

            let mut assignments = Vec::with_capacity(result.fields.len());
            for rf in &result.fields {
                let ident = target.field_ident(&rf.name);
                let repr = self.resolve(rf, FieldContext::Result, &format!("{}.{}", result.name, rf.name))?;
                let expr = if view.fields.contains(&rf.name) {
                    let base = self.field_of(ty, &rf.name, &path)?;
                    let from = self.resolve(base, FieldContext::Body, &format!("{}.{}", ty.name, base.name))?;
                    let place = format!("self.{ident}");
                    self.convert(Conversion {
                        source: Source::Borrowed(&place),
                        ty: &rf.ty,
                        from: Slot::new(from, Side::ResponseBody),
                        to: Slot::new(repr, Side::Service),
                        default: rf.default.as_ref(),
                    })?
                } else {
                    target.default_value(&rf.ty, repr, rf.default.as_ref())
                };
                assignments.push((ident, expr));
            }

            let function = target.function_name(&format!("as_{}_view", view.name));
            let target_ref = target.type_name(&result.name, Side::Service);
            views.push(ViewDescriptor {
                view: view.name.clone(),
                target: result.name.clone(),
                code: target.construct(&[], &target_ref, &assignments, 8),
                target_ref,
                function,
            });
        }

        let id = ExpandedId(self.out.expanded.len());
        self.out.expanded.push(ExpandedTypeDescriptor {
            base: ty.name.clone(),
            description: ty.description.clone().unwrap_or_else(|| {
                format!("{type_name} holds every field of {} and projects it through its views.", ty.name)
            }),
            type_name,
            fields,
            views,
            validate,
        });
        self.expanded.insert(ty.name.clone(), id);
        Ok(id)
    }
}

fn field_name(binding: &Binding<'_>) -> String {
    match binding {
        Binding::Wrapped(field, _) | Binding::Bare(field) => field.name.clone(),
        Binding::Struct(_) | Binding::Empty => String::new(),
    }
}

/// Inputs of a response or error mapping
struct ResultMapping<'a, 'm> {
    ty: &'a UserType,
    headers: &'m [Mapping],
    body: Option<&'m BodyDef>,
    view: Option<&'a ViewDef>,
    /// Preferred body type name; numbered when already taken
    body_name: String,
    init_name: String,
    owner: BodyOwner,
    /// Human readable origin used in descriptions
    label: String,
    path: String,
}

#[cfg(test)]
mod tests;
