//! Rust target for client type generation.

use std::fmt::Write as _;

use serde_json::Value as JsonValue;

use super::{Conversion, FieldCheck, HelperFn, Side, Source, TargetLanguage};
use crate::policy::Representation;
use crate::schema::{Primitive, TypeRef};
use crate::utils::{to_field_ident, to_snake_case, to_upper_camel_case};

/// Emits Rust. Service types are referenced through `service_module`,
/// validation errors through the `runtime` crate path.
#[derive(Debug, Clone)]
pub struct RustTarget {
    service_module: String,
    runtime: String,
}

impl RustTarget {
    pub fn new(service_module: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            service_module: service_module.into(),
            runtime: runtime.into(),
        }
    }

    fn base_type(&self, ty: &TypeRef, side: Side) -> String {
        match ty {
            TypeRef::Primitive(p) => map_primitive_to_rust_type(*p).to_string(),
            TypeRef::Array(elem) => format!("Vec<{}>", self.base_type(elem, side)),
            TypeRef::Map(key, elem) => format!(
                "std::collections::HashMap<{}, {}>",
                self.base_type(key, side),
                self.base_type(elem, side)
            ),
            TypeRef::Named(name) => self.type_name(name, side),
        }
    }

    /// Conversion of the value behind the reference `x`, or `None` when a
    /// clone is enough.
    fn inner(&self, x: &str, ty: &TypeRef, from: Side, to: Side, helper: &mut HelperFn<'_>) -> crate::Result<Option<String>> {
        Ok(match ty {
            TypeRef::Primitive(_) => None,
            TypeRef::Named(_) if from == to => None,
            TypeRef::Named(name) => Some(format!("{}({x})", helper(name.as_str(), from, to)?)),
            TypeRef::Array(elem) => self
                .inner("e", elem, from, to, helper)?
                .map(|c| format!("{x}.iter().map(|e| {c}).collect()")),
            TypeRef::Map(_, elem) => self
                .inner("e", elem, from, to, helper)?
                .map(|c| format!("{x}.iter().map(|(k, e)| (k.clone(), {c})).collect()")),
        })
    }

    /// Literal for a default value, when it can be written as one.
    fn literal(&self, ty: &TypeRef, value: &JsonValue) -> Option<String> {
        match (ty, value) {
            (TypeRef::Primitive(Primitive::String), JsonValue::String(s)) => Some(format!("{s:?}.to_string()")),
            (TypeRef::Primitive(Primitive::Boolean), JsonValue::Bool(b)) => Some(b.to_string()),
            (TypeRef::Primitive(Primitive::Float32 | Primitive::Float64), JsonValue::Number(n)) => {
                n.as_f64().map(float_literal)
            }
            (TypeRef::Primitive(p), JsonValue::Number(n)) if p.is_numeric() => Some(n.to_string()),
            (TypeRef::Primitive(Primitive::Any), v) => Some(format!("serde_json::json!({v})")),
            (TypeRef::Array(elem), JsonValue::Array(items)) => {
                let items = items
                    .iter()
                    .map(|item| self.literal(elem, item))
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("vec![{}]", items.join(", ")))
            }
            _ => None,
        }
    }

    /// Checks run against the value bound to `v`.
    fn value_checks(&self, check: &FieldCheck<'_>, path: &str, pad: &str) -> Vec<String> {
        let rt = &self.runtime;
        let constraints = &check.def.constraints;
        let mut lines = Vec::new();
        let fail = |cond: String, err: String| {
            format!("{pad}if {cond} {{\n{pad}    return Err({rt}::{err});\n{pad}}}")
        };

        match &check.def.ty {
            TypeRef::Primitive(Primitive::String) => {
                if !constraints.enum_values.is_empty() {
                    let values = enum_literals(&constraints.enum_values);
                    lines.push(fail(
                        format!("![{values}].contains(&v.as_str())"),
                        format!("invalid_enum_value_error({path:?}, v, &[{values}])"),
                    ));
                }
                if let Some(format) = &constraints.format {
                    lines.push(format!(
                        "{pad}{rt}::validate_format({path:?}, v, {rt}::Format::{})?;",
                        to_upper_camel_case(format)
                    ));
                }
                if let Some(pattern) = &constraints.pattern {
                    lines.push(format!("{pad}{rt}::validate_pattern({path:?}, v, {pattern:?})?;"));
                }
                lines.extend(self.length_checks(check, "v.chars().count()", path, pad));
            }
            TypeRef::Primitive(p) if p.is_numeric() => {
                let float = matches!(p, Primitive::Float32 | Primitive::Float64);
                let bound = |n: f64| if float { float_literal(n) } else { format!("{}", n as i64) };
                if !constraints.enum_values.is_empty() {
                    let values = enum_literals(&constraints.enum_values);
                    lines.push(fail(
                        format!("![{values}].contains(v)"),
                        format!("invalid_enum_value_error({path:?}, v, &[{values}])"),
                    ));
                }
                if let Some(min) = constraints.minimum {
                    let min = bound(min);
                    lines.push(fail(format!("*v < {min}"), format!("invalid_range_error({path:?}, *v, {min}, true)")));
                }
                if let Some(max) = constraints.maximum {
                    let max = bound(max);
                    lines.push(fail(format!("*v > {max}"), format!("invalid_range_error({path:?}, *v, {max}, false)")));
                }
            }
            TypeRef::Primitive(Primitive::Bytes) | TypeRef::Array(_) | TypeRef::Map(..) => {
                lines.extend(self.length_checks(check, "v.len()", path, pad));
            }
            _ => {}
        }

        if check.nested_validated {
            match &check.def.ty {
                TypeRef::Named(_) => lines.push(format!("{pad}v.validate()?;")),
                TypeRef::Array(_) => lines.push(format!("{pad}for e in v.iter() {{\n{pad}    e.validate()?;\n{pad}}}")),
                TypeRef::Map(..) => lines.push(format!("{pad}for e in v.values() {{\n{pad}    e.validate()?;\n{pad}}}")),
                TypeRef::Primitive(_) => {}
            }
        }
        lines
    }

    fn length_checks(&self, check: &FieldCheck<'_>, len: &str, path: &str, pad: &str) -> Vec<String> {
        let rt = &self.runtime;
        let constraints = &check.def.constraints;
        let mut lines = Vec::new();
        if let Some(min) = constraints.min_length {
            lines.push(format!(
                "{pad}if {len} < {min} {{\n{pad}    return Err({rt}::invalid_length_error({path:?}, v, {min}, true));\n{pad}}}"
            ));
        }
        if let Some(max) = constraints.max_length {
            lines.push(format!(
                "{pad}if {len} > {max} {{\n{pad}    return Err({rt}::invalid_length_error({path:?}, v, {max}, false));\n{pad}}}"
            ));
        }
        lines
    }
}

impl TargetLanguage for RustTarget {
    fn type_name(&self, name: &str, side: Side) -> String {
        let name = to_upper_camel_case(name);
        match side {
            Side::Service => format!("{}::{name}", self.service_module),
            Side::RequestBody => format!("{name}RequestBody"),
            Side::ResponseBody => format!("{name}ResponseBody"),
        }
    }

    fn type_ref(&self, ty: &TypeRef, repr: Representation, side: Side) -> String {
        let base = self.base_type(ty, side);
        match (repr, ty) {
            (Representation::Value, _) => base,
            (Representation::Optional, TypeRef::Named(_)) => format!("Option<Box<{base}>>"),
            (Representation::Optional, _) => format!("Option<{base}>"),
        }
    }

    fn borrowed(&self, type_ref: &str) -> String {
        format!("&{type_ref}")
    }

    fn field_ident(&self, name: &str) -> String {
        to_field_ident(name)
    }

    fn function_name(&self, name: &str) -> String {
        to_snake_case(name)
    }

    fn convert(&self, conv: Conversion<'_>, helper: &mut HelperFn<'_>) -> crate::Result<String> {
        use Representation::{Optional, Value};

        let Conversion {
            source,
            ty,
            from,
            to,
            default,
        } = conv;
        let boxed = matches!(ty, TypeRef::Named(_));
        let (place, owned) = match source {
            Source::Owned(place) => (place, true),
            Source::Borrowed(place) => (place, false),
        };
        let copy = |place: &str| if owned { place.to_string() } else { format!("{place}.clone()") };

        Ok(match (from.repr, to.repr) {
            (Optional, Optional) => match self.inner("v", ty, from.side, to.side, helper)? {
                None => copy(place),
                Some(c) if boxed => format!("{place}.as_ref().map(|v| Box::new({c}))"),
                Some(c) => format!("{place}.as_ref().map(|v| {c})"),
            },
            (Optional, Value) => {
                let fallback = match default.and_then(|d| self.literal(ty, d)) {
                    Some(lit) => format!("unwrap_or_else(|| {lit})"),
                    None => "unwrap_or_default()".to_string(),
                };
                match self.inner("v", ty, from.side, to.side, helper)? {
                    None if boxed => format!("{place}.as_deref().cloned().{fallback}"),
                    None => format!("{}.{fallback}", copy(place)),
                    Some(c) => format!("{place}.as_ref().map(|v| {c}).{fallback}"),
                }
            }
            (Value, repr) => {
                let value = match self.inner(&format!("(&{place})"), ty, from.side, to.side, helper)? {
                    None => copy(place),
                    Some(c) => c,
                };
                self.wrap(&value, ty, repr)
            }
        })
    }

    fn default_value(&self, ty: &TypeRef, repr: Representation, default: Option<&JsonValue>) -> String {
        match default.and_then(|d| self.literal(ty, d)) {
            Some(lit) => self.wrap(&lit, ty, repr),
            None => "Default::default()".to_string(),
        }
    }

    fn wrap(&self, expr: &str, ty: &TypeRef, repr: Representation) -> String {
        match (repr, ty) {
            (Representation::Value, _) => expr.to_string(),
            (Representation::Optional, TypeRef::Named(_)) => format!("Some(Box::new({expr}))"),
            (Representation::Optional, _) => format!("Some({expr})"),
        }
    }

    fn construct(&self, prelude: &[(String, String)], type_ref: &str, fields: &[(String, String)], indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = String::new();
        for (name, expr) in prelude {
            let _ = writeln!(out, "{pad}let {name} = {expr};");
        }
        let _ = writeln!(out, "{pad}{type_ref} {{");
        for (field, expr) in fields {
            if field == expr {
                let _ = writeln!(out, "{pad}    {field},");
            } else {
                let _ = writeln!(out, "{pad}    {field}: {expr},");
            }
        }
        let _ = write!(out, "{pad}}}");
        out
    }

    fn validation(&self, checks: &[FieldCheck<'_>], context: &str, indent: usize) -> String {
        let rt = &self.runtime;
        let pad = " ".repeat(indent);
        let inner_pad = " ".repeat(indent + 4);
        let mut blocks = Vec::with_capacity(checks.len());

        for check in checks {
            let ident = &check.field.ident;
            let wire = &check.field.wire_name;
            let optional = check.field.representation.is_optional();
            let mut block = String::new();

            if check.def.required && optional {
                let _ = write!(
                    block,
                    "{pad}if self.{ident}.is_none() {{\n{pad}    return Err({rt}::missing_field_error({wire:?}, {context:?}));\n{pad}}}"
                );
            }

            let path = format!("{context}.{wire}");
            let lines = self.value_checks(check, &path, &inner_pad);
            if !lines.is_empty() {
                if !block.is_empty() {
                    block.push('\n');
                }
                if optional {
                    let _ = write!(block, "{pad}if let Some(v) = &self.{ident} {{\n{}\n{pad}}}", lines.join("\n"));
                } else {
                    let _ = write!(block, "{pad}{{\n{inner_pad}let v = &self.{ident};\n{}\n{pad}}}", lines.join("\n"));
                }
            }
            if !block.is_empty() {
                blocks.push(block);
            }
        }
        blocks.join("\n")
    }
}

// Helper to map schema primitives to Rust types
fn map_primitive_to_rust_type(p: Primitive) -> &'static str {
    match p {
        Primitive::String => "String",
        Primitive::Int | Primitive::Int64 => "i64",
        Primitive::Int32 => "i32",
        Primitive::UInt | Primitive::UInt64 => "u64",
        Primitive::UInt32 => "u32",
        Primitive::Float32 => "f32",
        Primitive::Float64 => "f64",
        Primitive::Boolean => "bool",
        Primitive::Bytes => "Vec<u8>",
        Primitive::Any => "serde_json::Value",
    }
}

fn float_literal(n: f64) -> String {
    format!("{n:?}")
}

fn enum_literals(values: &[JsonValue]) -> String {
    values
        .iter()
        .map(|v| match v {
            JsonValue::String(s) => format!("{s:?}"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
