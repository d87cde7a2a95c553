//! Value-vs-optional representation rules.
//!
//! Every field of every generated type is resolved exactly once into a
//! [`Representation`] and carried on its descriptor. The rules only apply to
//! primitives; aggregates (objects and collections) are always optional since
//! they are always referenced, never inlined.
//!
//! | context           | optional when                   |
//! |-------------------|---------------------------------|
//! | payload           | not required and no default     |
//! | body              | always                          |
//! | request parameter | not required                    |
//! | result            | not required or has a default   |
//! | response header   | not required and no default     |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{Primitive, TypeRef};

/// How a field holds its value in generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Value,
    Optional,
}

impl Representation {
    pub fn is_optional(self) -> bool {
        self == Self::Optional
    }
}

/// Shape class of a field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Primitive,
    /// Untyped value (`any`)
    Dynamic,
    Collection,
    Object,
}

impl FieldKind {
    pub fn of(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Primitive(Primitive::Any) => Self::Dynamic,
            TypeRef::Primitive(_) => Self::Primitive,
            TypeRef::Array(_) | TypeRef::Map(..) => Self::Collection,
            TypeRef::Named(_) => Self::Object,
        }
    }

    pub fn is_aggregate(self) -> bool {
        matches!(self, Self::Collection | Self::Object)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primitive => "primitive",
            Self::Dynamic => "dynamic",
            Self::Collection => "collection",
            Self::Object => "object",
        })
    }
}

/// Where a field appears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldContext {
    /// Field of the payload supplied by the caller
    Payload,
    /// Field of a decoded request or response body
    Body,
    /// Request header, path or query string parameter
    RequestParam,
    /// Field of the result returned to the caller
    Result,
    /// Response header
    ResponseHeader,
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Payload => "payload",
            Self::Body => "body",
            Self::RequestParam => "request parameter",
            Self::Result => "result",
            Self::ResponseHeader => "response header",
        })
    }
}

/// Field metadata relevant to representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    pub required: bool,
    pub has_default: bool,
    pub kind: FieldKind,
}

/// Resolve the representation of a field. `path` only qualifies errors.
pub fn resolve(shape: FieldShape, context: FieldContext, path: &str) -> Result<Representation> {
    use FieldContext::*;
    use Representation::{Optional, Value};

    let FieldShape {
        required,
        has_default,
        kind,
    } = shape;

    // headers and parameters carry scalars or lists of scalars only
    let encodable_on_wire = matches!(kind, FieldKind::Primitive | FieldKind::Collection);
    if matches!(context, RequestParam | ResponseHeader) && !encodable_on_wire {
        return Err(Error::UnsupportedFieldShape {
            path: path.to_string(),
            kind: kind.to_string(),
            context: context.to_string(),
        });
    }

    if kind.is_aggregate() {
        return Ok(Optional);
    }

    let optional = match context {
        Payload => !required && !has_default,
        Body => true,
        RequestParam => !required,
        Result => !required || has_default,
        ResponseHeader => !required && !has_default,
    };
    Ok(if optional { Optional } else { Value })
}
