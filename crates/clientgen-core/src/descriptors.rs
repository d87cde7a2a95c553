//! Emission-ready descriptors.
//!
//! Descriptors are built once per service by the
//! [`BodyDescriptorBuilder`](crate::builders::BodyDescriptorBuilder) and are
//! read-only afterwards. They serialize to the tera context used to render
//! each section, so everything a template needs is carried here, including
//! the code fragments produced by the target language.

use serde::Serialize;

use crate::policy::Representation;

/// Index of a [`BodyDescriptor`] in [`ServiceDescriptors::bodies`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BodyId(pub usize);

/// Index of an [`InitDescriptor`] in [`ServiceDescriptors::inits`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InitId(pub usize);

/// Index of an [`ExpandedTypeDescriptor`] in [`ServiceDescriptors::expanded`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExpandedId(pub usize);

/// Index of a [`TransformHelperDescriptor`] in [`ServiceDescriptors::helpers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HelperId(pub usize);

/// Everything needed to emit the client types of one service
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceDescriptors {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub endpoints: Vec<EndpointDescriptor>,
    pub bodies: Vec<BodyDescriptor>,
    /// Shared body-attribute types, in first-reference order
    pub attribute_types: Vec<BodyId>,
    pub inits: Vec<InitDescriptor>,
    pub expanded: Vec<ExpandedTypeDescriptor>,
    pub helpers: Vec<TransformHelperDescriptor>,
}

impl ServiceDescriptors {
    pub fn body(&self, id: BodyId) -> &BodyDescriptor {
        &self.bodies[id.0]
    }

    pub fn init(&self, id: InitId) -> &InitDescriptor {
        &self.inits[id.0]
    }

    pub fn expanded_type(&self, id: ExpandedId) -> &ExpandedTypeDescriptor {
        &self.expanded[id.0]
    }

    pub fn helper(&self, id: HelperId) -> &TransformHelperDescriptor {
        &self.helpers[id.0]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub payload: PayloadDescriptor,
    pub result: ResultDescriptor,
    pub errors: Vec<ErrorDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PayloadDescriptor {
    pub type_name: Option<String>,
    pub request_body: Option<BodyId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultDescriptor {
    pub type_name: Option<String>,
    pub responses: Vec<ResponseDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub body: Option<BodyId>,
    pub result_init: Option<InitId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDescriptor {
    pub name: String,
    pub type_name: String,
    pub status: u16,
    pub body: Option<BodyId>,
    pub result_init: Option<InitId>,
}

/// What a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyOwner {
    Request,
    Response,
    Error,
    /// Type of a nested field shared by several bodies
    Attribute,
}

/// A field of a generated type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Identifier in generated code
    pub ident: String,
    /// Name on the wire
    pub wire_name: String,
    /// Rendered type, including the optional wrapper
    pub type_ref: String,
    pub representation: Representation,
    pub description: Option<String>,
}

/// A request, response, error or shared attribute body
#[derive(Debug, Clone, Serialize)]
pub struct BodyDescriptor {
    pub owner: BodyOwner,
    pub type_name: String,
    /// Rendered reference to the body type
    pub type_ref: String,
    pub description: String,
    pub fields: Vec<FieldDescriptor>,
    /// False for bare bodies (a single primitive or collection value), which
    /// have no type declaration of their own
    pub declared: bool,
    pub init: Option<InitId>,
    pub validate: Option<ValidateDescriptor>,
}

/// A constructor function
#[derive(Debug, Clone, Serialize)]
pub struct InitDescriptor {
    pub name: String,
    pub description: String,
    /// In schema declaration order
    pub args: Vec<ArgumentDescriptor>,
    pub returns: ReturnInfo,
    pub code: String,
    /// View of the result type the response is projected with
    pub view: Option<ViewRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDescriptor {
    pub name: String,
    pub type_ref: String,
    pub representation: Representation,
    /// Field of the constructed value the argument is bound to
    pub field_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnInfo {
    pub type_name: String,
    pub type_ref: String,
    pub is_struct: bool,
    /// Set when the constructed value wraps the argument in this field
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRef {
    pub type_name: String,
    pub view: String,
}

/// Validation code bound to one type
#[derive(Debug, Clone, Serialize)]
pub struct ValidateDescriptor {
    pub type_name: String,
    pub code: String,
}

/// A type decoded in full and projected into results through its views
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedTypeDescriptor {
    /// User type the expansion is built from
    pub base: String,
    pub type_name: String,
    pub description: String,
    pub fields: Vec<FieldDescriptor>,
    pub views: Vec<ViewDescriptor>,
    pub validate: Option<ValidateDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewDescriptor {
    pub view: String,
    /// Result type produced by the conversion
    pub target: String,
    pub target_ref: String,
    pub function: String,
    pub code: String,
}

/// A conversion routine shared by several constructors
#[derive(Debug, Clone, Serialize)]
pub struct TransformHelperDescriptor {
    /// Function name; identical names denote identical conversions
    pub name: String,
    pub description: String,
    pub source: String,
    pub target: String,
    pub code: String,
}
