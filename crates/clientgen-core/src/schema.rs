//! Service schema model and loading.
//!
//! The schema is the immutable input of a generation run: named user types
//! (with optional views) and services made of endpoints. It is deserialized
//! from YAML or JSON, either from a local file or from an http(s) URL.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::schema::SchemaModel;
//!
//! let schema = SchemaModel::parse_content(r#"
//! types:
//!   - name: ShowPayload
//!     fields:
//!       - { name: id, type: string, required: true }
//! services:
//!   - name: pets
//!     endpoints:
//!       - { name: show, payload: ShowPayload }
//! "#).unwrap();
//! assert_eq!(schema.services[0].endpoints[0].name, "show");
//! assert!(schema.user_type("ShowPayload").is_some());
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::path::Path;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;

/// Root of a service schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Named user types referenced by payloads, results, errors and fields
    #[serde(default)]
    pub types: Vec<UserType>,

    /// Services, in declaration order
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl SchemaModel {
    /// Load a schema from a file or URL (supports both YAML and JSON)
    pub async fn from_file_or_url<P: AsRef<str>>(location: P) -> crate::Result<Self> {
        let location = location.as_ref();
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::from_url(location).await;
        }
        Self::from_file(location).await
    }

    /// Load a schema from a file (supports both YAML and JSON)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        log::debug!("Loaded schema from {}", path.display());
        Self::parse_content(&content)
    }

    /// Load a schema from a URL (supports both YAML and JSON)
    pub async fn from_url(location: &str) -> crate::Result<Self> {
        let url = url::Url::parse(location)
            .map_err(|e| crate::Error::config(format!("Invalid schema URL {location}: {e}")))?;
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(crate::Error::config(format!(
                "Failed to fetch schema from {}: HTTP {}",
                location,
                response.status()
            )));
        }
        let content = response.text().await?;
        log::debug!("Fetched schema from {location}");
        Self::parse_content(&content)
    }

    /// Parse content as either JSON or YAML
    pub fn parse_content(content: &str) -> crate::Result<Self> {
        if let Ok(model) = serde_json::from_str(content) {
            return Ok(model);
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Look up a user type by name
    pub fn user_type(&self, name: &str) -> Option<&UserType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// A named object type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Named projections of the type; a type with views is expanded on the client
    #[serde(default)]
    pub views: Vec<ViewDef>,
}

impl UserType {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn view(&self, name: &str) -> Option<&ViewDef> {
        self.views.iter().find(|v| v.name == name)
    }
}

/// A named projection of a user type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    /// Result type produced by the view; defaults to the viewed type
    #[serde(default)]
    pub result: Option<String>,
    /// Fields included in the projection
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Field-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<JsonValue>,
    /// Name of the field on the wire when it differs from `name`
    #[serde(default)]
    pub wire_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
}

impl FieldDef {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn wire_name(&self) -> &str {
        self.wire_name.as_deref().unwrap_or(&self.name)
    }
}

/// Validation constraints attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default, rename = "enum")]
    pub enum_values: Vec<JsonValue>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.format.is_none()
            && self.pattern.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.enum_values.is_empty()
    }
}

/// Scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    String,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Bytes,
    Any,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt => "uint",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Boolean => "boolean",
            Self::Bytes => "bytes",
            Self::Any => "any",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => Self::String,
            "int" => Self::Int,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::UInt,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "boolean" | "bool" => Self::Boolean,
            "bytes" => Self::Bytes,
            "any" => Self::Any,
            _ => return None,
        })
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::String | Self::Boolean | Self::Bytes | Self::Any)
    }
}

/// Reference to the type of a field: `string`, `[]Pet`, `map[string]int`, `Pet`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Primitive(Primitive),
    Array(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    Named(String),
}

impl TypeRef {
    /// Name of the user type at the top of this reference, if any
    pub fn named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Names of every user type reachable through this reference
    pub fn named_types(&self) -> Vec<&str> {
        match self {
            Self::Primitive(_) => Vec::new(),
            Self::Array(elem) => elem.named_types(),
            Self::Map(key, elem) => {
                let mut names = key.named_types();
                names.extend(elem.named_types());
                names
            }
            Self::Named(name) => vec![name.as_str()],
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TypeRef> for String {
    fn from(t: TypeRef) -> Self {
        t.to_string()
    }
}

impl std::str::FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(elem) = s.strip_prefix("[]") {
            return Ok(Self::Array(Box::new(elem.parse()?)));
        }
        if let Some(rest) = s.strip_prefix("map[") {
            // find the bracket closing the key, allowing nested key types
            let mut depth = 1usize;
            for (i, c) in rest.char_indices() {
                match c {
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            let key = rest[..i].parse()?;
                            let elem = rest[i + 1..].parse()?;
                            return Ok(Self::Map(Box::new(key), Box::new(elem)));
                        }
                    }
                    _ => {}
                }
            }
            return Err(format!("unterminated map key in type '{s}'"));
        }
        if let Some(primitive) = Primitive::parse(s) {
            return Ok(Self::Primitive(primitive));
        }
        let valid = s.starts_with(|c: char| c.is_ascii_alphabetic())
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Self::Named(s.to_string()))
        } else {
            Err(format!("invalid type reference '{s}'"))
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.as_str()),
            Self::Array(elem) => write!(f, "[]{elem}"),
            Self::Map(key, elem) => write!(f, "map[{key}]{elem}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// A service: a named group of endpoints producing one artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
}

/// A single endpoint of a service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Name of the payload user type
    #[serde(default)]
    pub payload: Option<String>,
    /// Name of the result user type
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub request: RequestDef,
    /// Declared responses; an endpoint with a result and no responses gets a
    /// single 200 response carrying the whole result in its body
    #[serde(default)]
    pub responses: Vec<ResponseDef>,
    #[serde(default)]
    pub errors: Vec<ErrorDef>,
}

impl EndpointDef {
    pub fn responses(&self) -> Vec<ResponseDef> {
        if self.responses.is_empty() && self.result.is_some() {
            vec![ResponseDef::default()]
        } else {
            self.responses.clone()
        }
    }
}

/// HTTP mapping of the payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestDef {
    #[serde(default)]
    pub headers: Vec<Mapping>,
    /// Path and query string parameters
    #[serde(default)]
    pub params: Vec<Mapping>,
    #[serde(default)]
    pub body: Option<BodyDef>,
}

/// HTTP mapping of a successful result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDef {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<Mapping>,
    #[serde(default)]
    pub body: Option<BodyDef>,
    /// View of the result type used to project the body
    #[serde(default)]
    pub view: Option<String>,
}

impl Default for ResponseDef {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: Vec::new(),
            body: None,
            view: None,
        }
    }
}

fn default_status() -> u16 {
    200
}

/// HTTP mapping of an error result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    /// Name of the error user type
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default = "default_error_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<Mapping>,
    #[serde(default)]
    pub body: Option<BodyDef>,
}

fn default_error_status() -> u16 {
    400
}

/// Maps a field to a header or parameter, optionally renaming it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mapping {
    Field(String),
    Named {
        field: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl Mapping {
    pub fn field(&self) -> &str {
        match self {
            Self::Field(field) | Self::Named { field, .. } => field,
        }
    }

    /// Header or parameter name on the wire
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Named { name: Some(name), .. } => name,
            _ => self.field(),
        }
    }
}

/// Which fields travel in the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyDef {
    /// The listed fields, in the declaration order of the type
    Fields(Vec<String>),
    /// The body is the value of a single field
    Attribute(String),
}
