//! Error handling for the clientgen code generation library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. The three generation failures
//! (`SchemaInconsistency`, `UnsupportedFieldShape` and `RenderFailure`) carry
//! enough context to locate the offending schema entry; the remaining variants
//! wrap ambient I/O and parsing failures.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::error::{Error, Result};
//!
//! fn lookup(found: bool) -> Result<()> {
//!     if !found {
//!         return Err(Error::inconsistency("pets", "show", "result", "type Pet is not declared"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(lookup(true).is_ok());
//! ```

use thiserror::Error;

/// Result type for clientgen generation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clientgen generation operations
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced type, field or view is absent from the schema model.
    #[error("schema inconsistency in service '{service}', endpoint '{endpoint}' at '{path}': {reason}")]
    SchemaInconsistency {
        service: String,
        endpoint: String,
        path: String,
        reason: String,
    },

    /// A field whose (kind, context) pair has no representation rule.
    #[error("unsupported field shape at '{path}': {kind} field in {context} context")]
    UnsupportedFieldShape {
        path: String,
        kind: String,
        context: String,
    },

    /// The templating primitive rejected a section.
    #[error("failed to render {section} section for '{descriptor}' in service '{service}': {message}")]
    RenderFailure {
        service: String,
        section: String,
        descriptor: String,
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Schema download error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Template loading error
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generation task panicked or was cancelled
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Create a new schema inconsistency error
    pub fn inconsistency(
        service: impl Into<String>,
        endpoint: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaInconsistency {
            service: service.into(),
            endpoint: endpoint.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new render failure
    pub fn render(
        service: impl Into<String>,
        section: impl Into<String>,
        descriptor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RenderFailure {
            service: service.into(),
            section: section.into(),
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new worker error
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Name of the failure kind, used when reporting per-service outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaInconsistency { .. } => "SchemaInconsistency",
            Self::UnsupportedFieldShape { .. } => "UnsupportedFieldShape",
            Self::RenderFailure { .. } => "RenderFailure",
            Self::Io(_) => "Io",
            Self::Yaml(_) => "Yaml",
            Self::Json(_) => "Json",
            Self::Toml(_) => "Toml",
            Self::Http(_) => "Http",
            Self::Template(_) => "Template",
            Self::Config(_) => "Config",
            Self::Worker(_) => "Worker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistency_message_locates_entry() {
        let err = Error::inconsistency("pet store", "show", "responses[0].view", "view 'huge' is not declared on Pet");
        let msg = err.to_string();
        assert!(msg.contains("pet store"));
        assert!(msg.contains("show"));
        assert!(msg.contains("responses[0].view"));
        assert_eq!(err.kind(), "SchemaInconsistency");
    }

    #[test]
    fn test_render_failure_message() {
        let err = Error::render("pets", "validator", "PetResponseBody", "unexpected end of template");
        assert_eq!(
            err.to_string(),
            "failed to render validator section for 'PetResponseBody' in service 'pets': unexpected end of template"
        );
    }
}
