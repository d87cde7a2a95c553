//! Template kinds.
//!
//! # Examples
//!
//! ```
//! use clientgen_core::templates::TemplateKind;
//! use std::str::FromStr;
//!
//! let kind = TemplateKind::from_str("custom").unwrap();
//! assert_eq!(kind, TemplateKind::Custom);
//! assert_eq!(kind.to_string(), "custom");
//!
//! // The default templates are the embedded Rust ones
//! assert_eq!(TemplateKind::default(), TemplateKind::Rust);
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Where section templates come from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Rust templates embedded in the binary
    #[default]
    Rust,
    /// Templates loaded from a directory
    Custom,
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rust" => Ok(TemplateKind::Rust),
            "custom" => Ok(TemplateKind::Custom),
            _ => Err(format!("Unknown template kind: {}", s)),
        }
    }
}

impl TemplateKind {
    /// Returns the template identifier as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Custom => "custom",
        }
    }

    /// Returns an iterator over all available template kinds
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::Rust, Self::Custom].iter().copied()
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_from_str() {
        assert_eq!(TemplateKind::from_str("rust").unwrap(), TemplateKind::Rust);
        assert_eq!(TemplateKind::from_str("RUST").unwrap(), TemplateKind::Rust);
        assert_eq!(TemplateKind::from_str("Custom").unwrap(), TemplateKind::Custom);
        assert!(TemplateKind::from_str("go").is_err());
    }

    #[test]
    fn test_all_kinds_roundtrip() {
        let kinds: HashSet<_> = TemplateKind::all().collect();
        assert_eq!(kinds.len(), 2);
        for kind in TemplateKind::all() {
            assert_eq!(TemplateKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }
}
