//! Identifier transformation utilities for code generation

use once_cell::sync::Lazy;
use regex::Regex;

/// Splits identifiers into words: "getHTTPResponse" -> get, HTTPResponse.
/// Leading acronyms are separated afterwards in [`words`].
static WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]*[a-z0-9]+|[A-Z]+").expect("word pattern is a valid regex"));

fn words(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    for m in WORDS.find_iter(s) {
        let word = m.as_str();
        // "HTTPResponse" -> HTTP, Response
        let upper_run = word.chars().take_while(char::is_ascii_uppercase).count();
        if upper_run > 1 && word[upper_run..].starts_with(|c: char| c.is_ascii_lowercase()) {
            out.push(word[..upper_run - 1].to_string());
            out.push(word[upper_run - 1..].to_string());
        } else {
            out.push(word.to_string());
        }
    }
    out
}

/// Convert a string to snake_case
pub fn to_snake_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert a string to UpperCamelCase (PascalCase)
pub fn to_upper_camel_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}

/// Directory-safe slug for a service name ("Pet Store" -> "pet_store").
pub fn service_slug(name: &str) -> String {
    to_snake_case(name)
}

/// Rust keywords that cannot be used as plain field or argument names.
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield",
];

/// snake_case identifier safe to use as a Rust field or binding name.
pub fn to_field_ident(s: &str) -> String {
    let ident = to_snake_case(s);
    if ident.is_empty() {
        return "field".to_string();
    }
    if matches!(ident.as_str(), "self" | "super" | "crate") {
        return format!("{ident}_");
    }
    if KEYWORDS.contains(&ident.as_str()) {
        return format!("r#{ident}");
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{ident}");
    }
    ident
}

/// UpperCamelCase name for an HTTP status, used to disambiguate response
/// bodies when an endpoint declares several responses.
pub fn status_name(status: u16) -> String {
    match status {
        200 => "Ok".to_string(),
        201 => "Created".to_string(),
        202 => "Accepted".to_string(),
        203 => "NonAuthoritativeInfo".to_string(),
        204 => "NoContent".to_string(),
        206 => "PartialContent".to_string(),
        301 => "MovedPermanently".to_string(),
        302 => "Found".to_string(),
        304 => "NotModified".to_string(),
        other => format!("Status{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("findPetsByStatus"), "find_pets_by_status");
        assert_eq!(to_snake_case("FindPetsByStatus"), "find_pets_by_status");
        assert_eq!(to_snake_case("find-pets-by-status"), "find_pets_by_status");
        assert_eq!(to_snake_case("pet store"), "pet_store");
        assert_eq!(to_snake_case("HTTPResponse"), "http_response");
        assert_eq!(to_snake_case("getHTTPResponse"), "get_http_response");
        assert_eq!(to_snake_case("ID"), "id");
    }

    #[test]
    fn test_to_upper_camel_case() {
        assert_eq!(to_upper_camel_case("find_pets_by_status"), "FindPetsByStatus");
        assert_eq!(to_upper_camel_case("show"), "Show");
        assert_eq!(to_upper_camel_case("not found"), "NotFound");
        assert_eq!(to_upper_camel_case("FIND_PETS"), "FindPets");
    }

    #[test]
    fn test_to_field_ident_escapes_keywords() {
        assert_eq!(to_field_ident("type"), "r#type");
        assert_eq!(to_field_ident("createdAt"), "created_at");
        assert_eq!(to_field_ident("2fa"), "_2fa");
    }

    #[test]
    fn test_status_name() {
        assert_eq!(status_name(200), "Ok");
        assert_eq!(status_name(418), "Status418");
    }
}
