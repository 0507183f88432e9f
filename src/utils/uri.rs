//! URI helpers for the resource subsystem: validation and the RFC6570-ish
//! single-level template matching resource templates use (`{name}` segments
//! match one non-slash path segment; this crate does not implement the full
//! RFC6570 operator grammar, only what MCP resource templates need).

use crate::core::error::{McpError, McpResult};
use url::Url;

/// Validates a resource URI is at least structurally sound: non-empty, and
/// if it declares a scheme, parseable by the `url` crate.
pub fn validate_uri(uri: &str) -> McpResult<()> {
    if uri.is_empty() {
        return Err(McpError::Url("URI cannot be empty".to_string()));
    }
    if uri.contains("://") {
        Url::parse(uri).map_err(|e| McpError::Url(format!("invalid URI '{uri}': {e}")))?;
    } else if uri.contains('\0') || uri.contains('\n') {
        return Err(McpError::Url(format!("URI '{uri}' contains control characters")));
    }
    Ok(())
}

/// Whether `uri` matches `uri_template`, where `{name}` in the template
/// matches exactly one non-empty, slash-free segment of `uri`. Literal
/// segments must match exactly.
pub fn matches_template(uri_template: &str, uri: &str) -> bool {
    let template_parts: Vec<&str> = uri_template.split('/').collect();
    let uri_parts: Vec<&str> = uri.split('/').collect();
    if template_parts.len() != uri_parts.len() {
        return false;
    }
    template_parts.iter().zip(uri_parts.iter()).all(|(t, u)| {
        if t.starts_with('{') && t.ends_with('}') {
            !u.is_empty()
        } else {
            t == u
        }
    })
}

/// Extracts the `{name}` → value bindings a matching template produced.
/// Returns `None` if the template does not match.
pub fn extract_template_vars(uri_template: &str, uri: &str) -> Option<Vec<(String, String)>> {
    if !matches_template(uri_template, uri) {
        return None;
    }
    let template_parts: Vec<&str> = uri_template.split('/').collect();
    let uri_parts: Vec<&str> = uri.split('/').collect();
    Some(
        template_parts
            .into_iter()
            .zip(uri_parts)
            .filter_map(|(t, u)| {
                t.strip_prefix('{')
                    .and_then(|t| t.strip_suffix('}'))
                    .map(|name| (name.to_string(), u.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_uri_rejects_empty() {
        assert!(validate_uri("").is_err());
    }

    #[test]
    fn validate_uri_accepts_scheme_and_plain_identifiers() {
        assert!(validate_uri("file:///tmp/x").is_ok());
        assert!(validate_uri("some-id").is_ok());
    }

    #[test]
    fn template_matches_single_segment() {
        assert!(matches_template("foo://{id}", "foo://42"));
        assert!(!matches_template("foo://{id}", "foo://42/extra"));
    }

    #[test]
    fn template_rejects_mismatched_literal_segments() {
        assert!(!matches_template("foo://bar/{id}", "foo://baz/42"));
    }

    #[test]
    fn extract_template_vars_returns_bindings() {
        let vars = extract_template_vars("foo://{kind}/{id}", "foo://widget/42").unwrap();
        assert_eq!(
            vars,
            vec![("kind".to_string(), "widget".to_string()), ("id".to_string(), "42".to_string())]
        );
    }
}
