//! Root directory/file grants a client exposes to connected servers.

use serde::{Deserialize, Serialize};

/// A URI the client grants the server permission to operate within. Equality
/// is by `uri` alone, matching [`crate::protocol::types::Resource`]'s pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PartialEq for Root {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Root {}

impl std::hash::Hash for Root {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn with_name(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: Some(name.into()),
        }
    }

    /// Builds a `Root` from a loosely-typed map, the way the source language's
    /// duck-typed constructors did. `uri` is not validated present at
    /// construction time — accessing it on a map missing the key panics with
    /// a clear message only at first use, preserving the lazy-required-field
    /// behavior §9 calls out.
    pub fn from_map(map: std::collections::HashMap<String, serde_json::Value>) -> LazyRoot {
        LazyRoot { map }
    }
}

/// A root parsed from an untyped map whose required fields are validated
/// lazily, at first access, rather than at construction.
pub struct LazyRoot {
    map: std::collections::HashMap<String, serde_json::Value>,
}

impl LazyRoot {
    pub fn uri(&self) -> String {
        self.map
            .get("uri")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| panic!("Root is missing required field \"uri\""))
            .to_string()
    }

    pub fn name(&self) -> Option<String> {
        self.map.get("name").and_then(|v| v.as_str()).map(String::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
}
