//! Key paths into configuration trees.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ConfigError;

/// One step of a [`KeyPath`]: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Index this segment addresses in a sequence, if any.
    ///
    /// Keys parsed from dotted strings are all [`PathSegment::Key`], so numeric keys
    /// double as indices when the node they are applied to is a sequence.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(k) => k.parse().ok(),
        }
    }

    pub fn as_key(&self) -> String {
        match self {
            Self::Index(i) => i.to_string(),
            Self::Key(k) => k.clone(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Path from the root of a configuration tree to one of its nodes.
pub type KeyPath = Vec<PathSegment>;

/// Parses a dotted key such as `"a.b.c"` into a [`KeyPath`].
///
/// The empty string is the root path. Empty segments (`"a..b"`) are rejected.
pub fn parse_dotted(key: &str) -> Result<KeyPath, ConfigError> {
    if key.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::InvalidReferencePath(key.to_string()));
    }
    Ok(parts.into_iter().map(PathSegment::from).collect())
}

/// Renders a path in dotted form.
pub fn to_dotted(path: &[PathSegment]) -> String {
    path.iter()
        .map(PathSegment::as_key)
        .collect::<Vec<_>>()
        .join(".")
}

/// Walks `path` down from `root`.
pub fn lookup<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(&segment.as_key())?,
            Value::Array(items) => items.get(segment.as_index()?)?,
            _ => return None,
        };
    }
    Some(current)
}
