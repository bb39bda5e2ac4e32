//! Source locations and the enhanced-position encoding carried in location names.
//!
//! A transformation step that generates a document can leave a pointer back to
//! the step before it by appending an encoded position to a location's `name`:
//!
//! ```text
//! original-name\n\n({"length":5,"path":["info","title"]})
//! ```
//!
//! [`SourceLocation::decoded`] unpacks that pointer exactly once.

use serde::{Deserialize, Serialize};

use super::path::KeyPath;
use super::ConfigError;

const ENCODING_OPEN: &str = "\n\n(";
const ENCODING_CLOSE: char = ')';

/// A position inside a source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub document: String,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Path of the node inside `document`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<KeyPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SourceLocation {
    pub fn new(document: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            document: document.into(),
            line,
            column,
            length: None,
            path: None,
            name: None,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_path(mut self, path: KeyPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Decodes an enhanced position carried in `name`, one hop only.
    ///
    /// Line and column are kept; length and path from the encoding take
    /// precedence. The returned location's name is stripped of the encoding.
    pub fn decoded(&self) -> Result<SourceLocation, ConfigError> {
        let Some(name) = self.name.as_deref() else {
            return Ok(self.clone());
        };
        let Some((plain, enhanced)) = decode_enhanced_position(name)? else {
            return Ok(self.clone());
        };

        let mut location = self.clone();
        location.name = (!plain.is_empty()).then(|| plain.to_string());
        if enhanced.length.is_some() {
            location.length = enhanced.length;
        }
        if enhanced.path.is_some() {
            location.path = enhanced.path;
        }
        Ok(location)
    }
}

/// Extra position data a transformation step can encode into a location name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<KeyPath>,
}

/// Appends an encoded [`EnhancedPosition`] to `name`.
pub fn encode_enhanced_position(name: &str, position: &EnhancedPosition) -> String {
    // serializing a struct of options and strings cannot fail
    let json = serde_json::to_string(position).unwrap_or_default();
    format!("{name}{ENCODING_OPEN}{json}{ENCODING_CLOSE}")
}

/// Splits `name` into its plain part and the encoded position, if there is one.
pub fn decode_enhanced_position(
    name: &str,
) -> Result<Option<(&str, EnhancedPosition)>, ConfigError> {
    let Some(start) = name.rfind(ENCODING_OPEN) else {
        return Ok(None);
    };
    let encoded = &name[start + ENCODING_OPEN.len()..];
    let json = encoded
        .strip_suffix(ENCODING_CLOSE)
        .ok_or_else(|| ConfigError::InvalidPosition(name.to_string()))?;
    let position = serde_json::from_str(json)
        .map_err(|_| ConfigError::InvalidPosition(name.to_string()))?;
    Ok(Some((&name[..start], position)))
}
