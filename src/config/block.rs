//! Configuration blocks: one layer of configuration before merging.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::guard::guard_from_fence_info;
use super::location::SourceLocation;
use super::path::{KeyPath, PathSegment};
use super::ConfigError;

/// Reserved key carrying a block's guard expression inside its data.
pub const GUARD_KEY: &str = "__info";

/// Where a block came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOrigin {
    /// A block embedded in a document, located at its opening position.
    Document(SourceLocation),
    /// A block with no backing document (defaults, command-line overrides).
    Synthetic(String),
}

/// A nested key/value tree with an optional guard and per-leaf source positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationBlock {
    data: Map<String, Value>,
    guard: Option<String>,
    origin: BlockOrigin,
    positions: BTreeMap<KeyPath, SourceLocation>,
}

impl ConfigurationBlock {
    /// Creates a block from a mapping value.
    ///
    /// A string under [`GUARD_KEY`] is read as fenced-block info (language
    /// token, then guard), becomes the block's guard and is removed from the data. Anything other than a mapping is a syntax error.
    pub fn from_value(value: Value, origin: BlockOrigin) -> Result<Self, ConfigError> {
        let Value::Object(mut data) = value else {
            return Err(ConfigError::Syntax {
                document: origin.document_label().to_string(),
                message: "Invalid YAML object.".to_string(),
            });
        };
        let guard = match data.shift_remove(GUARD_KEY) {
            Some(Value::String(info)) => guard_from_fence_info(&info),
            _ => None,
        };
        Ok(Self {
            data,
            guard,
            origin,
            positions: BTreeMap::new(),
        })
    }

    /// Creates a block with no backing document.
    pub fn synthetic(label: impl Into<String>, value: Value) -> Result<Self, ConfigError> {
        Self::from_value(value, BlockOrigin::Synthetic(label.into()))
    }

    /// An empty synthetic block.
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            data: Map::new(),
            guard: None,
            origin: BlockOrigin::Synthetic(label.into()),
            positions: BTreeMap::new(),
        }
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Records the source position of the node at `path`.
    pub fn with_position(mut self, path: KeyPath, location: SourceLocation) -> Self {
        self.positions.insert(path, location);
        self
    }

    pub fn with_positions(
        mut self,
        positions: impl IntoIterator<Item = (KeyPath, SourceLocation)>,
    ) -> Self {
        self.positions.extend(positions);
        self
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn guard(&self) -> Option<&str> {
        self.guard.as_deref()
    }

    pub fn origin(&self) -> &BlockOrigin {
        &self.origin
    }

    pub fn positions(&self) -> &BTreeMap<KeyPath, SourceLocation> {
        &self.positions
    }

    /// Best known position for the node at `path`: its own, else its nearest
    /// recorded ancestor's, else `None`.
    pub fn position_of(&self, path: &[PathSegment]) -> Option<&SourceLocation> {
        (0..=path.len())
            .rev()
            .find_map(|len| self.positions.get(&path[..len]))
    }
}

impl BlockOrigin {
    /// Document id for documents, the label for synthetic blocks.
    pub fn document_label(&self) -> &str {
        match self {
            Self::Document(location) => &location.document,
            Self::Synthetic(label) => label,
        }
    }
}
