//! Seam to the parser that extracts configuration blocks from documents.

use serde_json::{Map, Value};

use super::block::{BlockOrigin, ConfigurationBlock};
use super::guard::guard_from_fence_info;
use super::location::SourceLocation;
use super::path::KeyPath;
use super::ConfigError;

/// A block as a document parser hands it over, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub data: Value,
    /// Fenced-block info string, e.g. `yaml $(tag) == 'v1'`.
    pub info: Option<String>,
    /// Where the block starts.
    pub location: SourceLocation,
    /// Positions of nodes inside `data`.
    pub positions: Vec<(KeyPath, SourceLocation)>,
}

impl CodeBlock {
    pub fn new(data: Value, location: SourceLocation) -> Self {
        Self {
            data,
            info: None,
            location,
            positions: Vec::new(),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn with_position(mut self, path: KeyPath, location: SourceLocation) -> Self {
        self.positions.push((path, location));
        self
    }

    /// Validates the block. Data that is not a mapping is a syntax error.
    pub fn into_block(self) -> Result<ConfigurationBlock, ConfigError> {
        let mut block =
            ConfigurationBlock::from_value(self.data, BlockOrigin::Document(self.location))?
                .with_positions(self.positions);
        if let Some(guard) = self.info.as_deref().and_then(guard_from_fence_info) {
            block = block.with_guard(guard);
        }
        Ok(block)
    }
}

/// Parses a document into its configuration blocks, in document order.
pub trait BlockSource: Send + Sync + std::fmt::Debug {
    fn parse(&self, document_uri: &str, content: &str) -> Result<Vec<CodeBlock>, ConfigError>;
}

/// Inserts `value` at `path`, creating intermediate mappings and deep-merging
/// into existing ones.
pub fn insert_at_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Object(overlay) = value {
            for (key, item) in overlay {
                insert_at_path(map, &[key], item);
            }
        }
        return;
    };

    if rest.is_empty() {
        match (map.get_mut(first), value) {
            (Some(Value::Object(base)), Value::Object(overlay)) => {
                for (key, item) in overlay {
                    insert_at_path(base, &[key], item);
                }
            }
            (_, value) => {
                map.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(map.get(first), Some(Value::Object(_))) {
        map.insert(first.clone(), Value::Object(Map::new()));
    }

    if let Some(Value::Object(nested)) = map.get_mut(first) {
        insert_at_path(nested, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_block_takes_guard_from_info() {
        let block = CodeBlock::new(json!({"a": 1}), SourceLocation::new("doc", 4, 0))
            .with_info("yaml $(tag) == 'v1'")
            .into_block()
            .unwrap();
        assert_eq!(block.guard(), Some("$(tag) == 'v1'"));
        assert_eq!(
            block.origin(),
            &BlockOrigin::Document(SourceLocation::new("doc", 4, 0))
        );
    }

    #[test]
    fn test_into_block_rejects_scalars() {
        let err = CodeBlock::new(json!(42), SourceLocation::new("doc", 4, 0))
            .into_block()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn test_insert_at_path_creates_and_merges() {
        let mut map = Map::new();
        insert_at_path(&mut map, &["a".into(), "b".into()], json!(1));
        insert_at_path(&mut map, &["a".into()], json!({"c": 2}));
        insert_at_path(&mut map, &["x".into()], json!("y"));
        assert_eq!(Value::Object(map), json!({"a": {"b": 1, "c": 2}, "x": "y"}));
    }
}
