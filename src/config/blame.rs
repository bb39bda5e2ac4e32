//! Lineage of merged values back to the blocks, documents and positions they
//! came from.
//!
//! A [`BlameTree`] has the same shape as the merged value it describes. Each
//! node lists the fragments that produced it; sequences keep one child per
//! element, so concatenated arrays remember where every element came from.

use std::collections::BTreeMap;

use serde_json::Value;

use super::block::{BlockOrigin, ConfigurationBlock};
use super::location::SourceLocation;
use super::path::{KeyPath, PathSegment};
use super::ConfigError;

/// One contribution to a merged node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    Source(SourceLocation),
    /// Came from a block with no backing document; carries the block label.
    Synthetic(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum Children {
    #[default]
    Leaf,
    Map(BTreeMap<String, BlameTree>),
    Seq(Vec<BlameTree>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlameTree {
    pub(crate) fragments: Vec<Fragment>,
    pub(crate) children: Children,
}

impl BlameTree {
    /// Builds the lineage of a single block's data.
    pub fn from_block(block: &ConfigurationBlock) -> Self {
        let mut path = Vec::new();
        let mut root = Self::build(block, &Value::Object(block.data().clone()), &mut path);
        root.fragments = vec![fragment_for(block, &[])];
        root
    }

    /// Lineage where every node is attributed to one synthetic label.
    pub fn synthetic(value: &Value, label: &str) -> Self {
        let fragments = vec![Fragment::Synthetic(label.to_string())];
        let children = match value {
            Value::Object(map) => Children::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::synthetic(v, label)))
                    .collect(),
            ),
            Value::Array(items) => {
                Children::Seq(items.iter().map(|v| Self::synthetic(v, label)).collect())
            }
            _ => Children::Leaf,
        };
        Self {
            fragments,
            children,
        }
    }

    fn build(block: &ConfigurationBlock, value: &Value, path: &mut KeyPath) -> Self {
        let children = match value {
            Value::Object(map) => Children::Map(
                map.iter()
                    .map(|(key, item)| {
                        path.push(PathSegment::Key(key.clone()));
                        let child = Self::build(block, item, path);
                        path.pop();
                        (key.clone(), child)
                    })
                    .collect(),
            ),
            Value::Array(items) => Children::Seq(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        path.push(PathSegment::Index(index));
                        let child = Self::build(block, item, path);
                        path.pop();
                        child
                    })
                    .collect(),
            ),
            _ => Children::Leaf,
        };
        Self {
            fragments: vec![fragment_for(block, path)],
            children,
        }
    }

    /// The node at `path`, if the merged shape has one.
    pub fn node(&self, path: &[PathSegment]) -> Option<&BlameTree> {
        let mut current = self;
        for segment in path {
            current = match &current.children {
                Children::Map(map) => map.get(&segment.as_key())?,
                Children::Seq(items) => items.get(segment.as_index()?)?,
                Children::Leaf => return None,
            };
        }
        Some(current)
    }

    /// Fragments of every leaf under this node, in tree order: mapping
    /// children sorted by key, sequence children by index.
    pub fn leaf_fragments(&self) -> Vec<&Fragment> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Fragment>) {
        let children: Vec<&BlameTree> = match &self.children {
            Children::Leaf => Vec::new(),
            Children::Map(map) => map.values().collect(),
            Children::Seq(items) => items.iter().collect(),
        };
        if children.is_empty() {
            out.extend(self.fragments.iter());
        } else {
            for child in children {
                child.collect_leaves(out);
            }
        }
    }
}

/// Attribution of a node inside `block`.
fn fragment_for(block: &ConfigurationBlock, path: &[PathSegment]) -> Fragment {
    if let Some(location) = block.position_of(path) {
        return Fragment::Source(location.clone());
    }
    match block.origin() {
        BlockOrigin::Document(location) => Fragment::Source(location.clone()),
        BlockOrigin::Synthetic(label) => Fragment::Synthetic(label.clone()),
    }
}

/// Where a key path came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlameResult {
    /// The path that was asked about.
    pub requested: KeyPath,
    /// The longest prefix of `requested` found in the merged shape.
    pub matched: KeyPath,
    /// Contributing document positions, deduplicated, in tree order
    /// (see [`BlameTree::leaf_fragments`]).
    pub locations: Vec<SourceLocation>,
    /// Labels of synthetic blocks that contributed.
    pub synthetic: Vec<String>,
}

impl BlameResult {
    /// Whether trailing segments had to be dropped to find a match.
    pub fn is_partial(&self) -> bool {
        self.matched.len() < self.requested.len()
    }
}

/// Finds the sources of `path` in `tree`.
///
/// Missing trailing segments are dropped one at a time until a node is found;
/// a match only at the root yields an empty result. Encoded positions are
/// decoded one hop.
pub fn blame(tree: &BlameTree, path: &[PathSegment]) -> Result<BlameResult, ConfigError> {
    let mut matched = path.to_vec();
    let node = loop {
        if let Some(node) = tree.node(&matched) {
            break node;
        }
        // the root always exists, so this shortens towards a match
        if matched.pop().is_none() {
            break tree;
        }
    };

    let mut result = BlameResult {
        requested: path.to_vec(),
        matched,
        ..BlameResult::default()
    };
    if result.matched.is_empty() && !path.is_empty() {
        return Ok(result);
    }

    for fragment in node.leaf_fragments() {
        match fragment {
            Fragment::Source(location) => {
                let location = location.decoded()?;
                if !result.locations.contains(&location) {
                    result.locations.push(location);
                }
            }
            Fragment::Synthetic(label) => {
                if !result.synthetic.contains(label) {
                    result.synthetic.push(label.clone());
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::location::{encode_enhanced_position, EnhancedPosition};
    use crate::config::path::parse_dotted;
    use serde_json::json;

    fn document_block() -> ConfigurationBlock {
        let origin = BlockOrigin::Document(SourceLocation::new("file:///readme.md", 10, 0));
        ConfigurationBlock::from_value(
            json!({"input-file": ["a.json", "b.json"], "csharp": {"namespace": "Foo"}}),
            origin,
        )
        .unwrap()
        .with_position(
            vec!["input-file".into(), 0.into()],
            SourceLocation::new("file:///readme.md", 12, 4).with_length(6),
        )
        .with_position(
            vec!["input-file".into(), 1.into()],
            SourceLocation::new("file:///readme.md", 13, 4).with_length(6),
        )
    }

    #[test]
    fn test_exact_leaf() {
        let tree = BlameTree::from_block(&document_block());
        let result = blame(&tree, &parse_dotted("input-file.1").unwrap()).unwrap();
        assert!(!result.is_partial());
        assert_eq!(
            result.locations,
            vec![SourceLocation::new("file:///readme.md", 13, 4).with_length(6)]
        );
    }

    #[test]
    fn test_container_collects_leaves() {
        let tree = BlameTree::from_block(&document_block());
        let result = blame(&tree, &parse_dotted("input-file").unwrap()).unwrap();
        assert_eq!(result.locations.len(), 2);
    }

    #[test]
    fn test_mapping_leaves_come_back_sorted_by_key() {
        let block = ConfigurationBlock::synthetic("doc", json!({"section": {"zeta": 1, "alpha": 2}}))
            .unwrap()
            .with_position(
                vec!["section".into(), "zeta".into()],
                SourceLocation::new("file:///readme.md", 3, 2),
            )
            .with_position(
                vec!["section".into(), "alpha".into()],
                SourceLocation::new("file:///readme.md", 4, 2),
            );
        let tree = BlameTree::from_block(&block);
        let result = blame(&tree, &parse_dotted("section").unwrap()).unwrap();
        assert_eq!(
            result.locations,
            vec![
                SourceLocation::new("file:///readme.md", 4, 2),
                SourceLocation::new("file:///readme.md", 3, 2),
            ]
        );
    }

    #[test]
    fn test_unpositioned_leaf_uses_block_origin() {
        let tree = BlameTree::from_block(&document_block());
        let result = blame(&tree, &parse_dotted("csharp.namespace").unwrap()).unwrap();
        assert_eq!(
            result.locations,
            vec![SourceLocation::new("file:///readme.md", 10, 0)]
        );
    }

    #[test]
    fn test_truncates_to_existing_prefix() {
        let tree = BlameTree::from_block(&document_block());
        let result = blame(&tree, &parse_dotted("csharp.output.folder").unwrap()).unwrap();
        assert!(result.is_partial());
        assert_eq!(result.matched, parse_dotted("csharp").unwrap());
        assert_eq!(result.locations.len(), 1);
    }

    #[test]
    fn test_root_only_match_is_empty() {
        let tree = BlameTree::from_block(&document_block());
        let result = blame(&tree, &parse_dotted("missing.key").unwrap()).unwrap();
        assert!(result.is_partial());
        assert!(result.matched.is_empty());
        assert!(result.locations.is_empty());
    }

    #[test]
    fn test_synthetic_blocks_are_marked() {
        let block = ConfigurationBlock::synthetic("defaults", json!({"input-file": []})).unwrap();
        let tree = BlameTree::from_block(&block);
        let result = blame(&tree, &parse_dotted("input-file").unwrap()).unwrap();
        assert!(result.locations.is_empty());
        assert_eq!(result.synthetic, vec!["defaults".to_string()]);
    }

    #[test]
    fn test_deep_adversarial_path_terminates() {
        let tree = BlameTree::from_block(&document_block());
        let path: KeyPath = (0..10_000).map(|i| PathSegment::Key(format!("k{i}"))).collect();
        let result = blame(&tree, &path).unwrap();
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_encoded_positions_are_decoded() {
        let name = encode_enhanced_position(
            "title",
            &EnhancedPosition {
                length: Some(11),
                path: None,
            },
        );
        let block = ConfigurationBlock::synthetic("doc", json!({"title": "x"}))
            .unwrap()
            .with_position(
                vec!["title".into()],
                SourceLocation::new("file:///out.json", 2, 3).with_name(name),
            );
        let tree = BlameTree::from_block(&block);
        let result = blame(&tree, &parse_dotted("title").unwrap()).unwrap();
        assert_eq!(result.locations[0].length, Some(11));
        assert_eq!(result.locations[0].name.as_deref(), Some("title"));
    }
}
