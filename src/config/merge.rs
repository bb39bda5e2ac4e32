//! Configuration merge logic
//!
//! Blocks arrive highest priority first and are folded left, starting from an
//! empty tree. The accumulator therefore always holds exactly the merge of the
//! blocks with higher priority than the one being folded in, which is the
//! context that block's guard is evaluated against.
//!
//! Merge semantics (higher vs lower priority):
//! - Objects: deep-merge by key; keys only the lower side has pass through
//! - Arrays: APPEND (higher items first)
//! - Scalars: higher wins
//! - Type mismatch: higher wins, lower branch is dropped
//!
//! A key suffixed with `!` (`input-file!: [...]`) replaces the lower-priority
//! value instead of merging with it. The marker is removed from the result.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::blame::{BlameTree, Children};
use super::block::ConfigurationBlock;
use super::guard::{evaluate_guard, GuardError};
use super::path::{to_dotted, KeyPath, PathSegment};

/// Suffix marking a key whose value replaces lower-priority values.
pub const REPLACE_MARKER: char = '!';

/// A value together with its lineage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub value: Value,
    pub blame: BlameTree,
}

impl Layer {
    pub fn from_block(block: &ConfigurationBlock) -> Self {
        Self {
            value: Value::Object(block.data().clone()),
            blame: BlameTree::from_block(block),
        }
    }

    fn empty() -> Self {
        Self {
            value: Value::Object(Map::new()),
            blame: BlameTree {
                fragments: Vec::new(),
                children: Children::Map(BTreeMap::new()),
            },
        }
    }
}

/// One input to [`fold_layers`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub guard: Option<String>,
    pub layer: Layer,
}

impl From<&ConfigurationBlock> for Candidate {
    fn from(block: &ConfigurationBlock) -> Self {
        Self {
            label: block.origin().document_label().to_string(),
            guard: block.guard().map(str::to_string),
            layer: Layer::from_block(block),
        }
    }
}

/// Result of folding candidates together.
#[derive(Debug)]
pub struct Folded {
    pub layer: Layer,
    /// Indices of the candidates whose guards passed, in priority order.
    pub accepted: Vec<usize>,
    /// Guard problems; each one skipped its block.
    pub guard_errors: Vec<GuardError>,
}

/// Filters candidates by guard and merges the survivors, highest priority first.
pub fn fold_layers(candidates: Vec<Candidate>) -> Folded {
    let mut acc = Layer::empty();
    let mut accepted = Vec::new();
    let mut guard_errors = Vec::new();

    for (index, candidate) in candidates.into_iter().enumerate() {
        if let Some(guard) = candidate.guard.as_deref() {
            let context = strip_markers(acc.clone());
            match evaluate_guard(guard, &context.value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(block = %candidate.label, guard, "guard is false, skipping block");
                    continue;
                }
                Err(err) => {
                    tracing::debug!(block = %candidate.label, error = %err, "guard failed, skipping block");
                    guard_errors.push(err);
                    continue;
                }
            }
        }
        acc = merge_layers(acc, candidate.layer, &mut Vec::new());
        accepted.push(index);
    }

    Folded {
        layer: strip_markers(acc),
        accepted,
        guard_errors,
    }
}

/// Merges two values without lineage; see the module docs for the rules.
pub fn deep_merge(higher: Value, lower: Value) -> Value {
    let higher = Layer {
        blame: BlameTree::synthetic(&higher, ""),
        value: higher,
    };
    let lower = Layer {
        blame: BlameTree::synthetic(&lower, ""),
        value: lower,
    };
    strip_markers(merge_layers(higher, lower, &mut Vec::new())).value
}

/// Merges `lower` under `higher`. Replace markers are kept so that they keep
/// applying to blocks folded in later; [`strip_markers`] removes them.
fn merge_layers(higher: Layer, lower: Layer, path: &mut KeyPath) -> Layer {
    match (higher.value, lower.value) {
        (Value::Object(high_map), Value::Object(mut low_map)) => {
            let mut high_children = into_map_children(higher.blame.children);
            let mut low_children = into_map_children(lower.blame.children);
            let mut out_map = Map::with_capacity(high_map.len() + low_map.len());
            let mut out_children = BTreeMap::new();

            // higher keys first, in their order
            for (key, high_value) in high_map {
                let high_blame = high_children.remove(&key).unwrap_or_default();
                let base = key.strip_suffix(REPLACE_MARKER).unwrap_or(&key).to_string();
                let marked = format!("{base}{REPLACE_MARKER}");

                if key.ends_with(REPLACE_MARKER) {
                    // higher value replaces everything below it
                    low_map.shift_remove(&base);
                    low_map.shift_remove(&marked);
                    out_map.insert(key.clone(), high_value);
                    out_children.insert(key, high_blame);
                    continue;
                }

                let low_key = if low_map.contains_key(&marked) {
                    Some(marked)
                } else if low_map.contains_key(&base) {
                    Some(base.clone())
                } else {
                    None
                };
                let Some(low_key) = low_key else {
                    out_map.insert(key.clone(), high_value);
                    out_children.insert(key, high_blame);
                    continue;
                };

                let low = Layer {
                    value: low_map.shift_remove(&low_key).unwrap_or_default(),
                    blame: low_children.remove(&low_key).unwrap_or_default(),
                };
                let high = Layer {
                    value: high_value,
                    blame: high_blame,
                };
                path.push(PathSegment::Key(base));
                let merged = merge_layers(high, low, path);
                path.pop();
                // a marked lower key still replaces whatever is below it
                out_map.insert(low_key.clone(), merged.value);
                out_children.insert(low_key, merged.blame);
            }

            // then keys only the lower layer has
            for (key, low_value) in low_map {
                let base = key.strip_suffix(REPLACE_MARKER).unwrap_or(&key);
                if out_map.contains_key(&format!("{base}{REPLACE_MARKER}")) {
                    continue;
                }
                let low_blame = low_children.remove(&key).unwrap_or_default();
                out_map.insert(key.clone(), low_value);
                out_children.insert(key, low_blame);
            }

            Layer {
                value: Value::Object(out_map),
                blame: BlameTree {
                    fragments: merge_fragments(higher.blame.fragments, lower.blame.fragments),
                    children: Children::Map(out_children),
                },
            }
        }

        // Arrays: APPEND
        (Value::Array(mut high_items), Value::Array(low_items)) => {
            let mut children = into_seq_children(higher.blame.children, high_items.len());
            children.extend(into_seq_children(lower.blame.children, low_items.len()));
            high_items.extend(low_items);
            Layer {
                value: Value::Array(high_items),
                blame: BlameTree {
                    fragments: merge_fragments(higher.blame.fragments, lower.blame.fragments),
                    children: Children::Seq(children),
                },
            }
        }

        (high_value, low_value) => {
            if is_container(&high_value) || is_container(&low_value) {
                tracing::debug!(
                    key = %to_dotted(path),
                    "merge type conflict, higher priority value wins"
                );
            }
            Layer {
                value: high_value,
                blame: higher.blame,
            }
        }
    }
}

/// Removes replace markers from keys, merging a marked key into an unmarked
/// sibling of the same name if both exist.
pub fn strip_markers(layer: Layer) -> Layer {
    match layer.value {
        Value::Object(map) => {
            let mut children = into_map_children(layer.blame.children);
            let mut out_map = Map::with_capacity(map.len());
            let mut out_children = BTreeMap::new();
            for (key, value) in map {
                let blame = children.remove(&key).unwrap_or_default();
                let stripped = strip_markers(Layer { value, blame });
                let base = key.strip_suffix(REPLACE_MARKER).unwrap_or(&key).to_string();
                // a marked key is always the higher-priority one
                if key.ends_with(REPLACE_MARKER) || !out_map.contains_key(&base) {
                    out_map.insert(base.clone(), stripped.value);
                    out_children.insert(base, stripped.blame);
                }
            }
            Layer {
                value: Value::Object(out_map),
                blame: BlameTree {
                    fragments: layer.blame.fragments,
                    children: Children::Map(out_children),
                },
            }
        }
        Value::Array(items) => {
            let children = into_seq_children(layer.blame.children, items.len());
            let (values, blames): (Vec<_>, Vec<_>) = items
                .into_iter()
                .zip(children)
                .map(|(value, blame)| {
                    let stripped = strip_markers(Layer { value, blame });
                    (stripped.value, stripped.blame)
                })
                .unzip();
            Layer {
                value: Value::Array(values),
                blame: BlameTree {
                    fragments: layer.blame.fragments,
                    children: Children::Seq(blames),
                },
            }
        }
        value => Layer {
            value,
            blame: layer.blame,
        },
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn into_map_children(children: Children) -> BTreeMap<String, BlameTree> {
    match children {
        Children::Map(map) => map,
        _ => BTreeMap::new(),
    }
}

fn into_seq_children(children: Children, len: usize) -> Vec<BlameTree> {
    let mut items = match children {
        Children::Seq(items) => items,
        _ => Vec::new(),
    };
    items.resize_with(len, BlameTree::default);
    items
}

fn merge_fragments<T: PartialEq>(mut higher: Vec<T>, lower: Vec<T>) -> Vec<T> {
    for fragment in lower {
        if !higher.contains(&fragment) {
            higher.push(fragment);
        }
    }
    higher
}
