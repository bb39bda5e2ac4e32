//! Immutable, queryable result of one merge pass.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::blame::{blame, BlameResult, BlameTree};
use super::block::ConfigurationBlock;
use super::merge::{fold_layers, Candidate, Layer};
use super::path::{parse_dotted, to_dotted, PathSegment};
use super::resolve::Resolver;
use super::ConfigError;
use crate::context::MessageEmitter;
use crate::diagnostics::Message;

/// Reserved top-level mapping listing extensions by name and source.
pub const USE_EXTENSION_KEY: &str = "use-extension";

/// An extension requested through the `use-extension` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseExtension {
    pub name: String,
    pub source: String,
    /// JSON text of `[name, source]`, unique per requested extension.
    pub fully_qualified: String,
}

/// Merged configuration built from blocks in priority order.
///
/// A view never changes after construction. Scoped variants are separate
/// views produced by [`nested`](Self::nested).
#[derive(Debug, Clone)]
pub struct ConfigurationView {
    emitter: MessageEmitter,
    folder_uri: String,
    blocks: Vec<ConfigurationBlock>,
    merged: Value,
    lineage: BlameTree,
    debug: bool,
    verbose: bool,
}

impl ConfigurationView {
    /// Evaluates guards and merges `blocks`, highest priority first.
    pub fn new(
        emitter: MessageEmitter,
        folder_uri: impl Into<String>,
        blocks: Vec<ConfigurationBlock>,
    ) -> Result<Self, ConfigError> {
        let candidates = blocks.iter().map(Candidate::from).collect();
        Self::from_candidates(emitter, folder_uri.into(), blocks, candidates)
    }

    fn from_candidates(
        emitter: MessageEmitter,
        folder_uri: String,
        blocks: Vec<ConfigurationBlock>,
        candidates: Vec<Candidate>,
    ) -> Result<Self, ConfigError> {
        let count = candidates.len();
        let folded = fold_layers(candidates);

        let resolver = Resolver::new(&folded.layer.value);
        let debug = matches!(resolver.get_dotted("debug")?, Some(Value::Bool(true)));
        let verbose = matches!(resolver.get_dotted("verbose")?, Some(Value::Bool(true)));

        let view = Self {
            emitter,
            folder_uri,
            blocks,
            merged: folded.layer.value,
            lineage: folded.layer.blame,
            debug,
            verbose,
        };

        for err in folded.guard_errors {
            view.message(Message::warning(format!("{err}; block skipped")));
        }
        view.message(Message::debug(format!(
            "Creating ConfigurationView : {count} sections."
        )));
        tracing::debug!(
            sections = count,
            accepted = folded.accepted.len(),
            "configuration view created"
        );
        Ok(view)
    }

    /// Resolved value at a dotted key; `Ok(None)` when the key is absent.
    pub fn get_entry(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        self.resolver().get_dotted(key)
    }

    /// Resolved value at `key` deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get_entry(key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|source| ConfigError::DeserializeError {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Top-level keys in merge order.
    pub fn keys(&self) -> Vec<String> {
        self.merged
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fully resolved tree.
    pub fn raw(&self) -> Result<Value, ConfigError> {
        self.resolver().resolve_all()
    }

    /// Merged tree before reference substitution.
    pub fn merged(&self) -> &Value {
        &self.merged
    }

    pub fn lineage(&self) -> &BlameTree {
        &self.lineage
    }

    /// Blocks this view was built from, highest priority first.
    pub fn blocks(&self) -> &[ConfigurationBlock] {
        &self.blocks
    }

    pub fn folder_uri(&self) -> &str {
        &self.folder_uri
    }

    pub fn emitter(&self) -> &MessageEmitter {
        &self.emitter
    }

    pub fn debug_mode(&self) -> bool {
        self.debug
    }

    pub fn verbose_mode(&self) -> bool {
        self.verbose
    }

    /// Lists every top-level key with its resolved value.
    pub fn dump(&self, title: &str) -> Result<String, ConfigError> {
        let mut out = format!("\n{title}\n===================================\n");
        for key in self.keys() {
            let value = self
                .resolver()
                .get(&[PathSegment::Key(key.clone())])?
                .unwrap_or(Value::Null);
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("{key} : {text}\n"));
        }
        Ok(out)
    }

    /// Extensions requested under the `use-extension` mapping.
    pub fn use_extensions(&self) -> Result<Vec<UseExtension>, ConfigError> {
        let Some(Value::Object(requested)) = self.get_entry(USE_EXTENSION_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(requested
            .into_iter()
            .map(|(name, source)| {
                let fully_qualified = json!([&name, &source]).to_string();
                let source = match source {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                UseExtension {
                    name,
                    source,
                    fully_qualified,
                }
            })
            .collect())
    }

    /// Child views scoped to the top-level `section`.
    ///
    /// - absent, `null` or `false`: no children
    /// - `true`: one child with an empty scope
    /// - a mapping: one child with the mapping as its highest-priority block
    /// - a sequence: the above, per element
    ///
    /// Other scalars are skipped with a warning.
    pub fn nested(&self, section: &str) -> Result<Vec<ConfigurationView>, ConfigError> {
        let key = PathSegment::Key(section.to_string());
        let Some(value) = self.resolver().get(std::slice::from_ref(&key))? else {
            return Ok(Vec::new());
        };

        let scopes: Vec<(Value, Vec<PathSegment>)> = match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (item, vec![key.clone(), PathSegment::Index(i)]))
                .collect(),
            other => vec![(other, vec![key.clone()])],
        };

        let mut children = Vec::new();
        for (scope, path) in scopes {
            match scope {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => {
                    children.push(self.derive(ConfigurationBlock::empty(section), None)?);
                }
                Value::Object(_) => {
                    let block = ConfigurationBlock::synthetic(section, scope)?;
                    children.push(self.derive(block, Some(&path))?);
                }
                other => self.message(
                    Message::warning(format!(
                        "Ignoring '{}' in section '{section}': expected a mapping or true, found {other}",
                        to_dotted(&path)
                    ))
                    .with_key(path),
                ),
            }
        }
        Ok(children)
    }

    /// Builds a child with `scope` over this view's merged tree.
    fn derive(
        &self,
        scope: ConfigurationBlock,
        path: Option<&[PathSegment]>,
    ) -> Result<ConfigurationView, ConfigError> {
        let mut scope_candidate = Candidate::from(&scope);
        if let Some(lineage) = path.and_then(|p| self.lineage.node(p)) {
            scope_candidate.layer.blame = lineage.clone();
        }
        let parent = Candidate {
            label: "parent".to_string(),
            guard: None,
            layer: Layer {
                value: self.merged.clone(),
                blame: self.lineage.clone(),
            },
        };

        let mut blocks = Vec::with_capacity(self.blocks.len() + 1);
        blocks.push(scope);
        blocks.extend(self.blocks.iter().cloned());

        Self::from_candidates(
            self.emitter.clone(),
            self.folder_uri.clone(),
            blocks,
            vec![scope_candidate, parent],
        )
    }

    /// Sources of the value at a dotted key.
    ///
    /// When the exact path is not in the merged tree, trailing segments are
    /// dropped until one is; that emits one warning and returns the partial
    /// (possibly empty) result.
    pub fn blame(&self, key: &str) -> Result<BlameResult, ConfigError> {
        let path = parse_dotted(key)?;
        let result = blame(&self.lineage, &path)?;
        if result.is_partial() {
            self.emitter.dispatch(Message::warning(format!(
                "Could not find the exact path '{key}'; using '{}'",
                to_dotted(&result.matched)
            )));
        }
        Ok(result)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.merged)
    }
}
