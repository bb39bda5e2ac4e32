//! Cross-key reference resolution for configuration values.
//!
//! Supports `$(path.to.key)` syntax for referencing other values in the same tree.
//! Use `$$` to escape and produce a literal `$` (so `$$(key)` becomes `$(key)`).
//!
//! A string that is exactly one reference resolves to the referenced value
//! with its own type; references embedded in longer strings interpolate scalars.
//! Resolution is lazy: nothing is substituted until a key is read, and the
//! tree itself is never modified.

use serde_json::Value;

use super::path::{lookup, parse_dotted, to_dotted, PathSegment};
use super::ConfigError;

/// Upper bound on nested reference hops in one lookup.
pub const MAX_REFERENCE_DEPTH: usize = 64;

/// Read-only lookups with reference substitution over a merged tree.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    root: &'a Value,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Looks up a dotted key and resolves it.
    ///
    /// Returns `Ok(None)` when the key does not exist.
    pub fn get_dotted(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        let path = parse_dotted(key)?;
        self.get(&path)
    }

    /// Looks up `path` and resolves it. Sequences resolve element-wise and
    /// mappings value-wise.
    pub fn get(&self, path: &[PathSegment]) -> Result<Option<Value>, ConfigError> {
        let Some(raw) = lookup(self.root, path) else {
            return Ok(None);
        };
        let mut chain = Vec::new();
        if !path.is_empty() {
            chain.push(to_dotted(path));
        }
        self.resolve_value(raw, &mut chain).map(Some)
    }

    /// Resolves every reference in the whole tree.
    pub fn resolve_all(&self) -> Result<Value, ConfigError> {
        self.resolve_value(self.root, &mut Vec::new())
    }

    fn resolve_value(&self, value: &Value, chain: &mut Vec<String>) -> Result<Value, ConfigError> {
        match value {
            Value::String(s) => self.resolve_string(s, chain),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, chain))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve_value(item, chain)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves the value a reference points at, tracking the chain of keys
    /// visited so far.
    fn follow(&self, key: &str, chain: &mut Vec<String>) -> Result<Value, ConfigError> {
        let path = parse_dotted(key.trim())?;
        let key = to_dotted(&path);

        if chain.contains(&key) || chain.len() >= MAX_REFERENCE_DEPTH {
            let mut cycle = chain.clone();
            cycle.push(key);
            return Err(ConfigError::RecursiveReference { chain: cycle });
        }

        let raw = lookup(self.root, &path)
            .ok_or_else(|| ConfigError::UnresolvedReference(key.clone()))?;

        chain.push(key);
        let resolved = self.resolve_value(raw, chain);
        chain.pop();
        resolved
    }

    /// Resolves all `$(...)` references in a string.
    /// Handles `$$` escape sequences.
    fn resolve_string(&self, s: &str, chain: &mut Vec<String>) -> Result<Value, ConfigError> {
        if let Some(key) = whole_reference(s) {
            return self.follow(key, chain);
        }
        if !s.contains('$') {
            return Ok(Value::String(s.to_string()));
        }

        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    // Escape sequence: $$ -> $
                    chars.next();
                    result.push('$');
                }
                Some('(') => {
                    chars.next();
                    let key = consume_until(&mut chars, ')')
                        .ok_or_else(|| ConfigError::UnclosedReference(s.to_string()))?;
                    let resolved = self.follow(&key, chain)?;
                    result.push_str(&value_to_string(&resolved, &key)?);
                }
                _ => result.push('$'),
            }
        }

        Ok(Value::String(result))
    }
}

/// Returns the key when `s` is exactly one `$(key)` reference.
fn whole_reference(s: &str) -> Option<&str> {
    let key = s.strip_prefix("$(")?.strip_suffix(')')?;
    (!key.contains(['(', ')', '$'])).then_some(key)
}

/// Consumes characters until the delimiter, returning the collected string.
fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None // Delimiter not found
}

/// Converts a resolved value to the text interpolated into a string.
fn value_to_string(value: &Value, key: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => Err(ConfigError::NonScalarReference(key.to_string())),
    }
}
