//! Override block built from environment variables.
//!
//! `LITERATE__INPUT_FILE=a.json` becomes `{"input-file": "a.json"}` and
//! `LITERATE__CSHARP__NAMESPACE=Foo` becomes `{"csharp": {"namespace": "Foo"}}`:
//! the prefix and separator are removed, the rest is split on the separator,
//! lowercased, and single underscores turn into dashes.

use serde_json::{Map, Value};

use super::block::ConfigurationBlock;
use super::source::insert_at_path;

/// Label of blocks built from the environment.
pub const ENV_BLOCK_LABEL: &str = "environment";

const DEFAULT_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    /// An empty separator falls back to `__`.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        Self {
            prefix: prefix.into(),
            separator: if separator.is_empty() {
                DEFAULT_SEPARATOR.to_string()
            } else {
                separator
            },
        }
    }

    /// Block built from the current process environment.
    pub fn block(&self) -> ConfigurationBlock {
        self.block_from(std::env::vars())
    }

    /// Block built from the given variables. Returns an empty block when no
    /// variable carries the prefix.
    pub fn block_from(&self, vars: impl IntoIterator<Item = (String, String)>) -> ConfigurationBlock {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        let mut data = Map::new();

        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            if path_str.is_empty() {
                continue;
            }

            let path: Vec<String> = path_str
                .split(&self.separator)
                .map(|s| s.to_lowercase().replace('_', "-"))
                .collect();
            if path.iter().any(String::is_empty) {
                tracing::debug!(variable = %key, "ignoring environment variable with empty segment");
                continue;
            }

            insert_at_path(&mut data, &path, coerce_value(&value));
        }

        let count = data.len();
        if count > 0 {
            tracing::debug!(prefix = %self.prefix, keys = count, "environment overrides loaded");
        }
        ConfigurationBlock::synthetic(ENV_BLOCK_LABEL, Value::Object(data))
            .unwrap_or_else(|_| ConfigurationBlock::empty(ENV_BLOCK_LABEL))
    }
}

fn coerce_value(s: &str) -> Value {
    // JSON sequences and mappings
    if s.starts_with('[') || s.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(s) {
            return value;
        }
    }

    // Try boolean first (case-insensitive)
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    // Try integer (only if it looks like an integer: optional minus, then digits)
    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::from(i);
        }
    }

    // Try float (if contains decimal point)
    if s.contains('.') {
        if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }

    // Fallback to string
    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_maps_variables_to_keys() {
        let block = EnvSource::new("LITERATE", "__").block_from(vars(&[
            ("LITERATE__INPUT_FILE", r#"["a.json"]"#),
            ("LITERATE__CSHARP__NAMESPACE", "Foo"),
            ("LITERATE__DEBUG", "true"),
            ("LITERATE__RETRIES", "3"),
            ("OTHER__THING", "ignored"),
        ]));
        assert_eq!(
            Value::Object(block.data().clone()),
            json!({
                "input-file": ["a.json"],
                "csharp": {"namespace": "Foo"},
                "debug": true,
                "retries": 3
            })
        );
    }

    #[test]
    fn test_skips_empty_segments() {
        let block = EnvSource::new("LITERATE", "__")
            .block_from(vars(&[("LITERATE__", "x"), ("LITERATE__A____B", "y")]));
        assert!(block.data().is_empty());
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("1.5"), json!(1.5));
        assert_eq!(coerce_value("-7"), json!(-7));
        assert_eq!(coerce_value("FALSE"), json!(false));
        assert_eq!(coerce_value("[oops"), json!("[oops"));
        assert_eq!(coerce_value("v1.2.3"), json!("v1.2.3"));
    }
}
