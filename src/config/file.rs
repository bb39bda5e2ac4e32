//! Built-in defaults loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::block::ConfigurationBlock;
use super::ConfigError;

/// A TOML file supplying a defaults block.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist are silently skipped.
#[derive(Debug, Clone)]
pub struct DefaultsFile {
    path: PathBuf,
    required: bool,
}

impl DefaultsFile {
    /// Creates a new defaults file source.
    ///
    /// If `required` is true, loading fails if the file doesn't exist.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }

    /// Loads the file as a synthetic block labelled with its path.
    pub fn load(&self) -> Result<Option<ConfigurationBlock>, ConfigError> {
        let Some(table) = load_defaults_file(&self.path, self.required)? else {
            return Ok(None);
        };
        let label = format!("defaults:{}", self.path.display());
        ConfigurationBlock::synthetic(label, toml_to_json(toml::Value::Table(table))).map(Some)
    }
}

/// Loads and parses a TOML defaults file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
pub fn load_defaults_file(path: &Path, required: bool) -> Result<Option<toml::Table>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            tracing::debug!(path = %path.display(), "loaded defaults file");
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            uri: path.display().to_string(),
            source: e,
        }),
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
