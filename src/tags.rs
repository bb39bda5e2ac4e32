//! Tag queries over literate configuration documents.
//!
//! Documents select input files per tag with guards such as
//! ```` ```yaml $(tag) == 'package-2017' ````. These helpers list the tags a
//! document mentions and answer which files a tag selects.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::config::{Configuration, ConfigurationBlock, ConfigError};
use crate::context::MessageEmitter;

/// Key holding the files a configuration selects.
pub const INPUT_FILE_KEY: &str = "input-file";

/// Key overridden when querying a tag.
pub const TAG_KEY: &str = "tag";

/// Label of the override block injected for tag queries.
const TAG_OVERRIDE_LABEL: &str = "tag";

static TAG_REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(tag\)(.*)").expect("Invalid tag reference regex"));

static QUOTED_VALUE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"](.*?)['"]"#).expect("Invalid quoted value regex"));

/// Tags compared against in `$(tag)` guards, in order of first mention.
///
/// Only the first quoted value after each `$(tag)` counts.
pub fn scan_for_tags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for reference in TAG_REFERENCE_REGEX.captures_iter(content) {
        let rest = reference.get(1).map_or("", |m| m.as_str());
        let Some(value) = QUOTED_VALUE_REGEX.captures(rest).and_then(|c| c.get(1)) else {
            continue;
        };
        if !tags.iter().any(|t| t == value.as_str()) {
            tags.push(value.as_str().to_string());
        }
    }
    tags
}

/// Input files the configuration selects with `tag` set.
pub fn files_for_tag(
    config: &Configuration,
    emitter: &MessageEmitter,
    tag: &str,
) -> Result<Vec<String>, ConfigError> {
    let overrides = ConfigurationBlock::synthetic(TAG_OVERRIDE_LABEL, json!({ TAG_KEY: tag }))?;
    let view = config.create_view(emitter, true, vec![overrides])?;
    Ok(input_files(view.get_entry(INPUT_FILE_KEY)?))
}

/// Tags mentioned in `content` whose selection includes `input_file`.
pub fn tags_referencing(
    config: &Configuration,
    emitter: &MessageEmitter,
    content: &str,
    input_file: &str,
) -> Result<Vec<String>, ConfigError> {
    let mut referencing = Vec::new();
    for tag in scan_for_tags(content) {
        emitter.cancellation().check()?;
        tracing::debug!(%tag, "checking tag");
        if files_for_tag(config, emitter, &tag)?
            .iter()
            .any(|file| file == input_file)
        {
            referencing.push(tag);
        }
    }
    Ok(referencing)
}

/// A single file may be given as a bare string.
fn input_files(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::String(file)) => vec![file],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(file) => Some(file),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_for_tags() {
        let content = r#"
```yaml $(tag) == 'package-2017'
input-file: [a.json]
```
```yaml $(tag) == "package-2018" || $(tag) == 'ignored'
input-file: [b.json]
```
```yaml $(tag) == 'package-2017'
```
```yaml $(tag)
```
"#;
        assert_eq!(scan_for_tags(content), vec!["package-2017", "package-2018"]);
    }

    #[test]
    fn test_scan_for_tags_empty() {
        assert!(scan_for_tags("no guards here").is_empty());
    }

    #[test]
    fn test_input_files_accepts_string_or_list() {
        assert_eq!(input_files(Some(json!("a.json"))), vec!["a.json"]);
        assert_eq!(input_files(Some(json!(["a.json", 3, "b.json"]))), vec!["a.json", "b.json"]);
        assert!(input_files(None).is_empty());
    }

    #[test]
    fn test_files_for_tag_uses_guarded_blocks() {
        use crate::config::SourceLocation;

        let guarded = ConfigurationBlock::from_value(
            json!({"input-file": ["v1.json"]}),
            crate::config::BlockOrigin::Document(SourceLocation::new("file:///r/readme.md", 5, 0)),
        )
        .unwrap()
        .with_guard("$(tag) == 'v1'");
        let config = Configuration::builder("magic")
            .with_defaults(guarded)
            .with_defaults(ConfigurationBlock::synthetic("defaults", json!({"input-file": []})).unwrap())
            .build();
        let emitter = MessageEmitter::default();

        assert_eq!(files_for_tag(&config, &emitter, "v1").unwrap(), vec!["v1.json"]);
        assert!(files_for_tag(&config, &emitter, "v2").unwrap().is_empty());
        assert_eq!(
            tags_referencing(&config, &emitter, "$(tag) == 'v1' $(tag) == 'v2'", "v1.json").unwrap(),
            vec!["v1"]
        );
    }
}
