//! End-to-end tests: markdown documents with fenced YAML blocks, loaded from
//! memory and from disk.

use std::sync::Arc;

use literate_config::config::{EnvSource, KeyPath, PathSegment};
use literate_config::fs::folder_uri;
use literate_config::{
    BlockSource, CancellationToken, Channel, CodeBlock, CollectingSink, ConfigError,
    Configuration, ConfigurationBlock, ConfigurationView, DiskFileSystem, MemoryFileSystem,
    MessageEmitter, SourceLocation,
};
use rstest::rstest;
use serde_json::{json, Value};
use tempfile::TempDir;

const MAGIC: &str = "\n> see https://aka.ms/autorest";

/// Extracts ```` ```yaml ```` fences, recording the line of each top-level key.
#[derive(Debug)]
struct MarkdownYaml;

impl BlockSource for MarkdownYaml {
    fn parse(&self, document_uri: &str, content: &str) -> Result<Vec<CodeBlock>, ConfigError> {
        let lines: Vec<&str> = content.lines().collect();
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(info) = lines[i].strip_prefix("```yaml") else {
                i += 1;
                continue;
            };
            let start = i + 1;
            let mut end = start;
            while end < lines.len() && lines[end].trim() != "```" {
                end += 1;
            }
            let body = lines[start..end].join("\n");
            let data: Value = serde_yaml::from_str(&body).map_err(|e| ConfigError::Syntax {
                document: document_uri.to_string(),
                message: e.to_string(),
            })?;
            let data = if data.is_null() { json!({}) } else { data };

            let mut block = CodeBlock::new(data, SourceLocation::new(document_uri, start + 1, 0))
                .with_info(format!("yaml{info}"));
            for (offset, line) in lines[start..end].iter().enumerate() {
                if let Some((key, _)) = line.split_once(':') {
                    if !key.is_empty() && !key.starts_with(' ') && !key.starts_with('-') {
                        let path: KeyPath = vec![PathSegment::from(key)];
                        block = block.with_position(
                            path,
                            SourceLocation::new(document_uri, start + offset + 1, 0)
                                .with_length(key.len()),
                        );
                    }
                }
            }
            blocks.push(block);
            i = end + 1;
        }
        Ok(blocks)
    }
}

fn readme(body: &str) -> String {
    format!("# Service{MAGIC}\n\n{body}")
}

fn defaults() -> ConfigurationBlock {
    ConfigurationBlock::synthetic("defaults", json!({"input-file": []})).unwrap()
}

fn memory_config(files: &[(&str, String)], location: &str) -> Configuration {
    let fs = files
        .iter()
        .fold(MemoryFileSystem::new(), |fs, (uri, content)| fs.with_file(*uri, content.clone()));
    Configuration::builder(MAGIC)
        .with_documents(Arc::new(fs), Arc::new(MarkdownYaml))
        .with_location(location)
        .with_defaults(defaults())
        .build()
}

fn collecting() -> (Arc<CollectingSink>, MessageEmitter) {
    let sink = Arc::new(CollectingSink::new());
    let emitter = MessageEmitter::new(sink.clone());
    (sink, emitter)
}

const TAGGED_README: &str = r#"
```yaml
tag: package-2017
title: Storage
```

```yaml $(tag) == 'package-2017'
input-file:
  - stable/2017/storage.json
```

```yaml $(tag) == 'package-2018'
input-file:
  - stable/2018/storage.json
```
"#;

mod loading {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_override_appends_ahead_of_defaults() {
        let config = memory_config(
            &[("file:///r/readme.md", readme("```yaml\n```\n"))],
            "file:///r/readme.md",
        );
        let (_, emitter) = collecting();
        let overrides =
            ConfigurationBlock::synthetic("override", json!({"input-file": ["a.json"]})).unwrap();

        let view = config.create_view(&emitter, true, vec![overrides]).unwrap();
        assert_eq!(view.get_entry("input-file").unwrap(), Some(json!(["a.json"])));
    }

    #[rstest]
    #[case::document_default(None, vec!["stable/2017/storage.json"])]
    #[case::override_tag(Some("package-2018"), vec!["stable/2018/storage.json"])]
    #[case::unknown_tag(Some("package-2000"), vec![])]
    fn test_guards_see_higher_priority_tag(
        #[case] tag: Option<&str>,
        #[case] expected: Vec<&str>,
    ) {
        let config = memory_config(
            &[("file:///r/readme.md", readme(TAGGED_README))],
            "file:///r/",
        );
        let (_, emitter) = collecting();
        let overrides = tag
            .map(|t| vec![ConfigurationBlock::synthetic("override", json!({"tag": t})).unwrap()])
            .unwrap_or_default();

        let view = config.create_view(&emitter, true, overrides).unwrap();
        let expected: Vec<String> = expected.into_iter().map(String::from).collect();
        assert_eq!(view.get_as::<Vec<String>>("input-file").unwrap(), Some(expected));
    }

    #[test]
    fn test_malformed_guard_warns_once_and_skips_block() {
        let body = "```yaml\ntag: v1\n```\n\n```yaml $(tag) ==\ninput-file:\n  - broken.json\n```\n";
        let config = memory_config(&[("file:///r/readme.md", readme(body))], "file:///r");
        let (sink, emitter) = collecting();

        let view = config.create_view(&emitter, true, Vec::new()).unwrap();
        assert_eq!(view.get_entry("input-file").unwrap(), Some(json!([])));
        assert_eq!(view.get_entry("tag").unwrap(), Some(json!("v1")));

        let warnings = sink.on_channel(Channel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text.contains("$(tag) =="));
    }

    #[test]
    fn test_references_resolve_across_blocks() {
        let body = "```yaml\noutput-folder: $(base)/generated\n```\n\n```yaml\nbase: /out\nport: 8080\nport-text: \"$(port)\"\n```\n";
        let config = memory_config(&[("file:///r/readme.md", readme(body))], "file:///r");
        let view = config.create_view(&MessageEmitter::default(), true, Vec::new()).unwrap();

        assert_eq!(view.get_entry("output-folder").unwrap(), Some(json!("/out/generated")));
        assert_eq!(view.get_entry("port-text").unwrap(), Some(json!(8080)));
        assert_eq!(view.get_entry("missing").unwrap(), None);
    }

    #[test]
    fn test_recursive_reference_is_reported() {
        let body = "```yaml\na: $(b)\nb: $(a)\n```\n";
        let config = memory_config(&[("file:///r/readme.md", readme(body))], "file:///r");
        let view = config.create_view(&MessageEmitter::default(), true, Vec::new()).unwrap();

        let err = view.get_entry("a").unwrap_err();
        assert!(matches!(err, ConfigError::RecursiveReference { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_environment_block_outranks_document() {
        let body = "```yaml\nnamespace: FromDoc\nlicense: MIT\n```\n";
        let config = memory_config(&[("file:///r/readme.md", readme(body))], "file:///r");
        let env = EnvSource::new("LITERATE", "__")
            .block_from(vec![("LITERATE__NAMESPACE".to_string(), "FromEnv".to_string())]);

        let view = config.create_view(&MessageEmitter::default(), true, vec![env]).unwrap();
        assert_eq!(view.get_entry("namespace").unwrap(), Some(json!("FromEnv")));
        assert_eq!(view.get_entry("license").unwrap(), Some(json!("MIT")));
    }

    #[test]
    fn test_invalid_block_aborts_with_syntax_error() {
        let body = "```yaml\n- just\n- a list\n```\n";
        let config = memory_config(&[("file:///r/readme.md", readme(body))], "file:///r");
        let (sink, emitter) = collecting();

        let err = config.create_view(&emitter, true, Vec::new()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(sink.on_channel(Channel::Error).len(), 1);
    }

    #[test]
    fn test_cancelled_session_stops_loading() {
        let config = memory_config(&[("file:///r/readme.md", readme(TAGGED_README))], "file:///r");
        let token = CancellationToken::new();
        let emitter = MessageEmitter::default().with_cancellation(token.clone());
        token.cancel();

        let err = config.create_view(&emitter, true, Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Cancelled));
        assert_eq!(err.exit_code(), 130);
    }
}

mod detection {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_disk_detection_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), readme(TAGGED_README)).unwrap();
        fs::write(dir.path().join("notes.md"), "unrelated").unwrap();
        let nested = dir.path().join("specs").join("v1");
        fs::create_dir_all(&nested).unwrap();

        let config = Configuration::builder(MAGIC)
            .with_documents(Arc::new(DiskFileSystem), Arc::new(MarkdownYaml))
            .with_location(folder_uri(&nested).unwrap())
            .walk_up_folders(true)
            .build();

        let found = config
            .detect_configuration_file(&CancellationToken::new())
            .unwrap()
            .unwrap();
        assert!(found.ends_with("/README.md"));

        let view = config.create_view(&MessageEmitter::default(), false, Vec::new()).unwrap();
        assert_eq!(view.get_entry("title").unwrap(), Some(json!("Storage")));
        assert_eq!(view.folder_uri(), folder_uri(dir.path()).unwrap());
    }

    #[test]
    fn test_no_document_uses_location_as_folder() {
        let config = memory_config(&[("file:///r/other.md", "no marker".to_string())], "file:///r/");
        let view = config.create_view(&MessageEmitter::default(), true, Vec::new()).unwrap();

        assert_eq!(view.folder_uri(), "file:///r/");
        assert_eq!(view.get_entry("input-file").unwrap(), Some(json!([])));
    }
}

mod views {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tagged_view(emitter: &MessageEmitter) -> ConfigurationView {
        let body = r#"
```yaml
csharp:
  namespace: Contoso.Storage
  output-folder: ./generated
python:
  - package-name: storage-a
  - package-name: storage-b
  - 42
use-extension:
  "@autorest/modelerfour": "~4.19"
```
"#;
        memory_config(&[("file:///r/readme.md", readme(body))], "file:///r")
            .create_view(emitter, true, Vec::new())
            .unwrap()
    }

    #[test]
    fn test_nested_views_scope_sections() {
        let (sink, emitter) = collecting();
        let view = tagged_view(&emitter);

        let csharp = view.nested("csharp").unwrap();
        assert_eq!(csharp.len(), 1);
        assert_eq!(csharp[0].get_entry("namespace").unwrap(), Some(json!("Contoso.Storage")));

        let python = view.nested("python").unwrap();
        let names: Vec<Value> = python
            .iter()
            .map(|v| v.get_entry("package-name").unwrap().unwrap())
            .collect();
        assert_eq!(names, vec![json!("storage-a"), json!("storage-b")]);
        assert_eq!(sink.on_channel(Channel::Warning).len(), 1);

        assert!(view.nested("go").unwrap().is_empty());
    }

    #[test]
    fn test_use_extensions() {
        let view = tagged_view(&MessageEmitter::default());
        let extensions = view.use_extensions().unwrap();
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].name, "@autorest/modelerfour");
        assert_eq!(extensions[0].source, "~4.19");
        assert_eq!(extensions[0].fully_qualified, r#"["@autorest/modelerfour","~4.19"]"#);
    }

    #[test]
    fn test_blame_points_at_document_lines() {
        let (sink, emitter) = collecting();
        let view = tagged_view(&emitter);

        let exact = view.blame("csharp").unwrap();
        assert!(!exact.is_partial());
        assert_eq!(exact.locations.len(), 1);
        assert_eq!(exact.locations[0].document, "file:///r/readme.md");
        assert!(sink.on_channel(Channel::Warning).is_empty());

        let partial = view.blame("csharp.missing.deeper").unwrap();
        assert!(partial.is_partial());
        assert_eq!(partial.locations, exact.locations);
        assert_eq!(sink.on_channel(Channel::Warning).len(), 1);

        let unknown = view.blame("nowhere").unwrap();
        assert!(unknown.locations.is_empty());
        assert!(unknown.synthetic.is_empty());
    }

    #[test]
    fn test_message_for_key_gains_ranges() {
        let (sink, emitter) = collecting();
        let view = tagged_view(&emitter);

        view.message(
            literate_config::Message::warning("namespace is deprecated")
                .with_key(vec![PathSegment::from("csharp")]),
        );
        let warnings = sink.on_channel(Channel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].ranges.len(), 1);
        assert_eq!(warnings[0].ranges[0].document, "file:///r/readme.md");
    }

    #[test]
    fn test_views_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Configuration>();
        assert_send_sync::<ConfigurationView>();

        let view = Arc::new(tagged_view(&MessageEmitter::default()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let view = Arc::clone(&view);
                std::thread::spawn(move || view.get_entry("csharp.namespace").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(json!("Contoso.Storage")));
        }
    }
}
