use std::sync::Arc;

use super::block::ConfigurationBlock;
use super::source::BlockSource;
use super::view::ConfigurationView;
use super::ConfigError;
use crate::cancel::CancellationToken;
use crate::context::MessageEmitter;
use crate::diagnostics::Message;
use crate::fs::{ensure_folder_uri, parent_uri, resolve_uri, FileSystem};

/// Preferred configuration document name when several documents qualify.
pub const DEFAULT_CONFIGURATION_FILENAME: &str = "readme.md";

/// Extension of documents that can carry configuration.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// Folder used when no location was configured.
const FALLBACK_FOLDER_URI: &str = "file:///";

/// Document access for a [`Configuration`].
#[derive(Debug, Clone)]
struct Documents {
    file_system: Arc<dyn FileSystem>,
    block_source: Arc<dyn BlockSource>,
}

/// Builder for a [`Configuration`].
///
/// ## Example
///
/// ```
/// use literate_config::{CollectingSink, Configuration, ConfigurationBlock, MessageEmitter};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let config = Configuration::builder("\n> see https://aka.ms/autorest")
///     .with_defaults(ConfigurationBlock::synthetic("defaults", json!({"input-file": []}))?)
///     .build();
///
/// let emitter = MessageEmitter::new(Arc::new(CollectingSink::new()));
/// let overrides = ConfigurationBlock::synthetic("override", json!({"input-file": ["a.json"]}))?;
/// let view = config.create_view(&emitter, true, vec![overrides])?;
/// assert_eq!(view.get_entry("input-file")?, Some(json!(["a.json"])));
/// # Ok::<(), literate_config::ConfigError>(())
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigurationBuilder {
    magic_marker: String,
    documents: Option<Documents>,
    location: Option<String>,
    defaults: Vec<ConfigurationBlock>,
    default_filename: String,
    walk_up_folders: bool,
}

impl ConfigurationBuilder {
    /// Reads configuration documents through `file_system`, parsing them
    /// with `block_source`.
    pub fn with_documents(
        mut self,
        file_system: Arc<dyn FileSystem>,
        block_source: Arc<dyn BlockSource>,
    ) -> Self {
        self.documents = Some(Documents {
            file_system,
            block_source,
        });
        self
    }

    /// URI of the configuration document, or of a folder to search for one.
    pub fn with_location(mut self, uri: impl Into<String>) -> Self {
        self.location = Some(uri.into());
        self
    }

    /// Adds a defaults block. Defaults are applied in registration order,
    /// earlier ones taking priority.
    pub fn with_defaults(mut self, block: ConfigurationBlock) -> Self {
        self.defaults.push(block);
        self
    }

    pub fn with_default_filename(mut self, filename: impl Into<String>) -> Self {
        self.default_filename = filename.into();
        self
    }

    /// Also search parent folders when the given folder holds no document.
    pub fn walk_up_folders(mut self, walk_up: bool) -> Self {
        self.walk_up_folders = walk_up;
        self
    }

    pub fn build(self) -> Configuration {
        Configuration {
            magic_marker: self.magic_marker,
            documents: self.documents,
            location: self.location,
            defaults: self.defaults,
            default_filename: self.default_filename.to_lowercase(),
            walk_up_folders: self.walk_up_folders,
        }
    }
}

/// Produces [`ConfigurationView`]s from overrides, a literate configuration
/// document and defaults.
///
/// Priority, highest first:
/// 1. override blocks passed to [`create_view`](Self::create_view)
/// 2. blocks of the configuration document, in document order
/// 3. defaults, when requested
#[derive(Debug)]
pub struct Configuration {
    magic_marker: String,
    documents: Option<Documents>,
    location: Option<String>,
    defaults: Vec<ConfigurationBlock>,
    default_filename: String,
    walk_up_folders: bool,
}

impl Configuration {
    /// Creates a builder. Documents qualify as configuration when they
    /// contain `magic_marker`.
    pub fn builder(magic_marker: impl Into<String>) -> ConfigurationBuilder {
        ConfigurationBuilder {
            magic_marker: magic_marker.into(),
            documents: None,
            location: None,
            defaults: Vec::new(),
            default_filename: DEFAULT_CONFIGURATION_FILENAME.to_string(),
            walk_up_folders: false,
        }
    }

    /// Gathers blocks and merges them into a view.
    ///
    /// Cancellation is honoured between documents. A document block that is
    /// not a mapping aborts with [`ConfigError::Syntax`] after an Error
    /// message pointing at the block.
    pub fn create_view(
        &self,
        emitter: &MessageEmitter,
        include_defaults: bool,
        overrides: Vec<ConfigurationBlock>,
    ) -> Result<ConfigurationView, ConfigError> {
        let cancellation = emitter.cancellation();
        cancellation.check()?;

        let config_file_uri = self.detect_configuration_file(cancellation)?;
        let folder_uri = match &config_file_uri {
            Some(uri) => resolve_uri(uri, "./")?,
            None => self
                .location
                .clone()
                .unwrap_or_else(|| FALLBACK_FOLDER_URI.to_string()),
        };

        let mut blocks = overrides;

        if let (Some(uri), Some(documents)) = (&config_file_uri, &self.documents) {
            cancellation.check()?;
            let document_blocks = self.read_document(documents, uri, emitter)?;
            tracing::debug!(document = %uri, blocks = document_blocks.len(), "configuration document parsed");
            blocks.extend(document_blocks);
        }

        if include_defaults {
            blocks.extend(self.defaults.iter().cloned());
        }

        ConfigurationView::new(emitter.clone(), folder_uri, blocks)
    }

    fn read_document(
        &self,
        documents: &Documents,
        uri: &str,
        emitter: &MessageEmitter,
    ) -> Result<Vec<ConfigurationBlock>, ConfigError> {
        let content = documents.file_system.read_file(uri)?;
        let code_blocks = documents.block_source.parse(uri, &content)?;

        let mut blocks = Vec::with_capacity(code_blocks.len());
        for code_block in code_blocks {
            let location = code_block.location.clone();
            match code_block.into_block() {
                Ok(block) => blocks.push(block),
                Err(err @ ConfigError::Syntax { .. }) => {
                    // points at the first line of the block's content
                    emitter.dispatch(
                        Message::error("Syntax error: Invalid YAML object.").with_source(location),
                    );
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(blocks)
    }

    /// Finds the configuration document for the configured location.
    ///
    /// A location ending in `.md` is taken as-is. Otherwise the folder's
    /// documents are searched for the magic marker, preferring the default
    /// filename and then the shortest URI; with
    /// [`walk_up_folders`](ConfigurationBuilder::walk_up_folders) the search
    /// continues in parent folders.
    pub fn detect_configuration_file(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Option<String>, ConfigError> {
        let (Some(location), Some(documents)) = (&self.location, &self.documents) else {
            return Ok(None);
        };
        if location.ends_with(DOCUMENT_EXTENSION) {
            return Ok(Some(location.clone()));
        }

        let file_system = &documents.file_system;
        let mut folder = Some(ensure_folder_uri(location));
        while let Some(current) = folder {
            let mut found = Vec::new();
            for uri in file_system.enumerate_file_uris(&current)? {
                if !uri.ends_with(DOCUMENT_EXTENSION) {
                    continue;
                }
                cancellation.check()?;
                if file_system.read_file(&uri)?.contains(&self.magic_marker) {
                    found.push(uri);
                }
            }

            let preferred_suffix = format!("/{}", self.default_filename);
            let chosen = found
                .iter()
                .find(|uri| uri.to_lowercase().ends_with(&preferred_suffix))
                .or_else(|| found.iter().min_by_key(|uri| uri.len()));
            if let Some(uri) = chosen {
                tracing::debug!(document = %uri, candidates = found.len(), "configuration document found");
                return Ok(Some(uri.clone()));
            }

            folder = if self.walk_up_folders {
                parent_uri(&current)?
            } else {
                None
            };
        }

        tracing::debug!(%location, "no configuration document found");
        Ok(None)
    }
}
