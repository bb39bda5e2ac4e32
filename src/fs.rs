//! URI-addressed file access used to locate and read configuration documents.

use std::collections::BTreeMap;
use std::path::Path;

use url::Url;

use crate::config::ConfigError;

/// Read-only file access by URI.
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// URIs of the files directly inside `folder_uri`.
    fn enumerate_file_uris(&self, folder_uri: &str) -> Result<Vec<String>, ConfigError>;

    fn read_file(&self, uri: &str) -> Result<String, ConfigError>;
}

fn parse(uri: &str) -> Result<Url, ConfigError> {
    Url::parse(uri).map_err(|e| ConfigError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Resolves `relative` against `base`, like a browser resolving a link.
pub fn resolve_uri(base: &str, relative: &str) -> Result<String, ConfigError> {
    parse(base)?
        .join(relative)
        .map(String::from)
        .map_err(|e| ConfigError::InvalidUri {
            uri: relative.to_string(),
            reason: e.to_string(),
        })
}

/// Appends the trailing slash that marks a URI as a folder.
pub fn ensure_folder_uri(uri: &str) -> String {
    if uri.ends_with('/') {
        uri.to_string()
    } else {
        format!("{uri}/")
    }
}

/// Parent folder of `folder_uri`, or `None` at the root.
pub fn parent_uri(folder_uri: &str) -> Result<Option<String>, ConfigError> {
    let folder = ensure_folder_uri(folder_uri);
    let parent = resolve_uri(&folder, "..")?;
    Ok((parent != folder).then_some(parent))
}

/// `file://` URI for a local path.
pub fn file_uri(path: &Path) -> Result<String, ConfigError> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| ConfigError::InvalidUri {
            uri: path.display().to_string(),
            reason: "not an absolute path".to_string(),
        })
}

/// `file://` URI for a local folder, with its trailing slash.
pub fn folder_uri(path: &Path) -> Result<String, ConfigError> {
    Url::from_directory_path(path)
        .map(String::from)
        .map_err(|()| ConfigError::InvalidUri {
            uri: path.display().to_string(),
            reason: "not an absolute path".to_string(),
        })
}

/// Files held in memory, keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<String, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, uri: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(uri.into(), content.into());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn enumerate_file_uris(&self, folder_uri: &str) -> Result<Vec<String>, ConfigError> {
        let folder = ensure_folder_uri(folder_uri);
        Ok(self
            .files
            .keys()
            .filter(|uri| {
                uri.strip_prefix(&folder)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }

    fn read_file(&self, uri: &str) -> Result<String, ConfigError> {
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| ConfigError::ReadError {
                uri: uri.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }
}

/// The local disk, through `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileSystem;

impl DiskFileSystem {
    fn to_path(uri: &str) -> Result<std::path::PathBuf, ConfigError> {
        parse(uri)?
            .to_file_path()
            .map_err(|()| ConfigError::InvalidUri {
                uri: uri.to_string(),
                reason: "not a file uri".to_string(),
            })
    }
}

impl FileSystem for DiskFileSystem {
    fn enumerate_file_uris(&self, folder_uri: &str) -> Result<Vec<String>, ConfigError> {
        let folder = Self::to_path(&ensure_folder_uri(folder_uri))?;
        let entries = match std::fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ConfigError::ReadError {
                    uri: folder_uri.to_string(),
                    source: e,
                })
            }
        };

        let mut uris = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::ReadError {
                uri: folder_uri.to_string(),
                source: e,
            })?;
            if entry.path().is_file() {
                uris.push(file_uri(&entry.path())?);
            }
        }
        uris.sort();
        Ok(uris)
    }

    fn read_file(&self, uri: &str) -> Result<String, ConfigError> {
        let path = Self::to_path(uri)?;
        std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            uri: uri.to_string(),
            source: e,
        })
    }
}
