use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required defaults file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read '{uri}': {source}")]
    ReadError {
        uri: String,
        source: std::io::Error,
    },

    #[error("failed to parse defaults file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("syntax error in '{document}': {message}")]
    Syntax { document: String, message: String },

    #[error("invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("failed to deserialize '{key}': {source}")]
    DeserializeError {
        key: String,
        source: serde_json::Error,
    },

    #[error("recursive reference: {}", chain.join(" -> "))]
    RecursiveReference { chain: Vec<String> },

    #[error("referenced key not found: {0}")]
    UnresolvedReference(String),

    #[error("invalid reference path: {0}")]
    InvalidReferencePath(String),

    #[error("cannot interpolate non-scalar value: {0}")]
    NonScalarReference(String),

    #[error("unclosed reference (missing ')') in '{0}'")]
    UnclosedReference(String),

    #[error("invalid encoded position '{0}'")]
    InvalidPosition(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ConfigError {
    /// Process exit status a command-line host should use for this error.
    ///
    /// | status | errors |
    /// |---|---|
    /// | 2 | malformed configuration content |
    /// | 3 | reference resolution failures |
    /// | 4 | I/O, uri and defaults-file failures |
    /// | 130 | cancellation |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Syntax { .. } | Self::DeserializeError { .. } | Self::InvalidPosition(_) => 2,
            Self::RecursiveReference { .. }
            | Self::UnresolvedReference(_)
            | Self::InvalidReferencePath(_)
            | Self::NonScalarReference(_)
            | Self::UnclosedReference(_) => 3,
            Self::FileNotFound(_)
            | Self::ReadError { .. }
            | Self::ParseError { .. }
            | Self::InvalidUri { .. } => 4,
            Self::Cancelled => 130,
        }
    }
}
