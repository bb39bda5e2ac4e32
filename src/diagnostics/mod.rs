//! Diagnostic messages and the sinks that receive them.

mod sink;

pub use sink::{CollectingSink, MessageSink, TracingSink};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{KeyPath, SourceLocation};

/// Severity or category of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Debug,
    Verbose,
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Verbose => "verbose",
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// A line/column pair. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Span of text a message points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub document: String,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub channel: Channel,
    pub text: String,
    /// Configuration key this message is about; resolved to sources on dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<Range>,
}

impl Message {
    pub fn new(channel: Channel, text: impl Into<String>) -> Self {
        Self {
            channel,
            text: text.into(),
            key: None,
            sources: Vec::new(),
            ranges: Vec::new(),
        }
    }

    pub fn debug(text: impl Into<String>) -> Self {
        Self::new(Channel::Debug, text)
    }

    pub fn verbose(text: impl Into<String>) -> Self {
        Self::new(Channel::Verbose, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Channel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Channel::Error, text)
    }

    /// Attaches the configuration key the message is about.
    pub fn with_key(mut self, key: KeyPath) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.sources.push(source);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.channel, self.text)?;
        if let Some(source) = self.sources.first() {
            write!(f, " ({}:{}:{})", source.document, source.line, source.column)?;
        }
        Ok(())
    }
}
