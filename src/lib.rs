pub mod cancel;
pub mod config;
pub mod context;
pub mod diagnostics;
mod error;
pub mod fs;
pub mod logging;
pub mod tags;

pub use cancel::CancellationToken;
pub use config::{
    BlockSource, CodeBlock, ConfigError, Configuration, ConfigurationBlock, ConfigurationView,
    SourceLocation,
};
pub use context::MessageEmitter;
pub use diagnostics::{Channel, CollectingSink, Message, MessageSink, TracingSink};
pub use error::Error;
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
