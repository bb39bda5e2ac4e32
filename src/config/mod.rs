//! Literate configuration: blocks, guards, merging, references and blame.

mod blame;
mod block;
mod builder;
mod env;
mod error;
mod file;
mod gateway;
mod guard;
mod location;
mod merge;
mod path;
mod resolve;
mod source;
mod view;

pub use blame::{blame, BlameResult, BlameTree, Fragment};
pub use block::{BlockOrigin, ConfigurationBlock, GUARD_KEY};
pub use builder::{
    Configuration, ConfigurationBuilder, DEFAULT_CONFIGURATION_FILENAME, DOCUMENT_EXTENSION,
};
pub use env::{EnvSource, ENV_BLOCK_LABEL};
pub use error::ConfigError;
pub use file::{load_defaults_file, DefaultsFile};
pub use gateway::{range_of, FALLBACK_SPAN};
pub use guard::{evaluate_guard, guard_from_fence_info, GuardError, MAX_GUARD_DEPTH};
pub use location::{
    decode_enhanced_position, encode_enhanced_position, EnhancedPosition, SourceLocation,
};
pub use merge::{deep_merge, fold_layers, strip_markers, Candidate, Folded, Layer, REPLACE_MARKER};
pub use path::{lookup, parse_dotted, to_dotted, KeyPath, PathSegment};
pub use resolve::{Resolver, MAX_REFERENCE_DEPTH};
pub use source::{insert_at_path, BlockSource, CodeBlock};
pub use view::{ConfigurationView, UseExtension, USE_EXTENSION_KEY};
