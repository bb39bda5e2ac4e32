use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the literate-config library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl Error {
    /// Process exit status for this error. Logging failures map to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(err) => err.exit_code(),
            Self::Logging(_) => 1,
        }
    }
}
