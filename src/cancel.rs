//! Cooperative cancellation for the document-gathering stage.
//!
//! The loader checks the token between documents, never in the middle of one.
//! Merging and resolution run to completion once blocks are gathered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ConfigError;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`ConfigError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.is_cancelled() {
            Err(ConfigError::Cancelled)
        } else {
            Ok(())
        }
    }
}
