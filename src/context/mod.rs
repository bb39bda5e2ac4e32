//! Message emitter shared by a configuration and the views it creates.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::diagnostics::{Message, MessageSink, TracingSink};

/// Bundles the diagnostic sink with the cancellation token for one session.
///
/// Cloning is cheap; clones share the sink and the token.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use literate_config::{CollectingSink, MessageEmitter};
///
/// let sink = Arc::new(CollectingSink::new());
/// let emitter = MessageEmitter::new(sink.clone());
/// emitter.cancellation().cancel();
/// assert!(emitter.cancellation().is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct MessageEmitter {
    sink: Arc<dyn MessageSink>,
    cancellation: CancellationToken,
}

impl MessageEmitter {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses an existing token, e.g. one wired to a signal handler.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Sends a message straight to the sink, bypassing any view's filtering.
    pub fn dispatch(&self, message: Message) {
        self.sink.dispatch(message);
    }
}

impl Default for MessageEmitter {
    /// An emitter that forwards to `tracing`.
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
