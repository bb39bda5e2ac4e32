use std::sync::{Mutex, PoisonError};

use super::{Channel, Message};

/// Receives diagnostics. Sinks are shared between views and threads.
pub trait MessageSink: Send + Sync + std::fmt::Debug {
    fn dispatch(&self, message: Message);

    /// Lets Debug messages through regardless of the view's `debug` key.
    fn debug_enabled(&self) -> bool {
        false
    }

    /// Lets Verbose messages through regardless of the view's `verbose` key.
    fn verbose_enabled(&self) -> bool {
        false
    }
}

/// Keeps every dispatched message in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
    debug: bool,
    verbose: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that asks for Debug and Verbose messages as well.
    pub fn chatty() -> Self {
        Self {
            debug: true,
            verbose: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn on_channel(&self, channel: Channel) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }
}

impl MessageSink for CollectingSink {
    fn dispatch(&self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn debug_enabled(&self) -> bool {
        self.debug
    }

    fn verbose_enabled(&self) -> bool {
        self.verbose
    }
}

/// Forwards messages to `tracing` events.
///
/// Debug messages pass whenever the subscriber enables DEBUG. Verbose messages
/// still need the view's `verbose` key.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn dispatch(&self, message: Message) {
        let source = message
            .sources
            .first()
            .map(|s| format!("{}:{}:{}", s.document, s.line, s.column))
            .unwrap_or_default();
        match message.channel {
            Channel::Debug => tracing::debug!(%source, "{}", message.text),
            Channel::Verbose | Channel::Information => tracing::info!(%source, "{}", message.text),
            Channel::Warning => tracing::warn!(%source, "{}", message.text),
            Channel::Error | Channel::Fatal => tracing::error!(%source, channel = %message.channel, "{}", message.text),
        }
    }

    fn debug_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::DEBUG)
    }
}
