//! Filtering and source enrichment for diagnostics sent through a view.

use super::location::SourceLocation;
use super::path::to_dotted;
use super::view::ConfigurationView;
use super::{blame, ConfigError};
use crate::diagnostics::{Channel, Message, Position, Range};

/// Span used for a range when the source length is unknown.
pub const FALLBACK_SPAN: usize = 3;

impl ConfigurationView {
    /// Filters `message` by channel, attaches sources and ranges, and hands
    /// it to the sink.
    ///
    /// Debug messages need the view's `debug` flag or a debug-enabled sink;
    /// Verbose messages likewise with `verbose`. If enrichment fails the
    /// failure is dispatched as an Error message instead.
    pub fn message(&self, message: Message) {
        let sink = self.emitter().sink();
        match message.channel {
            Channel::Debug if !(self.debug_mode() || sink.debug_enabled()) => return,
            Channel::Verbose if !(self.verbose_mode() || sink.verbose_enabled()) => return,
            _ => {}
        }

        match self.enrich(message) {
            Ok(message) => sink.dispatch(message),
            Err(err) => sink.dispatch(Message::error(err.to_string())),
        }
    }

    fn enrich(&self, mut message: Message) -> Result<Message, ConfigError> {
        let mut sources = Vec::with_capacity(message.sources.len());
        for source in &message.sources {
            sources.push(source.decoded()?);
        }

        if let Some(key) = &message.key {
            let found = blame::blame(self.lineage(), key)?;
            if found.is_partial() {
                self.emitter().dispatch(Message::warning(format!(
                    "Could not find the exact path '{}' for '{}'",
                    to_dotted(key),
                    message.text
                )));
            }
            for location in found.locations {
                if !sources.contains(&location) {
                    sources.push(location);
                }
            }
        }

        message.ranges = sources.iter().map(range_of).collect();
        message.sources = sources;
        Ok(message)
    }
}

/// Range starting at `location` and spanning its length, or
/// [`FALLBACK_SPAN`] columns when the length is unknown.
pub fn range_of(location: &SourceLocation) -> Range {
    let start = Position {
        line: location.line,
        column: location.column,
    };
    let end = Position {
        line: location.line,
        column: location.column + location.length.unwrap_or(FALLBACK_SPAN),
    };
    Range {
        document: location.document.clone(),
        start,
        end,
    }
}
