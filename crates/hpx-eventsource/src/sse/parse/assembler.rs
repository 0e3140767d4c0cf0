//! Event assembly on top of the line tokenizer.

use std::{ops::ControlFlow, time::Duration};

use super::{
    constants::MESSAGE_TYPE,
    event::MessageEvent,
    parser::{FieldName, Line, LineTokenizer},
};
use crate::reconnect::parse_duration_ms;

/// Everything the parser reports, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutput {
    /// A complete record with data.
    Event(MessageEvent),
    /// A valid `retry:` field (already clamped).
    Retry(Duration),
    /// A valid `heartbeatTimeout:` field (already clamped).
    HeartbeatTimeout(Duration),
}

/// Fields collected since the last blank line.
#[derive(Debug, Clone, Default)]
struct PendingEvent {
    /// One `"\n" + value` per `data` field.
    data: String,
    event_type: String,
    /// `Some` once an `id` field was seen, even an empty one.
    id: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct EventAssembler {
    pending: PendingEvent,
    last_event_id: String,
}

impl EventAssembler {
    fn apply(&mut self, line: Line<'_>) -> Option<ParseOutput> {
        match line {
            Line::Blank => self.dispatch(),
            Line::Field { name, value } => match name {
                FieldName::Data => {
                    self.pending.data.push('\n');
                    self.pending.data.push_str(value);
                    None
                }
                FieldName::Id => {
                    self.pending.id = Some(value.to_string());
                    None
                }
                FieldName::Event => {
                    self.pending.event_type = value.to_string();
                    None
                }
                FieldName::Retry => parse_duration_ms(value).map(ParseOutput::Retry),
                FieldName::HeartbeatTimeout => {
                    parse_duration_ms(value).map(ParseOutput::HeartbeatTimeout)
                }
                FieldName::Ignored => None,
            },
        }
    }

    fn dispatch(&mut self) -> Option<ParseOutput> {
        let PendingEvent {
            data,
            event_type,
            id,
        } = std::mem::take(&mut self.pending);

        // The id sticks even when the record is discarded below.
        if let Some(id) = id {
            self.last_event_id = id;
        }

        // `data` always starts with the separator when non-empty.
        let data = data.strip_prefix('\n')?;

        let event_type = if event_type.is_empty() {
            MESSAGE_TYPE.to_string()
        } else {
            event_type
        };

        Some(ParseOutput::Event(MessageEvent {
            event_type,
            data: data.to_string(),
            last_event_id: self.last_event_id.clone(),
        }))
    }
}

/// Resumable SSE parser: text chunks in, [`ParseOutput`]s out.
///
/// Feeding the same text split at arbitrary points produces the same outputs
/// as feeding it in one piece.
#[derive(Debug, Clone, Default)]
pub struct EventParser {
    tokenizer: LineTokenizer,
    assembler: EventAssembler,
}

impl EventParser {
    /// Create a parser with an empty last event ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `chunk`, passing outputs to `sink` as soon as they complete.
    ///
    /// If `sink` breaks, the rest of the chunk is discarded and the parser
    /// should be [`reset`](Self::reset) before it is fed again.
    pub fn feed(
        &mut self,
        chunk: &str,
        mut sink: impl FnMut(ParseOutput) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let Self {
            tokenizer,
            assembler,
        } = self;
        tokenizer.feed(chunk, |line| match assembler.apply(line) {
            Some(output) => sink(output),
            None => ControlFlow::Continue(()),
        })
    }

    /// Convenience wrapper around [`feed`](Self::feed) collecting every output.
    pub fn feed_all(&mut self, chunk: &str) -> Vec<ParseOutput> {
        let mut outputs = Vec::new();
        let _ = self.feed(chunk, |output| {
            outputs.push(output);
            ControlFlow::Continue(())
        });
        outputs
    }

    /// Start over for a new connection attempt.
    ///
    /// Drops the partial line and the pending record; the last event ID is
    /// kept since it outlives individual attempts.
    pub fn reset(&mut self) {
        self.tokenizer.reset();
        self.assembler.pending = PendingEvent::default();
    }

    /// The ID sent as `Last-Event-ID` on the next attempt.
    pub fn last_event_id(&self) -> &str {
        &self.assembler.last_event_id
    }

    /// Seed the last event ID, e.g. to resume a feed from a known position.
    pub fn set_last_event_id(&mut self, id: impl Into<String>) {
        self.assembler.last_event_id = id.into();
    }
}
