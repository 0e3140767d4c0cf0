//! Events produced by the parser.

/// A dispatched `message` (or custom-typed) event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageEvent {
    /// The event type (`"message"` unless the record carried `event:`).
    pub event_type: String,
    /// The data payload, lines joined with `\n`.
    pub data: String,
    /// The last event ID in effect when the event was dispatched.
    pub last_event_id: String,
}

impl MessageEvent {
    /// Create a new event.
    pub fn new(
        event_type: impl Into<String>,
        data: impl Into<String>,
        last_event_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            last_event_id: last_event_id.into(),
        }
    }
}
