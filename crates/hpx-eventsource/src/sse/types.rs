//! Core type definitions for dispatched events.

use std::{fmt, sync::Arc};

use super::parse::{
    constants::{ERROR_TYPE, OPEN_TYPE},
    event::MessageEvent,
};
use crate::error::EventSourceError;

/// Public connection state, as reported by
/// [`EventSource::ready_state`](super::EventSource::ready_state).
///
/// A client waiting to reconnect reports [`Connecting`](Self::Connecting).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Connecting, or waiting to reconnect.
    Connecting = 0,
    /// Streaming events.
    Open = 1,
    /// Closed for good.
    Closed = 2,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }

    /// Returns `true` once [`close`](super::EventSource::close) was called.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// The response head of an attempt: dispatched as `open` on success and as
/// `error` when the status or content type is rejected.
#[derive(Clone, Debug)]
pub struct ConnectionEvent {
    /// `"open"` or `"error"`.
    pub event_type: &'static str,
    pub status: http::StatusCode,
    pub status_text: String,
    pub headers: http::HeaderMap,
}

/// A connection failure, dispatched as `error`.
#[derive(Clone, Debug, Default)]
pub struct ErrorEvent {
    /// The triggering error; `None` when the server simply ended the response.
    pub error: Option<Arc<EventSourceError>>,
}

/// Everything an [`EventSource`](super::EventSource) dispatches to listeners.
#[derive(Clone, Debug)]
pub enum SseEvent {
    /// `open`, or `error` for a rejected response head.
    Connection(ConnectionEvent),
    /// `message` or a custom event type from the stream.
    Message(MessageEvent),
    /// `error` for a failed attempt.
    Error(ErrorEvent),
}

impl SseEvent {
    pub(crate) fn open(
        status: http::StatusCode,
        status_text: String,
        headers: http::HeaderMap,
    ) -> Self {
        Self::Connection(ConnectionEvent {
            event_type: OPEN_TYPE,
            status,
            status_text,
            headers,
        })
    }

    pub(crate) fn rejected(
        status: http::StatusCode,
        status_text: String,
        headers: http::HeaderMap,
    ) -> Self {
        Self::Connection(ConnectionEvent {
            event_type: ERROR_TYPE,
            status,
            status_text,
            headers,
        })
    }

    pub(crate) fn error(error: Option<EventSourceError>) -> Self {
        Self::Error(ErrorEvent {
            error: error.map(Arc::new),
        })
    }

    /// The name listeners are registered under.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Connection(event) => event.event_type,
            Self::Message(event) => &event.event_type,
            Self::Error(_) => ERROR_TYPE,
        }
    }

    /// The message payload, if this is a message event.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(event) => Some(event),
            _ => None,
        }
    }

    /// The triggering error, if this is a failure with one attached.
    pub fn error_cause(&self) -> Option<&EventSourceError> {
        match self {
            Self::Error(event) => event.error.as_deref(),
            _ => None,
        }
    }
}
