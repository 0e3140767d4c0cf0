//! Error types used by the SSE parser.

use core::fmt::{Display, Formatter};

/// Errors produced by [`EventStream`](super::event_stream::EventStream).
#[derive(Debug, PartialEq)]
pub enum EventStreamError<E> {
    /// Something went wrong with the underlying stream.
    Transport(E),
}

impl<E> Display for EventStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(e) => e.fmt(f),
        }
    }
}

impl<E> core::error::Error for EventStreamError<E> where E: core::error::Error {}
