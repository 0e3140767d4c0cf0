//! [`Stream`] that converts a stream of decoded text chunks into
//! [`MessageEvent`]s.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};
use std::collections::VecDeque;

use futures_core::Stream;

use super::{
    assembler::{EventParser, ParseOutput},
    errors::EventStreamError,
    event::MessageEvent,
};

pin_project_lite::pin_project! {
    /// A [`Stream`] that parses text chunks into SSE [`MessageEvent`]s.
    ///
    /// This is the parser without any connection management: no reconnects,
    /// no heartbeat. `retry:` and `heartbeatTimeout:` hints are remembered
    /// and exposed through [`retry`](Self::retry) and
    /// [`heartbeat_timeout`](Self::heartbeat_timeout).
    #[derive(Debug)]
    pub struct EventStream<S> {
        #[pin]
        stream: S,
        parser: EventParser,
        ready: VecDeque<MessageEvent>,
        retry: Option<Duration>,
        heartbeat_timeout: Option<Duration>,
        terminated: bool,
    }
}

impl<S> EventStream<S> {
    /// Create a new [`EventStream`] from an underlying text stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            parser: EventParser::new(),
            ready: VecDeque::new(),
            retry: None,
            heartbeat_timeout: None,
            terminated: false,
        }
    }

    /// Set the last event ID (useful for resumability).
    pub fn set_last_event_id(&mut self, id: impl Into<String>) {
        self.parser.set_last_event_id(id);
    }

    /// The last event ID committed by the stream.
    pub fn last_event_id(&self) -> &str {
        self.parser.last_event_id()
    }

    /// The most recent `retry:` hint, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// The most recent `heartbeatTimeout:` hint, if any.
    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat_timeout
    }
}

impl<S, E, B> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<str>,
{
    type Item = Result<MessageEvent, EventStreamError<E>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<<Self as Stream>::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if *this.terminated {
                return Poll::Ready(None);
            }

            let chunk = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Poll::Ready(Some(Err(EventStreamError::Transport(e)))),
                None => {
                    // A record without its blank line is never dispatched.
                    *this.terminated = true;
                    continue;
                }
            };

            for output in this.parser.feed_all(chunk.as_ref()) {
                match output {
                    ParseOutput::Event(event) => this.ready.push_back(event),
                    ParseOutput::Retry(retry) => *this.retry = Some(retry),
                    ParseOutput::HeartbeatTimeout(window) => {
                        *this.heartbeat_timeout = Some(window);
                    }
                }
            }
        }
    }
}
