//! The seam between the connection engine and whatever carries the bytes.
//!
//! A [`Transport`] performs one request per call to [`Transport::open`] and
//! reports back through the [`TransportSink`] it was handed. The engine tags
//! every sink with the attempt it belongs to, so callbacks from an attempt
//! that was already abandoned are recognized and dropped.

use tokio::sync::mpsc;

use crate::error::EventSourceError;

/// A single GET request for the event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub with_credentials: bool,
    /// Request headers in send order, names unique.
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    /// Look up a header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status line and headers of a response.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    pub status: http::StatusCode,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: http::HeaderMap,
}

impl ResponseHead {
    /// Build a head from a status and header map, using the canonical reason
    /// phrase as status text.
    pub fn new(status: http::StatusCode, headers: http::HeaderMap) -> Self {
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            headers,
        }
    }
}

/// Callbacks of one attempt, as seen by the engine.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Start(ResponseHead),
    Progress(String),
    Finish(Option<EventSourceError>),
}

/// Where a transport reports what happens to its request.
///
/// The queue behind a sink is bounded, so `start`, `progress` and `finish`
/// wait while the engine is busy; a transport that awaits them reads no
/// faster than listeners consume. `finish` consumes the sink; a sink dropped
/// without finishing reports a plain finish, so every attempt ends exactly
/// once.
#[derive(Debug)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
    finished: bool,
}

impl TransportSink {
    pub(crate) fn new(generation: u64, tx: mpsc::Sender<(u64, TransportEvent)>) -> Self {
        Self {
            generation,
            tx,
            finished: false,
        }
    }

    /// The attempt this sink reports for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The response head arrived.
    pub async fn start(&self, head: ResponseHead) {
        self.send(TransportEvent::Start(head)).await;
    }

    /// A piece of decoded body text arrived. Empty text is ignored.
    pub async fn progress(&self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.send(TransportEvent::Progress(text)).await;
        }
    }

    /// The request is over, with the error that ended it if any.
    pub async fn finish(mut self, error: Option<EventSourceError>) {
        self.finished = true;
        self.send(TransportEvent::Finish(error)).await;
    }

    /// Returns `true` once the engine stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, event: TransportEvent) {
        // The engine may be gone already; nothing is waiting for this then.
        let _ = self.tx.send((self.generation, event)).await;
    }
}

impl Drop for TransportSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = (self.generation, TransportEvent::Finish(None));
        if let Err(mpsc::error::TrySendError::Full(message)) = self.tx.try_send(message) {
            // Queue full: hand the finish to a task that waits for room.
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let tx = self.tx.clone();
                runtime.spawn(async move {
                    let _ = tx.send(message).await;
                });
            }
        }
    }
}

/// Cancels an in-flight request. Calling it more than once is harmless.
pub trait AbortHandle: Send {
    fn abort(&self);
}

impl AbortHandle for tokio::task::AbortHandle {
    fn abort(&self) {
        tokio::task::AbortHandle::abort(self);
    }
}

impl AbortHandle for tokio::task::JoinHandle<()> {
    fn abort(&self) {
        tokio::task::JoinHandle::abort(self);
    }
}

/// An [`AbortHandle`] for transports with nothing to cancel.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAbort;

impl AbortHandle for NoopAbort {
    fn abort(&self) {}
}

/// Opens event-stream requests.
///
/// `open` must not block: it starts the request and returns right away.
/// Failures are reported through [`TransportSink::finish`], never returned.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, request: TransportRequest, sink: TransportSink) -> Box<dyn AbortHandle>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn open(&self, request: TransportRequest, sink: TransportSink) -> Box<dyn AbortHandle> {
        (**self).open(request, sink)
    }
}
