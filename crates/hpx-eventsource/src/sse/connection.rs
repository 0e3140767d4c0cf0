//! Connection driver: the state machine behind [`EventSource`](super::EventSource).
//!
//! One tokio task owns an [`Engine`] and feeds it facade commands, transport
//! callbacks and its two deadlines (reconnect and heartbeat). Nothing else
//! touches engine state, so it needs no locking. Callbacks carry the
//! generation of the attempt they belong to; anything from an earlier
//! attempt, or arriving while no attempt is live, is dropped.

use std::{
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tracing::{debug, error, info, warn};

use super::{
    config::EventSourceConfig,
    listeners::Listeners,
    parse::{EventParser, ParseOutput},
    types::{ReadyState, SseEvent},
};
use crate::{
    error::EventSourceError,
    heartbeat::{AttemptPhase, StallCheck, StallMonitor},
    reconnect::{RetryPolicy, apply_jitter},
    transport::{
        AbortHandle, ResponseHead, Transport, TransportEvent, TransportRequest, TransportSink,
    },
};

const EVENT_STREAM: &str = "text/event-stream";
const ACCEPT: &str = "Accept";
const LAST_EVENT_ID: &str = "Last-Event-ID";

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Engine states. Only the engine task changes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// Between attempts, reconnect deadline armed.
    Waiting,
    /// Request sent, waiting for the response head.
    Connecting,
    /// Streaming events.
    Open,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    fn ready_state(self) -> ReadyState {
        match self {
            Self::Waiting | Self::Connecting => ReadyState::Connecting,
            Self::Open => ReadyState::Open,
            Self::Closed => ReadyState::Closed,
        }
    }
}

/// Control commands sent from the facade to the engine task.
#[derive(Debug)]
pub(crate) enum Command {
    Close,
}

/// State shared between the facade and the engine task.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    ready_state: AtomicU8,
    pub(crate) listeners: Listeners,
}

impl Shared {
    pub(crate) fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::Acquire))
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.ready_state().is_closed()
    }

    /// Mark the client closed. Returns `false` if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        let previous = self.ready_state.swap(ReadyState::Closed as u8, Ordering::AcqRel);
        previous != ReadyState::Closed as u8
    }

    /// Publish a new state unless the client was closed in the meantime.
    fn publish(&self, state: ReadyState) {
        let _ = self
            .ready_state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ReadyState::Closed as u8).then_some(state as u8)
            });
    }
}

/// Matches `^text/event-stream(;.*)?$`, ignoring ASCII case.
pub(crate) fn is_event_stream(content_type: &str) -> bool {
    match content_type.get(..EVENT_STREAM.len()) {
        Some(essence) if essence.eq_ignore_ascii_case(EVENT_STREAM) => {
            let rest = &content_type[EVENT_STREAM.len()..];
            rest.is_empty() || rest.starts_with(';')
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub(crate) struct Engine {
    config: Arc<EventSourceConfig>,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    state: ConnectionState,
    generation: u64,
    parser: EventParser,
    retry: RetryPolicy,
    monitor: StallMonitor,
    abort: Option<Box<dyn AbortHandle>>,
    reconnect_at: Option<Instant>,
    heartbeat_at: Option<Instant>,
    events_tx: mpsc::Sender<(u64, TransportEvent)>,
}

impl Engine {
    pub(crate) fn new(
        config: Arc<EventSourceConfig>,
        transport: Arc<dyn Transport>,
        shared: Arc<Shared>,
        events_tx: mpsc::Sender<(u64, TransportEvent)>,
    ) -> Self {
        Self {
            retry: RetryPolicy::new(config.initial_retry),
            monitor: StallMonitor::new(config.heartbeat_timeout),
            config,
            transport,
            shared,
            state: ConnectionState::Waiting,
            generation: 0,
            parser: EventParser::new(),
            abort: None,
            reconnect_at: None,
            heartbeat_at: None,
            events_tx,
        }
    }

    /// Drive the client until it is closed.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::Receiver<(u64, TransportEvent)>,
    ) {
        if self.shared.is_closed() {
            self.close();
            return;
        }
        self.connect();

        while self.state != ConnectionState::Closed {
            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(Command::Close) => {
                        info!(url = %self.config.url, "EventSource closing (requested)");
                        self.close();
                    }
                    None => {
                        info!(url = %self.config.url, "EventSource dropped, shutting down");
                        self.close();
                    }
                },

                Some((generation, event)) = events.recv() => {
                    self.on_transport_event(generation, event);
                }

                () = sleep_or_pending(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect();
                }

                () = sleep_or_pending(self.heartbeat_at) => {
                    self.on_heartbeat();
                }
            }
        }
    }

    fn connect(&mut self) {
        self.reconnect_at = None;
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);
        self.parser.reset();
        self.monitor.begin_attempt();
        self.heartbeat_at = Some(Instant::now() + self.monitor.window());

        let request = self.build_request();
        let sink = TransportSink::new(self.generation, self.events_tx.clone());
        info!(url = %self.config.url, generation = self.generation, "EventSource connecting");
        self.abort = Some(self.transport.open(request, sink));
    }

    fn build_request(&self) -> TransportRequest {
        let mut headers = vec![(ACCEPT.to_string(), EVENT_STREAM.to_string())];
        let last_event_id = self.parser.last_event_id();
        if !last_event_id.is_empty() {
            headers.push((LAST_EVENT_ID.to_string(), last_event_id.to_string()));
        }
        for (name, value) in &self.config.headers {
            match headers
                .iter_mut()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            {
                Some((_, slot)) => *slot = value.clone(),
                None => headers.push((name.clone(), value.clone())),
            }
        }

        TransportRequest {
            url: self.config.url.clone(),
            with_credentials: self.config.with_credentials,
            headers,
        }
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        // `close()` may have been called while this event sat in the queue.
        if self.shared.is_closed() {
            self.close();
            return;
        }
        if generation != self.generation || !self.state.is_live() {
            debug!(
                generation,
                current = self.generation,
                state = ?self.state,
                "Discarding stale transport callback"
            );
            return;
        }

        match event {
            TransportEvent::Start(head) => self.on_start(head),
            TransportEvent::Progress(text) => self.on_progress(&text),
            TransportEvent::Finish(error) => self.on_finish(error),
        }
    }

    fn on_start(&mut self, head: ResponseHead) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        let ResponseHead {
            status,
            status_text,
            content_type,
            headers,
        } = head;

        let accepted = status == http::StatusCode::OK
            && content_type.as_deref().is_some_and(is_event_stream);
        if accepted {
            self.set_state(ConnectionState::Open);
            self.monitor.record_activity(Instant::now(), 0);
            self.retry.reset();
            info!(
                url = %self.config.url,
                generation = self.generation,
                "EventSource connection established"
            );
            self.dispatch(SseEvent::open(status, status_text, headers));
            return;
        }

        let err = if status != http::StatusCode::OK {
            EventSourceError::invalid_status(status, &status_text)
        } else {
            EventSourceError::invalid_content_type(content_type.as_deref())
        };
        error!(
            url = %self.config.url,
            status = status.as_u16(),
            error = %err,
            "EventSource response rejected"
        );
        self.schedule_reconnect();
        self.dispatch(SseEvent::rejected(status, status_text, headers));
    }

    fn on_progress(&mut self, text: &str) {
        if self.state != ConnectionState::Open {
            return;
        }
        self.monitor
            .record_activity(Instant::now(), text.chars().count());

        let Self {
            parser,
            shared,
            retry,
            monitor,
            heartbeat_at,
            ..
        } = self;
        let flow = parser.feed(text, |output| {
            match output {
                ParseOutput::Event(event) => {
                    if shared.is_closed() {
                        return ControlFlow::Break(());
                    }
                    shared.listeners.dispatch(&SseEvent::Message(event));
                    if shared.is_closed() {
                        return ControlFlow::Break(());
                    }
                }
                ParseOutput::Retry(delay) => {
                    debug!(retry_ms = delay.as_millis() as u64, "Server set retry interval");
                    retry.set_server_hint(delay);
                }
                ParseOutput::HeartbeatTimeout(window) => {
                    debug!(window_ms = window.as_millis() as u64, "Server set heartbeat timeout");
                    monitor.set_window(window);
                    if heartbeat_at.is_some() {
                        *heartbeat_at = Some(Instant::now() + monitor.window());
                    }
                }
            }
            ControlFlow::Continue(())
        });

        if flow.is_break() {
            self.close();
        }
    }

    fn on_finish(&mut self, error: Option<EventSourceError>) {
        // The request is already over; nothing left to abort.
        self.abort = None;
        match &error {
            Some(err) => {
                error!(url = %self.config.url, error = %err, "EventSource connection failed");
            }
            None => warn!(url = %self.config.url, "EventSource stream ended"),
        }
        self.schedule_reconnect();
        self.dispatch(SseEvent::error(error));
    }

    fn on_heartbeat(&mut self) {
        self.heartbeat_at = None;
        let phase = match self.state {
            ConnectionState::Connecting => AttemptPhase::AwaitingResponse,
            ConnectionState::Open => AttemptPhase::Streaming,
            ConnectionState::Waiting | ConnectionState::Closed => return,
        };

        let now = Instant::now();
        match self.monitor.check(now, phase) {
            StallCheck::Rearm(next) => self.heartbeat_at = Some(now + next),
            StallCheck::Stalled(err) => {
                warn!(
                    url = %self.config.url,
                    generation = self.generation,
                    error = %err,
                    "EventSource stalled"
                );
                self.schedule_reconnect();
                self.dispatch(SseEvent::error(Some(err)));
            }
        }
    }

    /// Tear down the live attempt and arm the reconnect deadline.
    fn schedule_reconnect(&mut self) {
        self.heartbeat_at = None;
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }

        let delay = apply_jitter(self.retry.next_delay(), self.config.reconnect_jitter);
        self.reconnect_at = Some(Instant::now() + delay);
        self.set_state(ConnectionState::Waiting);
        info!(
            url = %self.config.url,
            delay_ms = delay.as_millis() as u64,
            next_delay_ms = self.retry.current().as_millis() as u64,
            "EventSource reconnecting"
        );
    }

    fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.shared.mark_closed();
        self.state = ConnectionState::Closed;
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
        self.reconnect_at = None;
        self.heartbeat_at = None;
        info!(url = %self.config.url, "EventSource closed");
    }

    fn dispatch(&mut self, event: SseEvent) {
        if !self.shared.is_closed() {
            self.shared.listeners.dispatch(&event);
        }
        if self.shared.is_closed() {
            self.close();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.shared.publish(state.ready_state());
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
