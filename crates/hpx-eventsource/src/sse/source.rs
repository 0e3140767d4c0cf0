//! The public client: [`EventSource`] and its builder.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::{
    config::EventSourceConfig,
    connection::{Command, Engine, Shared},
    listeners::{Listener, ListenerId},
    types::{ReadyState, SseEvent},
};
use crate::{
    error::{EventSourceError, EventSourceResult},
    transport::Transport,
};

// ---------------------------------------------------------------------------
// EventSource
// ---------------------------------------------------------------------------

/// A reconnecting Server-Sent Events client.
///
/// Connecting starts a background task that opens the stream, dispatches
/// events to registered listeners and reconnects after every failure until
/// [`close`](Self::close) is called or the client is dropped.
///
/// ```no_run
/// # async fn demo() -> hpx_eventsource::EventSourceResult<()> {
/// use hpx_eventsource::{EventSource, EventSourceConfig, HttpTransport};
///
/// let source = EventSource::builder(EventSourceConfig::new("https://example.com/events"))
///     .transport(HttpTransport::new()?)
///     .on_message(|event| {
///         if let Some(message) = event.as_message() {
///             println!("{}", message.data);
///         }
///     })
///     .connect()?;
/// # drop(source);
/// # Ok(())
/// # }
/// ```
pub struct EventSource {
    config: Arc<EventSourceConfig>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("url", &self.config.url)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl EventSource {
    /// Start a client for `config` over `transport`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or no runtime is
    /// available.
    pub fn connect(
        config: EventSourceConfig,
        transport: impl Transport,
    ) -> EventSourceResult<Self> {
        Self::builder(config).transport(transport).connect()
    }

    /// Start a client for `url` over HTTP with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the HTTP client cannot be
    /// built or no runtime is available.
    #[cfg(feature = "http")]
    pub fn new(url: impl Into<String>) -> EventSourceResult<Self> {
        Self::builder(EventSourceConfig::new(url)).connect()
    }

    /// Configure listeners before the first connection attempt.
    pub fn builder(config: EventSourceConfig) -> EventSourceBuilder {
        EventSourceBuilder::new(config)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }

    pub fn with_credentials(&self) -> bool {
        self.config.with_credentials
    }

    /// Extra request headers sent with every attempt.
    pub fn headers(&self) -> &[(String, String)] {
        &self.config.headers
    }

    pub fn config(&self) -> &EventSourceConfig {
        &self.config
    }

    /// Stop the client for good. Calling it again does nothing.
    ///
    /// The ready state is [`Closed`](ReadyState::Closed) as soon as this
    /// returns; no event is dispatched and no request is opened afterwards,
    /// except for listeners of the event being dispatched right now.
    pub fn close(&self) {
        close(&self.shared, &self.commands);
    }

    /// A cloneable handle that can close this client, e.g. from a listener.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle::new(&self.shared, &self.commands)
    }

    /// Register `listener` for events of `event_type`.
    pub fn add_event_listener(
        &self,
        event_type: impl Into<String>,
        listener: impl Fn(&SseEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.listeners.add_event_listener(event_type, listener)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove_event_listener(id)
    }

    pub fn set_on_open(&self, listener: Option<Listener>) {
        self.shared.listeners.set_on_open(listener);
    }

    pub fn set_on_message(&self, listener: Option<Listener>) {
        self.shared.listeners.set_on_message(listener);
    }

    pub fn set_on_error(&self, listener: Option<Listener>) {
        self.shared.listeners.set_on_error(listener);
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn close(shared: &Shared, commands: &mpsc::UnboundedSender<Command>) {
    if shared.mark_closed() {
        debug!("EventSource close requested");
        // The engine may have exited already.
        let _ = commands.send(Command::Close);
    }
}

// ---------------------------------------------------------------------------
// CloseHandle
// ---------------------------------------------------------------------------

/// Closes an [`EventSource`] without borrowing it.
///
/// Holding a handle does not keep the client alive.
#[derive(Clone, Debug)]
pub struct CloseHandle {
    shared: Weak<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl CloseHandle {
    fn new(shared: &Arc<Shared>, commands: &mpsc::UnboundedSender<Command>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            commands: commands.clone(),
        }
    }

    /// Same as [`EventSource::close`].
    pub fn close(&self) {
        if let Some(shared) = self.shared.upgrade() {
            close(&shared, &self.commands);
        }
    }

    /// The client's ready state; [`Closed`](ReadyState::Closed) once it is
    /// gone.
    pub fn ready_state(&self) -> ReadyState {
        self.shared
            .upgrade()
            .map_or(ReadyState::Closed, |shared| shared.ready_state())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`EventSource`], obtained from [`EventSource::builder`].
///
/// Listeners added here are in place before the first request is sent.
pub struct EventSourceBuilder {
    config: EventSourceConfig,
    transport: Option<Arc<dyn Transport>>,
    shared: Arc<Shared>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl std::fmt::Debug for EventSourceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourceBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl EventSourceBuilder {
    fn new(config: EventSourceConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport: None,
            shared: Arc::new(Shared::default()),
            commands_tx,
            commands_rx,
        }
    }

    /// Use `transport` instead of the default HTTP transport.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    #[must_use]
    pub fn on_open(self, listener: impl Fn(&SseEvent) + Send + Sync + 'static) -> Self {
        self.shared.listeners.set_on_open(Some(Arc::new(listener)));
        self
    }

    #[must_use]
    pub fn on_message(self, listener: impl Fn(&SseEvent) + Send + Sync + 'static) -> Self {
        self.shared.listeners.set_on_message(Some(Arc::new(listener)));
        self
    }

    #[must_use]
    pub fn on_error(self, listener: impl Fn(&SseEvent) + Send + Sync + 'static) -> Self {
        self.shared.listeners.set_on_error(Some(Arc::new(listener)));
        self
    }

    /// Register a listener for `event_type`.
    #[must_use]
    pub fn listener(
        self,
        event_type: impl Into<String>,
        listener: impl Fn(&SseEvent) + Send + Sync + 'static,
    ) -> Self {
        self.shared.listeners.add_event_listener(event_type, listener);
        self
    }

    /// A handle that can close the client this builder starts.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle::new(&self.shared, &self.commands_tx)
    }

    /// Validate the configuration and start the client.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails, no transport is
    /// available or this is not called from within a tokio runtime.
    pub fn connect(self) -> EventSourceResult<EventSource> {
        let Self {
            config,
            transport,
            shared,
            commands_tx,
            commands_rx,
        } = self;

        config.validate().map_err(EventSourceError::config)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            EventSourceError::config(format!("EventSource needs a tokio runtime: {e}"))
        })?;
        let transport = match transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let config = Arc::new(config);
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let engine = Engine::new(
            Arc::clone(&config),
            transport,
            Arc::clone(&shared),
            events_tx,
        );
        runtime.spawn(engine.run(commands_rx, events_rx));

        Ok(EventSource {
            config,
            shared,
            commands: commands_tx,
        })
    }
}

#[cfg(feature = "http")]
fn default_transport() -> EventSourceResult<Arc<dyn Transport>> {
    Ok(Arc::new(crate::http::HttpTransport::new()?))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> EventSourceResult<Arc<dyn Transport>> {
    Err(EventSourceError::config(
        "No transport configured and the `http` feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AbortHandle, NoopAbort, TransportRequest, TransportSink};

    struct SilentTransport;

    impl Transport for SilentTransport {
        fn open(&self, _request: TransportRequest, sink: TransportSink) -> Box<dyn AbortHandle> {
            // Keep the attempt pending forever.
            std::mem::forget(sink);
            Box::new(NoopAbort)
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let err = EventSource::connect(EventSourceConfig::new("not a url"), SilentTransport)
            .expect_err("invalid url");
        assert!(matches!(err, EventSourceError::Config { .. }));
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let err = EventSource::connect(
            EventSourceConfig::new("http://localhost/events"),
            SilentTransport,
        )
        .expect_err("no runtime");
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[tokio::test]
    async fn test_accessors_and_close() {
        let config = EventSourceConfig::new("http://localhost/events")
            .with_credentials(true)
            .header("X-Token", "abc");
        let source = EventSource::connect(config, SilentTransport).expect("connect");

        assert_eq!(source.url(), "http://localhost/events");
        assert!(source.with_credentials());
        assert_eq!(source.headers(), &[("X-Token".to_string(), "abc".to_string())]);
        assert_eq!(source.ready_state(), ReadyState::Connecting);

        let handle = source.close_handle();
        source.close();
        assert_eq!(source.ready_state(), ReadyState::Closed);
        source.close();
        handle.close();
        assert_eq!(handle.ready_state(), ReadyState::Closed);

        drop(source);
        assert_eq!(handle.ready_state(), ReadyState::Closed);
    }
}
