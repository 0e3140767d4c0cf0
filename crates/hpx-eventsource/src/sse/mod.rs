//! Server-Sent Events client.
//!
//! - **Incremental parsing**: [`parse::EventParser`] resumes across arbitrary
//!   chunk boundaries, including a CRLF split between two chunks.
//! - **Auto-reconnection**: failed attempts are retried with a doubling
//!   delay, reset on every successful open and overridable by the server's
//!   `retry:` field. `Last-Event-ID` is sent on every reconnect.
//! - **Stall detection**: an attempt without activity for a full heartbeat
//!   window is dropped and retried.
//! - **Pluggable transport**: anything implementing
//!   [`Transport`](crate::transport::Transport) can carry the stream.
//!
//! # Architecture
//!
//! ```text
//! EventSource::connect(config, transport)
//!   └─ spawns background task ──► Engine::run
//!        │                              │
//!        ├── EventSource ──► mpsc ──────┤  (commands: Close)
//!        │                              │
//!        │   Transport::open ──► mpsc ──┤  ((generation, Start/Progress/Finish))
//!        │                              │
//!        └── Listeners ◄── dispatch ────┘  (SseEvent, on the engine task)
//! ```

pub mod config;
pub(crate) mod connection;
pub mod listeners;
pub mod parse;
pub mod source;
pub mod types;

pub use config::EventSourceConfig;
pub use listeners::{Listener, ListenerId, Listeners};
pub use parse::{EventParser, EventStream, EventStreamError, MessageEvent, ParseOutput};
pub use source::{CloseHandle, EventSource, EventSourceBuilder};
pub use types::{ConnectionEvent, ErrorEvent, ReadyState, SseEvent};
