//! # hpx-eventsource
//!
//! A reconnecting Server-Sent Events client for tokio.
//!
//! ## Features
//!
//! - **Resumable parser**: text is parsed as it arrives, whatever the chunking
//! - **Backoff**: doubling reconnect delay, capped, reset on success
//! - **Heartbeat**: silent connections are detected and replaced
//! - **Transport seam**: HTTP via `reqwest` by default, or bring your own
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hpx_eventsource::{EventSource, EventSourceConfig, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EventSourceConfig::new("https://example.com/events")
//!         .heartbeat_timeout(std::time::Duration::from_secs(45));
//!
//!     let source = EventSource::builder(config)
//!         .transport(HttpTransport::new()?)
//!         .listener("update", |event| println!("{event:?}"))
//!         .connect()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     source.close();
//!     Ok(())
//! }
//! ```

pub mod decode;
pub mod error;
pub mod heartbeat;
pub mod reconnect;
pub mod sse;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

// Re-export commonly used types
pub use error::{EventSourceError, EventSourceResult};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use reconnect::RetryPolicy;
pub use sse::{
    CloseHandle, EventSource, EventSourceBuilder, EventSourceConfig, ListenerId, MessageEvent,
    ReadyState, SseEvent,
};
pub use transport::{AbortHandle, ResponseHead, Transport, TransportRequest, TransportSink};
