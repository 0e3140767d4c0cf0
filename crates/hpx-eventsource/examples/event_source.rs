//! EventSource Example
//!
//! Connects to an SSE endpoint and prints everything it dispatches until
//! Ctrl-C.
//!
//! Run with: `cargo run -p hpx-eventsource --example event_source -- <url>`

use std::time::Duration;

use hpx_eventsource::{EventSource, EventSourceConfig, HttpTransport, SseEvent};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let config = EventSourceConfig::new(url)
        .heartbeat_timeout(Duration::from_secs(45))
        .reconnect_jitter(0.1);

    let source = EventSource::builder(config)
        .transport(HttpTransport::new()?)
        .on_open(|event| {
            if let SseEvent::Connection(conn) = event {
                info!(status = conn.status.as_u16(), "Stream opened");
            }
        })
        .on_message(|event| {
            if let Some(message) = event.as_message() {
                info!(id = %message.last_event_id, data = %message.data, "Message");
            }
        })
        .on_error(|event| match event.error_cause() {
            Some(err) => info!(error = %err, "Stream error"),
            None => info!("Stream interrupted"),
        })
        .connect()?;

    // Custom event types only reach their own listeners.
    source.add_event_listener("update", |event| {
        if let Some(message) = event.as_message() {
            info!(data = %message.data, "Update");
        }
    });

    tokio::signal::ctrl_c().await?;
    source.close();
    info!(state = %source.ready_state(), "Done");
    Ok(())
}
