//! Error handling for the event-source client.

use std::time::Duration;

use thiserror::Error;

/// The main result type used throughout the crate.
pub type EventSourceResult<T> = Result<T, EventSourceError>;

/// Every failure the client can observe.
///
/// None of these are fatal to an [`EventSource`](crate::sse::EventSource):
/// connection-level errors are recovered by reconnecting and surfaced as
/// `error` events. Only construction returns them directly.
#[derive(Error, Debug)]
pub enum EventSourceError {
    /// The server answered with a status other than `200`.
    #[error(
        "EventSource's response has a status {} {status_text} that is not 200. Aborting the connection.",
        .status.as_u16()
    )]
    InvalidStatus {
        status: http::StatusCode,
        status_text: String,
    },

    /// The server answered `200` with a content type other than
    /// `text/event-stream`.
    #[error(
        "EventSource's response has a Content-Type specifying an unsupported type: {content_type}. Aborting the connection."
    )]
    InvalidContentType { content_type: String },

    /// Network-level failure reported by a transport.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// No bytes were observed within the heartbeat window.
    #[error("{}", stall_message(.window, .chars_received))]
    Stall {
        window: Duration,
        /// `None` while no response has been received yet.
        chars_received: Option<usize>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn stall_message(window: &Duration, chars_received: &Option<usize>) -> String {
    let progress = match chars_received {
        None => "No response received.".to_string(),
        Some(n) => format!("{n} chars received."),
    };
    format!(
        "No activity within {} milliseconds. {progress} Reconnecting.",
        window.as_millis()
    )
}

/// Replace every run of whitespace with a single space.
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl EventSourceError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an invalid-status error.
    pub fn invalid_status(status: http::StatusCode, status_text: &str) -> Self {
        Self::InvalidStatus {
            status,
            status_text: collapse_whitespace(status_text),
        }
    }

    /// Create an invalid-content-type error. A missing header renders as `-`.
    pub fn invalid_content_type(content_type: Option<&str>) -> Self {
        Self::InvalidContentType {
            content_type: content_type
                .map(collapse_whitespace)
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    /// Create a stall error.
    pub fn stall(window: Duration, chars_received: Option<usize>) -> Self {
        Self::Stall {
            window,
            chars_received,
        }
    }

    /// Returns `true` for errors caused by the server's response head.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::InvalidStatus { .. } | Self::InvalidContentType { .. }
        )
    }

    /// Returns `true` for heartbeat stalls.
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::Stall { .. })
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for EventSourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = EventSourceError::config("Invalid URL");
        assert!(matches!(err, EventSourceError::Config { .. }));

        let err = EventSourceError::transport("connection reset");
        assert!(matches!(err, EventSourceError::Transport { .. }));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_invalid_status_collapses_whitespace() {
        let err = EventSourceError::invalid_status(http::StatusCode::NOT_FOUND, "Not \r\n  Found");
        assert!(err.is_protocol());
        assert_eq!(
            err.to_string(),
            "EventSource's response has a status 404 Not Found that is not 200. Aborting the connection."
        );
    }

    #[test]
    fn test_missing_content_type_renders_dash() {
        let err = EventSourceError::invalid_content_type(None);
        assert_eq!(
            err.to_string(),
            "EventSource's response has a Content-Type specifying an unsupported type: -. Aborting the connection."
        );
    }

    #[test]
    fn test_stall_messages() {
        let waiting = EventSourceError::stall(Duration::from_secs(45), None);
        assert!(waiting.is_stall());
        assert_eq!(
            waiting.to_string(),
            "No activity within 45000 milliseconds. No response received. Reconnecting."
        );

        let silent = EventSourceError::stall(Duration::from_millis(1500), Some(12));
        assert_eq!(
            silent.to_string(),
            "No activity within 1500 milliseconds. 12 chars received. Reconnecting."
        );
    }
}
