//! Event-source configuration.

use std::time::Duration;

use crate::reconnect::{MAX_DURATION, MIN_DURATION, clamp_duration};

/// Configuration for an [`EventSource`](super::EventSource).
///
/// Built with chainable setters and frozen once the client starts. Durations
/// are clamped into `[1s, 5h]` as they are set.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
    /// Event stream URL.
    pub url: String,
    /// Whether the transport may send cookies and other credentials.
    pub with_credentials: bool,
    /// Extra request headers, in insertion order, names unique.
    pub headers: Vec<(String, String)>,
    /// Stall window: an attempt with no activity for this long is dropped.
    pub heartbeat_timeout: Duration,
    /// Reconnect delay used until the server sends `retry:`.
    pub initial_retry: Duration,
    /// Random jitter factor (0.0–1.0) for reconnection delays.
    pub reconnect_jitter: f64,
    /// Capacity of the queue between the transport and the engine.
    pub event_channel_capacity: usize,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            with_credentials: false,
            headers: Vec::new(),
            heartbeat_timeout: MAX_DURATION,
            initial_retry: MIN_DURATION,
            reconnect_jitter: 0.0,
            event_channel_capacity: 256,
        }
    }
}

impl EventSourceConfig {
    /// Create a new configuration for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Allow credentials (cookies) on every request.
    #[must_use]
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    /// Add a request header. A header with the same name is replaced in
    /// place.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Set the heartbeat (stall) window.
    #[must_use]
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = clamp_duration(timeout);
        self
    }

    /// Set the initial reconnection delay.
    #[must_use]
    pub fn initial_retry(mut self, delay: Duration) -> Self {
        self.initial_retry = clamp_duration(delay);
        self
    }

    /// Set the reconnection jitter factor.
    #[must_use]
    pub fn reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Set the transport queue capacity. A full queue makes the transport
    /// wait.
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Look up a configured header by exact name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        url::Url::parse(&self.url).map_err(|e| format!("Invalid URL {:?}: {e}", self.url))?;
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity must be > 0".to_string());
        }
        for (name, value) in &self.headers {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(format!("Invalid header name: {name:?}"));
            }
            if http::HeaderValue::from_str(value).is_err() {
                return Err(format!("Invalid value for header {name:?}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventSourceConfig::default();
        assert!(config.url.is_empty());
        assert!(!config.with_credentials);
        assert!(config.headers.is_empty());
        assert_eq!(config.heartbeat_timeout, Duration::from_millis(18_000_000));
        assert_eq!(config.initial_retry, Duration::from_secs(1));
        assert_eq!(config.reconnect_jitter, 0.0);
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_builder_pattern() {
        let config = EventSourceConfig::new("https://example.com/events")
            .with_credentials(true)
            .header("Authorization", "Bearer a")
            .header("X-Client", "1")
            .heartbeat_timeout(Duration::from_secs(45))
            .initial_retry(Duration::from_secs(3))
            .reconnect_jitter(0.2)
            .event_channel_capacity(16);

        assert_eq!(config.url, "https://example.com/events");
        assert!(config.with_credentials);
        assert_eq!(config.headers.len(), 2);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(45));
        assert_eq!(config.initial_retry, Duration::from_secs(3));
        assert_eq!(config.reconnect_jitter, 0.2);
        assert_eq!(config.event_channel_capacity, 16);
    }

    #[test]
    fn test_header_replaced_in_place() {
        let config = EventSourceConfig::new("https://example.com")
            .header("A", "1")
            .header("B", "2")
            .header("A", "3");
        assert_eq!(
            config.headers,
            vec![
                ("A".to_string(), "3".to_string()),
                ("B".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(config.header_value("A"), Some("3"));
        assert_eq!(config.header_value("a"), None);
    }

    #[test]
    fn test_durations_are_clamped() {
        let config = EventSourceConfig::new("https://example.com")
            .heartbeat_timeout(Duration::from_millis(10))
            .initial_retry(Duration::from_secs(86_400));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(1));
        assert_eq!(config.initial_retry, Duration::from_millis(18_000_000));
    }

    #[test]
    fn test_validate_ok() {
        assert!(EventSourceConfig::new("http://localhost:8080/sse").validate().is_ok());
    }

    #[test]
    fn test_validate_url() {
        assert!(EventSourceConfig::default().validate().is_err());
        assert!(EventSourceConfig::new("not a url").validate().is_err());
    }

    #[test]
    fn test_validate_jitter() {
        let config = EventSourceConfig::new("http://localhost").reconnect_jitter(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_event_channel_capacity() {
        let config = EventSourceConfig::new("http://localhost").event_channel_capacity(0);
        assert_eq!(
            config.validate(),
            Err("Event channel capacity must be > 0".to_string())
        );
    }

    #[test]
    fn test_validate_headers() {
        let config = EventSourceConfig::new("http://localhost").header("bad name", "x");
        assert!(config.validate().is_err());

        let config = EventSourceConfig::new("http://localhost").header("X-Ok", "line\nbreak");
        assert!(config.validate().is_err());
    }
}
