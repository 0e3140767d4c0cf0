//! Heartbeat-based stall detection.
//!
//! The monitor only keeps accounting; the connection driver owns the actual
//! deadline and asks [`StallMonitor::check`] what to do when it fires.

use std::time::Duration;

use tokio::time::Instant;

use crate::{error::EventSourceError, reconnect::clamp_duration};

/// Which phase of an attempt the heartbeat fired in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptPhase {
    /// Request sent, no response head yet.
    AwaitingResponse,
    /// Response accepted, streaming the body.
    Streaming,
}

/// Outcome of a heartbeat tick.
#[derive(Debug)]
pub enum StallCheck {
    /// Nothing happened for a full window; the attempt must be torn down.
    Stalled(EventSourceError),
    /// Activity was seen; fire again after the contained delay.
    Rearm(Duration),
}

/// Tracks activity for the live attempt.
#[derive(Clone, Debug)]
pub struct StallMonitor {
    window: Duration,
    /// Latest activity since the previous tick, cleared on every tick.
    last_activity: Option<Instant>,
    chars_received: usize,
}

impl StallMonitor {
    /// Create a monitor with the given (clamped) window.
    pub fn new(window: Duration) -> Self {
        Self {
            window: clamp_duration(window),
            last_activity: None,
            chars_received: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the window, e.g. from a `heartbeatTimeout:` field.
    pub fn set_window(&mut self, window: Duration) {
        self.window = clamp_duration(window);
    }

    pub fn chars_received(&self) -> usize {
        self.chars_received
    }

    /// Forget everything about the previous attempt.
    pub fn begin_attempt(&mut self) {
        self.last_activity = None;
        self.chars_received = 0;
    }

    /// Record that the response head or `chars` characters of body arrived.
    pub fn record_activity(&mut self, now: Instant, chars: usize) {
        self.last_activity = Some(now);
        self.chars_received = self.chars_received.saturating_add(chars);
    }

    /// Decide what a heartbeat tick at `now` means.
    ///
    /// A tick that lost the race against incoming data rearms for the rest of
    /// the window measured from the latest activity, never less than 1 ms.
    pub fn check(&mut self, now: Instant, phase: AttemptPhase) -> StallCheck {
        match self.last_activity.take() {
            None => {
                let chars_received = match phase {
                    AttemptPhase::AwaitingResponse => None,
                    AttemptPhase::Streaming => Some(self.chars_received),
                };
                StallCheck::Stalled(EventSourceError::stall(self.window, chars_received))
            }
            Some(at) => {
                let next = (at + self.window).saturating_duration_since(now);
                StallCheck::Rearm(next.max(Duration::from_millis(1)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_clamped() {
        let monitor = StallMonitor::new(Duration::from_millis(5));
        assert_eq!(monitor.window(), Duration::from_millis(1_000));

        let mut monitor = StallMonitor::new(Duration::from_secs(86_400));
        assert_eq!(monitor.window(), Duration::from_millis(18_000_000));
        monitor.set_window(Duration::from_secs(30));
        assert_eq!(monitor.window(), Duration::from_secs(30));
    }

    #[test]
    fn test_no_activity_before_response_is_stall() {
        let mut monitor = StallMonitor::new(Duration::from_secs(10));
        monitor.begin_attempt();
        match monitor.check(Instant::now(), AttemptPhase::AwaitingResponse) {
            StallCheck::Stalled(EventSourceError::Stall { chars_received, .. }) => {
                assert_eq!(chars_received, None);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[test]
    fn test_silence_after_data_reports_chars() {
        let mut monitor = StallMonitor::new(Duration::from_secs(10));
        let start = Instant::now();
        monitor.begin_attempt();
        monitor.record_activity(start, 0);
        monitor.record_activity(start, 42);

        // First tick sees the activity and rearms.
        assert!(matches!(
            monitor.check(start + Duration::from_secs(10), AttemptPhase::Streaming),
            StallCheck::Rearm(_)
        ));

        // Second tick without anything new is a stall.
        match monitor.check(start + Duration::from_secs(20), AttemptPhase::Streaming) {
            StallCheck::Stalled(err) => {
                assert!(err.to_string().contains("42 chars received."), "{err}");
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[test]
    fn test_rearm_uses_remaining_window() {
        let mut monitor = StallMonitor::new(Duration::from_secs(10));
        let start = Instant::now();
        monitor.record_activity(start + Duration::from_secs(4), 1);

        match monitor.check(start + Duration::from_secs(10), AttemptPhase::Streaming) {
            StallCheck::Rearm(next) => assert_eq!(next, Duration::from_secs(4)),
            other => panic!("expected rearm, got {other:?}"),
        }
    }

    #[test]
    fn test_rearm_never_below_one_millisecond() {
        let mut monitor = StallMonitor::new(Duration::from_secs(10));
        let start = Instant::now();
        monitor.record_activity(start, 1);

        match monitor.check(start + Duration::from_secs(30), AttemptPhase::Streaming) {
            StallCheck::Rearm(next) => assert_eq!(next, Duration::from_millis(1)),
            other => panic!("expected rearm, got {other:?}"),
        }
    }

    #[test]
    fn test_begin_attempt_resets_accounting() {
        let mut monitor = StallMonitor::new(Duration::from_secs(10));
        monitor.record_activity(Instant::now(), 7);
        monitor.begin_attempt();
        assert_eq!(monitor.chars_received(), 0);
        assert!(matches!(
            monitor.check(Instant::now(), AttemptPhase::Streaming),
            StallCheck::Stalled(_)
        ));
    }
}
