use std::time::Duration;

use rand::Rng;

/// Lower bound for every server- or caller-supplied duration.
pub const MIN_DURATION: Duration = Duration::from_millis(1_000);
/// Upper bound for every server- or caller-supplied duration.
pub const MAX_DURATION: Duration = Duration::from_millis(18_000_000);

/// Backoff ceiling relative to the initial retry interval.
const MAX_BACKOFF_MULTIPLIER: u32 = 16;

/// Clamp a duration into `[MIN_DURATION, MAX_DURATION]`.
pub fn clamp_duration(duration: Duration) -> Duration {
    duration.clamp(MIN_DURATION, MAX_DURATION)
}

/// Parse a millisecond field value the way the wire format expects.
///
/// Leading whitespace and a sign are accepted, then the leading run of ASCII
/// digits is used and anything after it is ignored (`"5000ms"` is 5000).
/// Returns `None` when there are no digits at all. The result is clamped, so
/// negative or tiny values become [`MIN_DURATION`].
pub fn parse_duration_ms(value: &str) -> Option<Duration> {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    if negative {
        return Some(MIN_DURATION);
    }

    // Overlong digit runs saturate at the ceiling instead of failing.
    let millis = digits[..end].parse::<u64>().unwrap_or(u64::MAX);
    Some(clamp_duration(Duration::from_millis(millis)))
}

/// Exponential reconnect interval without a fixed attempt limit.
///
/// `current` starts at `initial`, doubles after every failed attempt up to
/// `min(initial * 16, MAX_DURATION)`, and snaps back to `initial` whenever a
/// connection opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    initial: Duration,
    current: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MIN_DURATION)
    }
}

impl RetryPolicy {
    /// Create a policy with the given (clamped) initial interval.
    pub fn new(initial: Duration) -> Self {
        let initial = clamp_duration(initial);
        Self {
            initial,
            current: initial,
        }
    }

    /// The interval restored after every successful open.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// The delay the next failure will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Adopt a `retry:` hint from the server for both values.
    pub fn set_server_hint(&mut self, retry: Duration) {
        self.initial = clamp_duration(retry);
        self.current = self.initial;
    }

    /// Return to the initial interval.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Take the delay for the reconnect being scheduled now and grow the
    /// interval for the failure after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let ceiling = self.initial.saturating_mul(MAX_BACKOFF_MULTIPLIER);
        self.current = clamp_duration(ceiling.min(self.current.saturating_mul(2)));
        delay
    }
}

/// Spread a delay randomly by `jitter` (0.0–1.0), staying within
/// `[MIN_DURATION, delay]`. Zero jitter returns `delay` untouched.
pub(crate) fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }

    let base = delay.as_secs_f64();
    let mut rng = rand::rng();
    let randomized = rng.random_range(0.0..=base);
    let blended = base * (1.0 - jitter) + randomized * jitter;
    clamp_duration(Duration::from_secs_f64(blended))
}
