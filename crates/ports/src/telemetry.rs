//! Telemetry boundary contract (counters, timings and analytics events).

use std::collections::BTreeMap;

/// Telemetry tags. Keep tags low-cardinality.
pub type TelemetryTags = BTreeMap<Box<str>, Box<str>>;

/// Build tags from key/value pairs.
#[must_use]
pub fn telemetry_tags<const N: usize>(pairs: [(&str, &str); N]) -> TelemetryTags {
    pairs
        .into_iter()
        .map(|(key, value)| (Box::from(key), Box::from(value)))
        .collect()
}

/// Timer handle.
pub trait TelemetryTimer: Send + Sync {
    /// Stop the timer and record its duration.
    fn stop(&self);
}

/// Boundary contract for telemetry.
pub trait TelemetryPort: Send + Sync {
    /// Increment a counter by `value`.
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>);

    /// Record a duration (in milliseconds) for an operation.
    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>);

    /// Start a timer and return a handle that records on `stop()`.
    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer>;

    /// Record a product analytics event (`session_started`, `evaluation_viewed`).
    fn track_event(&self, name: &str, tags: Option<&TelemetryTags>) {
        self.increment_counter(&format!("event.{name}"), 1, tags);
    }
}
