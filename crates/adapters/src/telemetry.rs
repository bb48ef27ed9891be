//! Telemetry adapters: JSON lines, `tracing` events and a tag decorator.

use crate::log_sink::LogSink;
use crate::logger::now_epoch_ms;
use rehearse_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};
use rehearse_shared::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Telemetry adapter that emits one JSON line per metric.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Create a telemetry adapter backed by the provided sink.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Set base tags applied to every metric.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }

    fn emit(&self, metric_type: &str, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_line(metric_type, name, value, &tags));
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.emit("counter", name, value, tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        self.emit("timer", name, duration_ms, tags);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(PortTimer::new(Arc::new(self.clone()), name, tags))
    }

    fn track_event(&self, name: &str, tags: Option<&TelemetryTags>) {
        self.emit("event", name, 1, tags);
    }
}

/// Telemetry adapter that records metrics as `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetryPort for TracingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = tags_json(&merge_tags(&TelemetryTags::new(), tags));
        tracing::debug!(target: "rehearse::telemetry", metric = name, kind = "counter", value, tags = %tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let tags = tags_json(&merge_tags(&TelemetryTags::new(), tags));
        tracing::debug!(target: "rehearse::telemetry", metric = name, kind = "timer", duration_ms, tags = %tags);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(PortTimer::new(Arc::new(*self), name, tags))
    }
}

/// Telemetry adapter that applies base tags to an inner telemetry port.
#[derive(Clone)]
pub struct TaggedTelemetry {
    inner: Arc<dyn TelemetryPort>,
    tags: TelemetryTags,
}

impl TaggedTelemetry {
    /// Wrap a telemetry port with base tags.
    #[must_use]
    pub fn new(inner: Arc<dyn TelemetryPort>, tags: TelemetryTags) -> Self {
        Self { inner, tags }
    }
}

impl TelemetryPort for TaggedTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.increment_counter(name, value, Some(&merged));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.record_timer_ms(name, duration_ms, Some(&merged));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        let merged = merge_tags(&self.tags, tags);
        self.inner.start_timer(name, Some(&merged))
    }

    fn track_event(&self, name: &str, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.track_event(name, Some(&merged));
    }
}

/// Timer that reports its elapsed time to a port exactly once.
struct PortTimer {
    port: Arc<dyn TelemetryPort>,
    name: Box<str>,
    tags: TelemetryTags,
    started_at: Instant,
    stopped: AtomicBool,
}

impl PortTimer {
    fn new(port: Arc<dyn TelemetryPort>, name: &str, tags: Option<&TelemetryTags>) -> Self {
        Self {
            port,
            name: name.into(),
            tags: tags.cloned().unwrap_or_default(),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }
}

impl TelemetryTimer for PortTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let duration_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.port
            .record_timer_ms(&self.name, duration_ms, Some(&self.tags));
    }
}

fn metric_line(metric_type: &str, name: &str, value: u64, tags: &TelemetryTags) -> String {
    let mut payload = Map::new();
    payload.insert("type".to_string(), Value::from("metric"));
    payload.insert("timestampMs".to_string(), Value::from(now_epoch_ms()));
    payload.insert("metricType".to_string(), Value::from(metric_type));
    payload.insert("name".to_string(), Value::from(name));
    payload.insert("value".to_string(), Value::from(value));
    if metric_type == "timer" {
        payload.insert("unit".to_string(), Value::from("ms"));
    }
    if !tags.is_empty() {
        payload.insert("tags".to_string(), tags_json(tags));
    }
    serde_json::to_string(&Value::Object(payload)).map_or_else(
        |_| {
            "{\"type\":\"metric\",\"metricType\":\"error\",\"name\":\"telemetry.serialize_failed\",\"value\":1}\n"
                .to_string()
        },
        |mut encoded| {
            encoded.push('\n');
            encoded
        },
    )
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    for (key, value) in &mut merged {
        if is_secret_key(key) {
            *value = REDACTED.into();
        }
    }
    merged
}

fn tags_json(tags: &TelemetryTags) -> Value {
    Value::Object(
        tags.iter()
            .map(|(key, value)| (key.to_string(), Value::from(&**value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use rehearse_ports::telemetry_tags;
    use std::sync::Mutex;

    fn parse(sink: &MemoryLogSink) -> Result<Vec<Value>, serde_json::Error> {
        sink.take()
            .iter()
            .map(|line| serde_json::from_str(line.trim()))
            .collect()
    }

    #[test]
    fn emits_counters_timers_and_events() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::new();
        let telemetry = JsonTelemetry::new(Arc::new(sink.clone()))
            .with_base_tags(telemetry_tags([("service", "rehearse")]));

        telemetry.increment_counter("remote.call", 2, None);
        let timer = telemetry.start_timer("remote.latency", None);
        timer.stop();
        timer.stop();
        telemetry.track_event("session_started", None);

        let lines = parse(&sink)?;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["metricType"], "counter");
        assert_eq!(lines[0]["value"], 2);
        assert_eq!(lines[0]["tags"]["service"], "rehearse");
        assert_eq!(lines[1]["metricType"], "timer");
        assert_eq!(lines[1]["unit"], "ms");
        assert_eq!(lines[2]["metricType"], "event");
        assert_eq!(lines[2]["name"], "session_started");
        Ok(())
    }

    #[test]
    fn secret_tags_are_redacted() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::new();
        let telemetry = JsonTelemetry::new(Arc::new(sink.clone()));
        telemetry.increment_counter("login", 1, Some(&telemetry_tags([("authToken", "abc")])));

        let lines = parse(&sink)?;
        assert_eq!(lines[0]["tags"]["authToken"], REDACTED);
        Ok(())
    }

    #[derive(Default)]
    struct CaptureTelemetry {
        tags: Mutex<Vec<TelemetryTags>>,
    }

    impl TelemetryPort for CaptureTelemetry {
        fn increment_counter(&self, _name: &str, _value: u64, tags: Option<&TelemetryTags>) {
            if let Ok(mut guard) = self.tags.lock() {
                guard.push(tags.cloned().unwrap_or_default());
            }
        }

        fn record_timer_ms(&self, _name: &str, _duration_ms: u64, tags: Option<&TelemetryTags>) {
            if let Ok(mut guard) = self.tags.lock() {
                guard.push(tags.cloned().unwrap_or_default());
            }
        }

        fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
            Box::new(PortTimer::new(Arc::new(TracingTelemetry), name, tags))
        }
    }

    #[test]
    fn tagged_telemetry_merges_and_overrides_tags() {
        let base = Arc::new(CaptureTelemetry::default());
        let telemetry = TaggedTelemetry::new(
            base.clone(),
            telemetry_tags([("correlationId", "req_456"), ("outcome", "unknown")]),
        );
        telemetry.increment_counter("calls", 1, Some(&telemetry_tags([("outcome", "live")])));
        telemetry.track_event("evaluation_viewed", None);

        let captured = base.tags.lock().map(|guard| guard.clone()).unwrap_or_default();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].get("correlationId").map(|value| &**value), Some("req_456"));
        assert_eq!(captured[0].get("outcome").map(|value| &**value), Some("live"));
        assert_eq!(captured[1].get("outcome").map(|value| &**value), Some("unknown"));
    }
}
