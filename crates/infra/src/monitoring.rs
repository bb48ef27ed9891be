//! Process-wide monitoring context.
//!
//! One [`Monitoring`] is built by the composition root and handed to whatever
//! needs to report errors or analytics events. Initialization happens once;
//! a second call fails with `core:already_initialized`.

use crate::InfraResult;
use rehearse_ports::{LogFields, LoggerPort, TelemetryPort, TelemetryTags, telemetry_tags};
use rehearse_shared::{ErrorCode, ErrorEnvelope};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Logger and telemetry pair with an explicit init step.
pub struct Monitoring {
    logger: Arc<dyn LoggerPort>,
    telemetry: Arc<dyn TelemetryPort>,
    initialized: AtomicBool,
}

impl Monitoring {
    /// Create an uninitialized context.
    #[must_use]
    pub fn new(logger: Arc<dyn LoggerPort>, telemetry: Arc<dyn TelemetryPort>) -> Self {
        Self {
            logger,
            telemetry,
            initialized: AtomicBool::new(false),
        }
    }

    /// Mark monitoring as started. Errors on a second call.
    pub fn initialize(&self, environment: &str) -> InfraResult<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ErrorEnvelope::expected(
                ErrorCode::already_initialized(),
                "monitoring is already initialized",
            )
            .with_metadata("environment", environment));
        }

        let mut fields = LogFields::new();
        fields.insert("environment".into(), Value::from(environment));
        self.logger.info(
            "infra.monitoring.initialized",
            "Monitoring initialized",
            Some(fields),
        );
        Ok(())
    }

    /// Whether [`Monitoring::initialize`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Shared logger.
    #[must_use]
    pub fn logger(&self) -> Arc<dyn LoggerPort> {
        Arc::clone(&self.logger)
    }

    /// Shared telemetry sink.
    #[must_use]
    pub fn telemetry(&self) -> Arc<dyn TelemetryPort> {
        Arc::clone(&self.telemetry)
    }

    /// Report a failure. Returns `false` (and drops the report) before init.
    pub fn capture_error(&self, event: &str, error: &ErrorEnvelope) -> bool {
        if !self.is_initialized() {
            return false;
        }
        self.logger.error(event, &error.message, error, None);
        let code = error.code.to_string();
        self.telemetry.increment_counter(
            "monitoring.errors",
            1,
            Some(&telemetry_tags([("code", code.as_str())])),
        );
        true
    }

    /// Record an analytics event. Returns `false` (and drops it) before init.
    pub fn track_event(&self, name: &str, tags: Option<&TelemetryTags>) -> bool {
        if !self.is_initialized() {
            return false;
        }
        self.telemetry.track_event(name, tags);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_adapters::{JsonLogger, JsonTelemetry, MemoryLogSink};
    use rehearse_shared::ErrorClass;

    fn monitoring() -> (Monitoring, MemoryLogSink) {
        let sink = MemoryLogSink::new();
        let monitoring = Monitoring::new(
            Arc::new(JsonLogger::new(Arc::new(sink.clone()))),
            Arc::new(JsonTelemetry::new(Arc::new(sink.clone()))),
        );
        (monitoring, sink)
    }

    #[test]
    fn second_initialize_fails_fast() {
        let (monitoring, _sink) = monitoring();
        assert!(monitoring.initialize("test").is_ok());
        let error = monitoring.initialize("test").err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::already_initialized())
        );
        assert!(monitoring.is_initialized());
    }

    #[test]
    fn reports_before_initialize_are_dropped() {
        let (monitoring, sink) = monitoring();
        let error = ErrorEnvelope::remote("unavailable", "backend down", ErrorClass::Retriable);

        assert!(!monitoring.capture_error("app.test.failed", &error));
        assert!(!monitoring.track_event("session_started", None));
        assert!(sink.is_empty());
    }

    #[test]
    fn captured_errors_are_logged_and_counted() -> Result<(), serde_json::Error> {
        let (monitoring, sink) = monitoring();
        assert!(monitoring.initialize("test").is_ok());
        sink.take();

        let error = ErrorEnvelope::remote("unavailable", "backend down", ErrorClass::Retriable);
        assert!(monitoring.capture_error("app.test.failed", &error));
        assert!(monitoring.track_event("session_started", None));

        let lines = sink
            .take()
            .iter()
            .map(|line| serde_json::from_str::<Value>(line))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|line| line["event"] == "app.test.failed"));
        assert!(lines.iter().any(|line| line["name"] == "monitoring.errors"));
        assert!(lines.iter().any(|line| line["metricType"] == "event"));
        Ok(())
    }
}
