//! Structured JSON logger adapter.

use crate::log_sink::LogSink;
use rehearse_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use rehearse_shared::{REDACTED, is_secret_key, redact_json};
use serde_json::{Map, Value};
use std::sync::Arc;

/// JSON logger emitting one line per event.
#[derive(Clone)]
pub struct JsonLogger {
    sink: Arc<dyn LogSink>,
    base_fields: LogFields,
    min_level: LogLevel,
}

impl JsonLogger {
    /// Create a JSON logger backed by the provided sink. Defaults to `info`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_fields: LogFields::new(),
            min_level: LogLevel::Info,
        }
    }

    /// Set base fields applied to every event.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }

    /// Set the minimum log level.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn render(&self, event: LogEvent) -> String {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());

        let mut payload = Map::new();
        payload.insert("timestampMs".to_string(), Value::from(now_epoch_ms()));
        payload.insert("level".to_string(), Value::from(event.level.as_str()));
        payload.insert("event".to_string(), Value::from(&*event.event));
        payload.insert("message".to_string(), Value::from(&*event.message));
        if !fields.is_empty() {
            let rendered = fields
                .into_iter()
                .map(|(key, value)| {
                    let value = if is_secret_key(&key) {
                        Value::from(REDACTED)
                    } else {
                        redact_json(&value)
                    };
                    (key.into_string(), value)
                })
                .collect();
            payload.insert("fields".to_string(), Value::Object(rendered));
        }
        if let Some(error) = event.error {
            payload.insert("error".to_string(), redact_json(&error));
        }

        serde_json::to_string(&Value::Object(payload)).map_or_else(
            |_| {
                "{\"timestampMs\":0,\"level\":\"error\",\"event\":\"logger.serialize_failed\",\"message\":\"log serialization failed\"}\n"
                    .to_string()
            },
            |mut encoded| {
                encoded.push('\n');
                encoded
            },
        )
    }
}

impl LoggerPort for JsonLogger {
    fn log(&self, event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        let line = self.render(event);
        self.sink.write_line(&line);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            sink: Arc::clone(&self.sink),
            base_fields: merged,
            min_level: self.min_level,
        })
    }
}

pub(crate) fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use rehearse_shared::{ErrorClass, ErrorEnvelope};
    use serde_json::json;

    fn parse_lines(sink: &MemoryLogSink) -> Result<Vec<Value>, serde_json::Error> {
        sink.take()
            .iter()
            .map(|line| serde_json::from_str(line.trim()))
            .collect()
    }

    #[test]
    fn redacts_secret_fields_and_error_payloads() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::new();
        let logger = JsonLogger::new(Arc::new(sink.clone()));

        let mut fields = LogFields::new();
        fields.insert("authToken".into(), json!("abc"));
        fields.insert("function".into(), json!("simulateStakeholder"));
        fields.insert("request".into(), json!({ "password": "hunter2", "turn": 3 })); // pragma: allowlist secret

        logger.log(
            LogEvent::new(LogLevel::Error, "app.simulateStakeholder.failed", "call failed")
                .with_fields(Some(fields))
                .with_error(
                    &ErrorEnvelope::remote("unavailable", "down", ErrorClass::Retriable)
                        .with_metadata("apiKey", "k"),
                ),
        );

        let lines = parse_lines(&sink)?;
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "error");
        assert_eq!(line["event"], "app.simulateStakeholder.failed");
        assert_eq!(line["fields"]["authToken"], REDACTED);
        assert_eq!(line["fields"]["function"], "simulateStakeholder");
        assert_eq!(line["fields"]["request"]["password"], REDACTED);
        assert_eq!(line["fields"]["request"]["turn"], 3);
        assert_eq!(line["error"]["code"]["code"], "unavailable");
        assert_ne!(line["error"]["metadata"]["apiKey"], "k");
        Ok(())
    }

    #[test]
    fn events_below_min_level_are_dropped() {
        let sink = MemoryLogSink::new();
        let logger = JsonLogger::new(Arc::new(sink.clone())).with_min_level(LogLevel::Warn);

        logger.debug("app.debug", "hidden", None);
        logger.info("app.info", "hidden", None);
        logger.warn("app.warn", "shown", None);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn child_logger_merges_fields() -> Result<(), Box<dyn std::error::Error>> {
        let sink = MemoryLogSink::new();
        let mut base = LogFields::new();
        base.insert("service".into(), json!("rehearse"));
        let logger = JsonLogger::new(Arc::new(sink.clone())).with_base_fields(base);

        let mut scoped = LogFields::new();
        scoped.insert("correlationId".into(), json!("req_123"));
        let child = logger.child(scoped);
        child.info("app.child", "child log", None);

        let lines = parse_lines(&sink)?;
        assert_eq!(lines[0]["fields"]["service"], "rehearse");
        assert_eq!(lines[0]["fields"]["correlationId"], "req_123");
        Ok(())
    }
}
