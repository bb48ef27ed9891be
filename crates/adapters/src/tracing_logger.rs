//! Logger adapter forwarding structured events to `tracing`.
//!
//! Filtering and formatting belong to whichever subscriber the binary
//! installs; this adapter only renders fields.

use rehearse_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use rehearse_shared::{REDACTED, is_secret_key, redact_json};
use serde_json::{Map, Value};

/// Logger that emits `tracing` events under the `rehearse` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    base_fields: LogFields,
}

impl TracingLogger {
    /// Create a logger without base fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn render_fields(&self, extra: Option<LogFields>) -> Option<String> {
        let mut fields = self.base_fields.clone();
        fields.extend(extra.unwrap_or_default());
        if fields.is_empty() {
            return None;
        }
        let rendered: Map<String, Value> = fields
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
        Some(Value::Object(rendered).to_string())
    }
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let fields = self.render_fields(event.fields).unwrap_or_default();
        let error = event
            .error
            .map(|error| redact_json(&error).to_string())
            .unwrap_or_default();
        let name = &*event.event;
        let message = &*event.message;

        match event.level {
            LogLevel::Debug => {
                tracing::debug!(target: "rehearse", event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Info => {
                tracing::info!(target: "rehearse", event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Warn => {
                tracing::warn!(target: "rehearse", event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Error => {
                tracing::error!(target: "rehearse", event = name, fields = %fields, error = %error, "{message}");
            },
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            base_fields: merged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_merged_fields_with_secrets_redacted() -> Result<(), serde_json::Error> {
        let mut base = LogFields::new();
        base.insert("correlationId".into(), json!("req_1"));
        let logger = TracingLogger { base_fields: base };

        let mut extra = LogFields::new();
        extra.insert("authToken".into(), json!("abc"));
        let rendered = logger.render_fields(Some(extra)).unwrap_or_default();
        let parsed: Value = serde_json::from_str(&rendered)?;

        assert_eq!(parsed["correlationId"], "req_1");
        assert_eq!(parsed["authToken"], REDACTED);
        Ok(())
    }

    #[test]
    fn empty_fields_render_nothing() {
        assert_eq!(TracingLogger::new().render_fields(None), None);
    }

    #[test]
    fn logging_without_subscriber_is_a_no_op() {
        let logger = TracingLogger::new().child(LogFields::new());
        logger.info("app.test", "no subscriber installed", None);
    }
}
