//! Structured start/finish events shared by the use cases.
//!
//! Every use case emits `app.<useCase>.start` and exactly one terminal event:
//! `completed`, `degraded`, `stale`, `aborted` or `failed`, each with a
//! matching counter and the `app.<useCase>.total` timer.

use crate::CallOutcome;
use rehearse_ports::{LogFields, LoggerPort, TelemetryPort, TelemetryTimer, telemetry_tags};
use rehearse_shared::{ErrorEnvelope, RequestContext, Result, classify};
use serde_json::Value;
use std::time::Instant;

pub struct UseCaseEvents<'a> {
    use_case: &'static str,
    logger: Option<&'a dyn LoggerPort>,
    telemetry: Option<&'a dyn TelemetryPort>,
    fields: LogFields,
    started_at: Instant,
    timer: Option<Box<dyn TelemetryTimer>>,
}

impl<'a> UseCaseEvents<'a> {
    pub fn start(
        use_case: &'static str,
        ctx: &RequestContext,
        logger: Option<&'a dyn LoggerPort>,
        telemetry: Option<&'a dyn TelemetryPort>,
        mut fields: LogFields,
    ) -> Self {
        fields.insert(
            "correlationId".into(),
            Value::from(ctx.correlation_id().as_str()),
        );
        let timer =
            telemetry.map(|telemetry| telemetry.start_timer(&format!("app.{use_case}.total"), None));
        if let Some(logger) = logger {
            logger.info(
                &format!("app.{use_case}.start"),
                &format!("{use_case} started"),
                Some(fields.clone()),
            );
        }
        Self {
            use_case,
            logger,
            telemetry,
            fields,
            started_at: Instant::now(),
            timer,
        }
    }

    /// Emit the terminal event matching a remote-call result.
    pub fn finish<T>(self, result: &Result<CallOutcome<T>>) {
        match result {
            Ok(CallOutcome::Live(_)) => self.completed(LogFields::new()),
            Ok(CallOutcome::Degraded { reason, .. }) => {
                let mut fields = self.close("degraded");
                fields.insert("reasonCode".into(), Value::from(&*reason.code));
                fields.insert("retryable".into(), Value::from(reason.retryable));
                if let Some(logger) = self.logger {
                    logger.warn(
                        &format!("app.{}.degraded", self.use_case),
                        &format!("{} returned a placeholder result", self.use_case),
                        Some(fields),
                    );
                }
            },
            Ok(CallOutcome::Stale) => {
                let fields = self.close("stale");
                if let Some(logger) = self.logger {
                    logger.debug(
                        &format!("app.{}.stale", self.use_case),
                        &format!("{} result discarded for a newer call", self.use_case),
                        Some(fields),
                    );
                }
            },
            Err(error) => self.failed(error),
        }
    }

    pub fn completed(self, extra: LogFields) {
        let mut fields = self.close("completed");
        fields.extend(extra);
        if let Some(logger) = self.logger {
            logger.info(
                &format!("app.{}.completed", self.use_case),
                &format!("{} completed", self.use_case),
                Some(fields),
            );
        }
    }

    /// Cancellation and supersession log as `aborted`; everything else as `failed`.
    pub fn failed(self, error: &ErrorEnvelope) {
        if error.is_cancelled() || error.is_superseded() {
            let fields = self.close("aborted");
            if let Some(logger) = self.logger {
                logger.info(
                    &format!("app.{}.aborted", self.use_case),
                    &format!("{} aborted", self.use_case),
                    Some(fields),
                );
            }
            return;
        }

        let mut fields = self.close("failed");
        let descriptor = classify(error);
        fields.insert("errorCode".into(), Value::from(&*descriptor.code));
        fields.insert("retryable".into(), Value::from(descriptor.retryable));
        if let Some(logger) = self.logger {
            logger.error(
                &format!("app.{}.failed", self.use_case),
                &format!("{} failed", self.use_case),
                error,
                Some(fields),
            );
        }
    }

    fn close(&self, outcome: &str) -> LogFields {
        if let Some(timer) = self.timer.as_ref() {
            timer.stop();
        }
        if let Some(telemetry) = self.telemetry {
            telemetry.increment_counter(
                &format!("app.{}.{outcome}", self.use_case),
                1,
                Some(&telemetry_tags([("outcome", outcome)])),
            );
        }
        let mut fields = self.fields.clone();
        fields.insert("durationMs".into(), Value::from(duration_ms(self.started_at)));
        fields
    }
}

pub fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> LogFields {
    pairs
        .into_iter()
        .map(|(key, value)| (Box::from(key), value))
        .collect()
}
