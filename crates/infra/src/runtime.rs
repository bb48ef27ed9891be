//! Composition root: builds adapters once and hands out use-case deps.

use crate::adapter_factory::{
    build_fallback_port, build_key_value_store, build_logger, build_remote_port, build_telemetry,
};
use crate::{InfraResult, Monitoring};
use rehearse_adapters::{InMemoryDocumentStore, LogSink, StderrLogSink, TaggedTelemetry};
use rehearse_app::{
    CallOutcome, EvaluateSessionDeps, HintService, RemoteCallDeps, SessionRecorderDeps,
    SimulateStakeholderDeps, invoke_with_fallback,
};
use rehearse_config::ValidatedAppConfig;
use rehearse_domain::FunctionName;
use rehearse_ports::{DocumentStorePort, KeyValueStorePort, telemetry_tags};
use rehearse_shared::{LatestOnlyGate, RequestContext, SequentialQueue};
use serde_json::Value;
use std::sync::Arc;

/// Wired application runtime.
///
/// Must be built inside a Tokio runtime: the write queue spawns its worker
/// on construction.
pub struct AppRuntime {
    config: ValidatedAppConfig,
    monitoring: Arc<Monitoring>,
    remote: RemoteCallDeps,
    documents: Arc<dyn DocumentStorePort>,
    key_values: Arc<dyn KeyValueStorePort>,
    queue: SequentialQueue,
}

impl AppRuntime {
    /// Build with logs written to stderr.
    pub fn build(config: ValidatedAppConfig) -> InfraResult<Self> {
        Self::build_with_sink(config, Arc::new(StderrLogSink))
    }

    /// Build with JSON log lines written to `sink`.
    pub fn build_with_sink(config: ValidatedAppConfig, sink: Arc<dyn LogSink>) -> InfraResult<Self> {
        let logger = build_logger(&config.logging, Arc::clone(&sink))?;
        let telemetry = Arc::new(TaggedTelemetry::new(
            build_telemetry(&config.logging, sink),
            telemetry_tags([("service", "rehearse")]),
        ));
        let monitoring = Arc::new(Monitoring::new(logger, telemetry));

        let remote = RemoteCallDeps {
            remote: build_remote_port(&config)?,
            fallback: build_fallback_port(&config),
            retry_policy: config.retry_policy(),
            timeout: config.remote_timeout(),
            logger: Some(monitoring.logger()),
            telemetry: Some(monitoring.telemetry()),
        };
        tracing::debug!(
            provider = %remote.remote.provider().id,
            fallback = remote.fallback.is_some(),
            "runtime adapters selected"
        );

        Ok(Self {
            key_values: build_key_value_store(&config),
            documents: Arc::new(InMemoryDocumentStore::new()),
            queue: SequentialQueue::new()?,
            config,
            monitoring,
            remote,
        })
    }

    /// Effective config.
    #[must_use]
    pub const fn config(&self) -> &ValidatedAppConfig {
        &self.config
    }

    /// Monitoring context shared by every use case.
    #[must_use]
    pub fn monitoring(&self) -> Arc<Monitoring> {
        Arc::clone(&self.monitoring)
    }

    /// Key-value store for small local preferences.
    #[must_use]
    pub fn key_values(&self) -> Arc<dyn KeyValueStorePort> {
        Arc::clone(&self.key_values)
    }

    /// Document store holding sessions and evaluations.
    #[must_use]
    pub fn documents(&self) -> Arc<dyn DocumentStorePort> {
        Arc::clone(&self.documents)
    }

    /// Remote call stack.
    #[must_use]
    pub fn remote(&self) -> RemoteCallDeps {
        self.remote.clone()
    }

    /// Deps for one conversation's stakeholder replies (fresh gate).
    #[must_use]
    pub fn simulate_stakeholder_deps(&self) -> SimulateStakeholderDeps {
        SimulateStakeholderDeps {
            remote: self.remote(),
            gate: LatestOnlyGate::new(),
        }
    }

    /// Deps for evaluations, sharing the session write queue.
    #[must_use]
    pub fn evaluate_session_deps(&self) -> EvaluateSessionDeps {
        EvaluateSessionDeps {
            remote: self.remote(),
            documents: self.documents(),
            queue: self.queue.clone(),
        }
    }

    /// Deps for a session recorder, sharing the session write queue.
    #[must_use]
    pub fn session_recorder_deps(&self) -> SessionRecorderDeps {
        SessionRecorderDeps {
            documents: self.documents(),
            queue: self.queue.clone(),
            logger: Some(self.monitoring.logger()),
        }
    }

    /// Debounced coaching hints using the configured delay.
    pub fn hint_service(&self) -> InfraResult<HintService> {
        HintService::new(self.remote(), self.config.hint_delay())
    }

    /// Invoke `function` directly with retry and degraded fallback.
    pub async fn invoke(
        &self,
        ctx: &RequestContext,
        function: FunctionName,
        payload: Value,
    ) -> InfraResult<CallOutcome<Value>> {
        let result = invoke_with_fallback(ctx, &self.remote, function, payload).await;
        if let Err(error) = &result {
            if !error.is_cancelled() {
                self.monitoring.capture_error("infra.invoke.failed", error);
            }
        }
        result
    }
}
