//! Adapter selection from validated config.

use crate::InfraResult;
use rehearse_adapters::{
    FileKeyValueStore, HttpCallableClient, HttpCallableConfig, InMemoryKeyValueStore, JsonLogger,
    JsonTelemetry, LogSink, MockResponder, TracingLogger, TracingTelemetry,
};
use rehearse_config::{LogFormat, LoggingConfig, ValidatedAppConfig};
use rehearse_ports::{KeyValueStorePort, LogLevel, LoggerPort, RemoteCallPort, TelemetryPort};
use rehearse_shared::{ErrorCode, ErrorEnvelope};
use std::sync::Arc;

/// Build the primary remote adapter.
///
/// Without `remote.baseUrl` the offline responder is used; it reports itself
/// as degraded so every outcome is marked accordingly.
pub fn build_remote_port(config: &ValidatedAppConfig) -> InfraResult<Arc<dyn RemoteCallPort>> {
    match HttpCallableConfig::from_remote_config(&config.remote) {
        Some(http) => Ok(Arc::new(HttpCallableClient::new(&http)?)),
        None => Ok(Arc::new(MockResponder::new())),
    }
}

/// Build the degraded-mode fallback, if enabled.
#[must_use]
pub fn build_fallback_port(config: &ValidatedAppConfig) -> Option<Arc<dyn RemoteCallPort>> {
    config
        .fallback
        .enabled
        .then(|| Arc::new(MockResponder::new()) as Arc<dyn RemoteCallPort>)
}

/// Build the key-value store: file-backed when `storage.kvPath` is set.
#[must_use]
pub fn build_key_value_store(config: &ValidatedAppConfig) -> Arc<dyn KeyValueStorePort> {
    match config.storage.kv_path.as_deref() {
        Some(path) => Arc::new(FileKeyValueStore::new(path)),
        None => Arc::new(InMemoryKeyValueStore::new()),
    }
}

/// Parse the configured log level.
pub fn parse_log_level(config: &LoggingConfig) -> InfraResult<LogLevel> {
    config.level.parse::<LogLevel>().map_err(|message| {
        ErrorEnvelope::expected(ErrorCode::invalid_input(), message)
            .with_metadata("field", "logging.level")
    })
}

/// Build the logger. JSON format writes to `sink`; text format goes through `tracing`.
pub fn build_logger(
    config: &LoggingConfig,
    sink: Arc<dyn LogSink>,
) -> InfraResult<Arc<dyn LoggerPort>> {
    let level = parse_log_level(config)?;
    Ok(match config.format {
        LogFormat::Json => Arc::new(JsonLogger::new(sink).with_min_level(level)),
        LogFormat::Text => Arc::new(TracingLogger::new()),
    })
}

/// Build the telemetry sink matching the logger format.
#[must_use]
pub fn build_telemetry(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Arc<dyn TelemetryPort> {
    match config.format {
        LogFormat::Json => Arc::new(JsonTelemetry::new(sink)),
        LogFormat::Text => Arc::new(TracingTelemetry),
    }
}
