//! Test doubles for the use-case tests.

use rehearse_adapters::{JsonLogger, MemoryLogSink};
use rehearse_domain::FunctionName;
use rehearse_ports::{BoxFuture, LogLevel, LoggerPort, RemoteCallPort, RemoteProviderInfo};
use rehearse_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remote that replays scripted results in order.
pub struct ScriptedRemote {
    provider: RemoteProviderInfo,
    script: Mutex<VecDeque<Result<Value>>>,
    delays: Vec<Duration>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<Value>>,
}

impl ScriptedRemote {
    pub fn new(script: Vec<Result<Value>>) -> Self {
        Self {
            provider: RemoteProviderInfo::live("scripted"),
            script: Mutex::new(script.into()),
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Delay the Nth call (zero-based) by `delays[n]`.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_first_delay(self, delay: Duration) -> Self {
        self.with_delays(vec![delay])
    }

    pub fn unavailable() -> ErrorEnvelope {
        ErrorEnvelope::remote("unavailable", "backend unavailable", ErrorClass::Retriable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl RemoteCallPort for ScriptedRemote {
    fn provider(&self) -> &RemoteProviderInfo {
        &self.provider
    }

    fn invoke(
        &self,
        _ctx: &RequestContext,
        _function: FunctionName,
        payload: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.payloads.lock() {
            guard.push(payload);
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut guard| guard.pop_front())
            .unwrap_or_else(|| {
                Err(ErrorEnvelope::expected(
                    ErrorCode::internal(),
                    "script exhausted",
                ))
            });
        let delay = self.delays.get(index).copied();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next
        })
    }
}

/// JSON logger writing into memory at debug level.
pub fn memory_logger() -> (Arc<dyn LoggerPort>, MemoryLogSink) {
    let sink = MemoryLogSink::new();
    let logger = JsonLogger::new(Arc::new(sink.clone())).with_min_level(LogLevel::Debug);
    (Arc::new(logger), sink)
}

/// Event names from captured log lines, in order.
pub fn event_names(sink: &MemoryLogSink) -> Vec<String> {
    sink.take()
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .filter_map(|line| line.get("event").and_then(Value::as_str).map(str::to_string))
        .collect()
}
