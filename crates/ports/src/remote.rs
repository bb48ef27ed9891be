//! Hosted callable-function boundary contract.

use crate::BoxFuture;
use rehearse_domain::FunctionName;
use rehearse_shared::{RequestContext, Result};
use serde_json::Value;

/// Identifies a remote-call implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProviderInfo {
    /// Stable provider id (`http`, `mock`, ...).
    pub id: Box<str>,
    /// Whether results from this provider stand in for the live backend.
    pub degraded: bool,
}

impl RemoteProviderInfo {
    /// Provider backed by the live backend.
    #[must_use]
    pub fn live(id: &str) -> Self {
        Self {
            id: id.into(),
            degraded: false,
        }
    }

    /// Provider producing placeholder results.
    #[must_use]
    pub fn degraded(id: &str) -> Self {
        Self {
            id: id.into(),
            degraded: true,
        }
    }
}

/// Boundary contract for invoking hosted functions.
///
/// Failures are envelopes in the `remote:` namespace (`remote:unavailable`,
/// `remote:deadline-exceeded`, ...) so the classifier can decide on retries.
pub trait RemoteCallPort: Send + Sync {
    /// Provider info for this implementation.
    fn provider(&self) -> &RemoteProviderInfo;

    /// Invoke `function` with a JSON payload and return its JSON result.
    fn invoke(
        &self,
        ctx: &RequestContext,
        function: FunctionName,
        payload: Value,
    ) -> BoxFuture<'_, Result<Value>>;
}
