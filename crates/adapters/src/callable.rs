//! HTTP adapter for hosted callable functions.
//!
//! Wire format: `POST {base_url}/{function}` with body `{"data": <payload>}`.
//! Success is `{"result": <value>}`; failures carry
//! `{"error": {"status": "UNAVAILABLE", "message": "..."}}`.

use rehearse_config::RemoteConfig;
use rehearse_domain::FunctionName;
use rehearse_ports::{BoxFuture, RemoteCallPort, RemoteProviderInfo};
use rehearse_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString, ServiceErrorCode,
};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// HTTP callable client configuration.
#[derive(Debug, Clone)]
pub struct HttpCallableConfig {
    /// Base URL; the function name is appended as the last path segment.
    pub base_url: Box<str>,
    /// Transport timeout in milliseconds.
    pub timeout_ms: u64,
    /// Optional bearer token.
    pub auth_token: Option<SecretString>,
}

impl HttpCallableConfig {
    /// Build from the app's remote config. Returns `None` without a base URL.
    #[must_use]
    pub fn from_remote_config(config: &RemoteConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        Some(Self {
            base_url,
            timeout_ms: config.timeout_ms,
            auth_token: config.auth_token.clone(),
        })
    }
}

/// Callable-function client over HTTP.
pub struct HttpCallableClient {
    provider: RemoteProviderInfo,
    client: reqwest::Client,
    base_url: Box<str>,
}

impl HttpCallableClient {
    /// Create a new client.
    pub fn new(config: &HttpCallableConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "base url must be non-empty",
            ));
        }
        if config.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = config.auth_token.as_ref().filter(|token| !token.is_blank()) {
            let mut auth_header = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|_| {
                    ErrorEnvelope::expected(
                        ErrorCode::invalid_input(),
                        "auth token contains invalid header characters",
                    )
                })?;
            auth_header.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_header);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("remote", "client_init_failed"),
                    format!("failed to build HTTP client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        Ok(Self {
            provider: RemoteProviderInfo::live("http"),
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, function: FunctionName) -> String {
        format!("{}/{}", self.base_url, function.as_str())
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        function: FunctionName,
        payload: Value,
    ) -> Result<Value> {
        let operation = "http_callable.invoke";
        ctx.ensure_not_cancelled(operation)?;

        let request = CallableRequest { data: payload };
        let response = tokio::select! {
            () = ctx.cancelled() => return Err(ctx.cancellation_error(operation)),
            result = self.client.post(self.endpoint(function)).json(&request).send() => {
                result.map_err(|error| map_reqwest_error(&error, function))?
            }
        };

        let status = response.status();
        let body = tokio::select! {
            () = ctx.cancelled() => return Err(ctx.cancellation_error(operation)),
            result = response.bytes() => result.map_err(|error| map_reqwest_error(&error, function))?,
        };

        if !status.is_success() {
            return Err(map_http_error(status, &body).with_metadata("function", function.as_str()));
        }

        let parsed: CallableResponse = serde_json::from_slice(&body).map_err(|error| {
            envelope_for(
                ServiceErrorCode::Internal,
                format!("failed to decode callable response: {error}"),
            )
            .with_metadata("function", function.as_str())
        })?;

        if let Some(error) = parsed.error {
            return Err(map_callable_error(error, None).with_metadata("function", function.as_str()));
        }
        parsed.result.ok_or_else(|| {
            envelope_for(
                ServiceErrorCode::Internal,
                "callable response has neither result nor error",
            )
            .with_metadata("function", function.as_str())
        })
    }
}

impl RemoteCallPort for HttpCallableClient {
    fn provider(&self) -> &RemoteProviderInfo {
        &self.provider
    }

    fn invoke(
        &self,
        ctx: &RequestContext,
        function: FunctionName,
        payload: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.call(&ctx, function, payload).await })
    }
}

#[derive(Debug, Serialize)]
struct CallableRequest {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct CallableResponse {
    // `null` is a valid result; only a missing key is malformed.
    #[serde(default, deserialize_with = "present_value")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<CallableError>,
}

fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct CallableErrorResponse {
    error: CallableError,
}

#[derive(Debug, Deserialize)]
struct CallableError {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn envelope_for(code: ServiceErrorCode, message: impl Into<String>) -> ErrorEnvelope {
    let class = if code.is_retryable() {
        ErrorClass::Retriable
    } else {
        ErrorClass::NonRetriable
    };
    ErrorEnvelope::remote(code.as_str(), message, class)
}

fn map_reqwest_error(error: &reqwest::Error, function: FunctionName) -> ErrorEnvelope {
    let envelope = if error.is_timeout() {
        envelope_for(
            ServiceErrorCode::DeadlineExceeded,
            "callable request timed out",
        )
    } else if error.is_connect() || error.is_request() {
        envelope_for(
            ServiceErrorCode::NetworkRequestFailed,
            format!("callable connection failed: {error}"),
        )
    } else {
        envelope_for(
            ServiceErrorCode::Internal,
            format!("callable request failed: {error}"),
        )
    };
    envelope.with_metadata("function", function.as_str())
}

/// Map an HTTP status without a usable error body.
fn code_for_status(status: StatusCode) -> ServiceErrorCode {
    match status.as_u16() {
        400 | 422 => ServiceErrorCode::InvalidArgument,
        401 => ServiceErrorCode::Unauthenticated,
        403 => ServiceErrorCode::PermissionDenied,
        404 => ServiceErrorCode::NotFound,
        408 | 504 => ServiceErrorCode::DeadlineExceeded,
        409 => ServiceErrorCode::AlreadyExists,
        429 => ServiceErrorCode::ResourceExhausted,
        502 | 503 => ServiceErrorCode::Unavailable,
        _ => ServiceErrorCode::Internal,
    }
}

fn map_callable_error(error: CallableError, status: Option<StatusCode>) -> ErrorEnvelope {
    let parsed = error.status.as_deref().and_then(ServiceErrorCode::parse);
    let code = parsed
        .or_else(|| status.map(code_for_status))
        .unwrap_or(ServiceErrorCode::Internal);
    let message = error
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("callable failed with {}", code.as_str()));

    let mut envelope = envelope_for(code, message);
    if let Some(raw) = error.status {
        envelope = envelope.with_metadata("remote_status", raw);
    }
    envelope
}

fn map_http_error(status: StatusCode, body: &[u8]) -> ErrorEnvelope {
    let envelope = match serde_json::from_slice::<CallableErrorResponse>(body) {
        Ok(parsed) => map_callable_error(parsed.error, Some(status)),
        Err(_) => envelope_for(
            code_for_status(status),
            format!("callable failed with HTTP {}", status.as_u16()),
        ),
    };
    envelope.with_metadata("http_status", status.as_u16().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_shared::classify;
    use serde_json::json;

    #[test]
    fn request_wraps_payload_in_data() -> std::result::Result<(), serde_json::Error> {
        let request = CallableRequest {
            data: json!({ "message": "hi" }),
        };
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({ "data": { "message": "hi" } })
        );
        Ok(())
    }

    #[test]
    fn error_status_takes_precedence_over_http_status() -> std::result::Result<(), serde_json::Error>
    {
        let body = serde_json::to_vec(&json!({
            "error": { "status": "RESOURCE_EXHAUSTED", "message": "quota" }
        }))?;
        let envelope = map_http_error(StatusCode::INTERNAL_SERVER_ERROR, &body);

        assert_eq!(envelope.code, ErrorCode::remote("resource-exhausted"));
        assert_eq!(envelope.class, ErrorClass::Retriable);
        assert_eq!(envelope.message, "quota");
        assert_eq!(
            envelope.metadata.get("http_status").map(String::as_str),
            Some("500")
        );
        assert!(classify(&envelope).retryable);
        Ok(())
    }

    #[test]
    fn non_json_errors_fall_back_to_http_status() {
        let envelope = map_http_error(StatusCode::SERVICE_UNAVAILABLE, b"<html>down</html>");
        assert_eq!(envelope.code, ErrorCode::remote("unavailable"));
        assert!(classify(&envelope).retryable);

        let envelope = map_http_error(StatusCode::FORBIDDEN, b"");
        assert_eq!(envelope.code, ErrorCode::remote("permission-denied"));
        assert!(!classify(&envelope).retryable);
    }

    #[test]
    fn unknown_error_status_uses_http_status() {
        let error = CallableError {
            status: Some("TEAPOT".to_string()),
            message: None,
        };
        let envelope = map_callable_error(error, Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(envelope.code, ErrorCode::remote("resource-exhausted"));
        assert_eq!(
            envelope.metadata.get("remote_status").map(String::as_str),
            Some("TEAPOT")
        );
    }

    #[test]
    fn config_without_base_url_builds_nothing() {
        assert!(HttpCallableConfig::from_remote_config(&RemoteConfig::default()).is_none());
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = HttpCallableConfig {
            base_url: "http://localhost".into(),
            timeout_ms: 0,
            auth_token: None,
        };
        let error = HttpCallableClient::new(&config).err();
        assert_eq!(error.map(|error| error.code), Some(ErrorCode::invalid_input()));
    }
}
