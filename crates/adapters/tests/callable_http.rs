// HTTP callable adapter integration tests.
#![allow(missing_docs)]

#[cfg(feature = "http")]
mod http {
    use rehearse_adapters::{HttpCallableClient, HttpCallableConfig};
    use rehearse_ports::{FunctionName, RemoteCallPort};
    use rehearse_shared::{ErrorClass, ErrorCode, RequestContext, Result, SecretString, classify};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> Result<HttpCallableClient> {
        HttpCallableClient::new(&HttpCallableConfig {
            base_url: format!("{}/", server.uri()).into(),
            timeout_ms: 2_000,
            auth_token: token.map(SecretString::new),
        })
    }

    #[tokio::test]
    async fn invoke_posts_data_and_returns_result() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/simulateStakeholder"))
            .and(header("authorization", "Bearer example"))
            .and(body_json(json!({ "data": { "sessionId": "s1", "message": "hi" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "reply": "Hello there.", "sessionEnded": false }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("example"))?;
        assert!(!client.provider().degraded);
        let value = client
            .invoke(
                &RequestContext::new_request(),
                FunctionName::SimulateStakeholder,
                json!({ "sessionId": "s1", "message": "hi" }),
            )
            .await?;
        assert_eq!(value["reply"], "Hello there.");
        Ok(())
    }

    #[tokio::test]
    async fn error_body_status_maps_to_service_code() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/evaluateSession"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "status": "PERMISSION_DENIED", "message": "session belongs to another user" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None)?;
        let error = client
            .invoke(
                &RequestContext::new_request(),
                FunctionName::EvaluateSession,
                json!({ "sessionId": "s1" }),
            )
            .await
            .err()
            .ok_or_else(|| rehearse_shared::ErrorEnvelope::expected(ErrorCode::internal(), "expected failure"))?;

        assert_eq!(error.code, ErrorCode::remote("permission-denied"));
        assert_eq!(error.message, "session belongs to another user");
        assert_eq!(
            error.metadata.get("function").map(String::as_str),
            Some("evaluateSession")
        );
        assert!(!classify(&error).retryable);
        Ok(())
    }

    #[tokio::test]
    async fn service_unavailable_is_retryable() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getCoachingHint"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server, None)?;
        let error = client
            .invoke(
                &RequestContext::new_request(),
                FunctionName::GetCoachingHint,
                json!({}),
            )
            .await
            .err()
            .ok_or_else(|| rehearse_shared::ErrorEnvelope::expected(ErrorCode::internal(), "expected failure"))?;

        assert_eq!(error.code, ErrorCode::remote("unavailable"));
        assert!(classify(&error).retryable);
        Ok(())
    }

    async fn invoke_with_body(body: &'static str) -> Result<Result<serde_json::Value>> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getCoachingHint"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = client_for(&server, None)?;
        Ok(client
            .invoke(
                &RequestContext::new_request(),
                FunctionName::GetCoachingHint,
                json!({}),
            )
            .await)
    }

    #[tokio::test]
    async fn undecodable_body_is_retriable_internal() -> Result<()> {
        let error = invoke_with_body("<html>gateway</html>")
            .await?
            .err()
            .ok_or_else(|| rehearse_shared::ErrorEnvelope::expected(ErrorCode::internal(), "expected failure"))?;

        assert_eq!(error.code, ErrorCode::remote("internal"));
        assert_eq!(error.class, ErrorClass::Retriable);
        assert!(classify(&error).retryable);
        Ok(())
    }

    #[tokio::test]
    async fn body_without_result_is_retriable_internal() -> Result<()> {
        let error = invoke_with_body("{}")
            .await?
            .err()
            .ok_or_else(|| rehearse_shared::ErrorEnvelope::expected(ErrorCode::internal(), "expected failure"))?;

        assert_eq!(error.code, ErrorCode::remote("internal"));
        assert_eq!(error.class, ErrorClass::Retriable);
        assert_eq!(
            error.metadata.get("function").map(String::as_str),
            Some("getCoachingHint")
        );
        Ok(())
    }

    #[tokio::test]
    async fn explicit_null_result_is_returned() -> Result<()> {
        let value = invoke_with_body(r#"{ "result": null }"#).await??;
        assert!(value.is_null());
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/simulateStakeholder"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": {} }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None)?;
        let ctx = RequestContext::new_request();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = client
            .invoke(&ctx, FunctionName::SimulateStakeholder, json!({}))
            .await;
        assert!(result.is_err_and(|error| error.is_cancelled()));
        Ok(())
    }
}
