//! Invoke command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::telemetry::init_tracing;
use crate::{CliOutput, format_error_output, log_info};
use rehearse_app::CallOutcome;
use rehearse_config::{ValidatedAppConfig, load_app_config_from_path};
use rehearse_domain::FunctionName;
use rehearse_infra::{AppRuntime, InfraResult, validate_env_parsing};
use rehearse_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Inputs for the invoke command.
pub struct InvokeCommandInput<'a> {
    pub function: &'a str,
    pub payload_json: &'a str,
    pub config_path: Option<&'a Path>,
    pub overrides_json: Option<&'a str>,
}

/// Call one hosted function with retry and degraded fallback.
pub fn run_invoke(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    input: &InvokeCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let (function, payload, config) = match prepare(env, input) {
        Ok(prepared) => prepared,
        Err(error) => return Ok(format_error_output(mode, &error, ExitCode::InvalidInput)),
    };

    let mut stderr = String::new();
    if let Err(error) = init_tracing(config.logging.format, &config.logging.level) {
        log_info(
            &mut stderr,
            &format!("tracing already configured: {error}"),
            mode.no_progress,
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(invoke(config, function, payload));

    match outcome {
        Ok(outcome) => {
            log_info(&mut stderr, "invoke completed", mode.no_progress);
            Ok(CliOutput {
                stdout: format_outcome(mode, function, &outcome)?,
                stderr,
                exit_code: ExitCode::Ok,
            })
        },
        Err(error) => Ok(format_error_output(
            mode,
            &error,
            ExitCode::for_envelope(&error),
        )),
    }
}

fn prepare(
    env: &BTreeMap<String, String>,
    input: &InvokeCommandInput<'_>,
) -> InfraResult<(FunctionName, Value, ValidatedAppConfig)> {
    let function = FunctionName::parse(input.function).map_err(ErrorEnvelope::from)?;
    let payload: Value = serde_json::from_str(input.payload_json).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("invalid payload JSON: {error}"),
        )
        .with_metadata("source", "payload")
    })?;
    let env = validate_env_parsing(env)?;
    let config = load_app_config_from_path(input.config_path, input.overrides_json, &env)?;
    Ok((function, payload, config))
}

async fn invoke(
    config: ValidatedAppConfig,
    function: FunctionName,
    payload: Value,
) -> InfraResult<CallOutcome<Value>> {
    let runtime = AppRuntime::build(config)?;
    runtime.monitoring().initialize("cli")?;

    let ctx = RequestContext::new_request();
    let interrupt = ctx.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let result = runtime.invoke(&ctx, function, payload).await;
    watcher.abort();
    result
}

fn format_outcome(
    mode: OutputMode,
    function: FunctionName,
    outcome: &CallOutcome<Value>,
) -> Result<String, CliError> {
    if mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "function": function.as_str(),
            "outcome": outcome.label(),
            "degradedReason": outcome.degraded_reason(),
            "result": outcome.value(),
        });
        let mut output = serde_json::to_string_pretty(&payload)?;
        output.push('\n');
        return Ok(output);
    }

    let mut out = format!(
        "status: ok\nfunction: {}\noutcome: {}\n",
        function.as_str(),
        outcome.label()
    );
    if let Some(reason) = outcome.degraded_reason() {
        out.push_str(&format!("reason: {}\n", reason.code));
        out.push_str(&format!("userMessage: {}\n", reason.user_message));
    }
    if let Some(value) = outcome.value() {
        out.push_str("result: ");
        out.push_str(&serde_json::to_string(value)?);
        out.push('\n');
    }
    Ok(out)
}
