//! Classify command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use rehearse_shared::{ErrorDescriptor, classify};
use serde_json::{Map, Value};

/// Describe how an error code would be treated by the retry layer.
pub fn run_classify(
    mode: OutputMode,
    code: &str,
    message: Option<&str>,
) -> Result<CliOutput, CliError> {
    if code.trim().is_empty() {
        return Err(CliError::InvalidInput("--code must be non-empty".to_string()));
    }

    let mut fields = Map::new();
    fields.insert("code".to_string(), Value::from(code.trim()));
    if let Some(message) = message {
        fields.insert("message".to_string(), Value::from(message));
    }
    let descriptor = classify(&Value::Object(fields));

    let stdout = if mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "descriptor": descriptor,
        });
        let mut output = serde_json::to_string_pretty(&payload)?;
        output.push('\n');
        output
    } else {
        format_descriptor_text(&descriptor)
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn format_descriptor_text(descriptor: &ErrorDescriptor) -> String {
    format!(
        "status: ok\ncode: {}\nretryable: {}\nmessage: {}\nuserMessage: {}\n",
        descriptor.code, descriptor.retryable, descriptor.message, descriptor.user_message
    )
}
