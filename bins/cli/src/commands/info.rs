//! Info command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use rehearse_app::app_crate_version;
use rehearse_config::config_crate_version;
use rehearse_infra::infra_crate_version;
use rehearse_shared::shared_crate_version;

struct CrateVersions {
    app: &'static str,
    config: &'static str,
    infra: &'static str,
    shared: &'static str,
}

impl CrateVersions {
    const fn current() -> Self {
        Self {
            app: app_crate_version(),
            config: config_crate_version(),
            infra: infra_crate_version(),
            shared: shared_crate_version(),
        }
    }
}

/// Run the info command.
pub fn run_info(mode: OutputMode) -> Result<CliOutput, CliError> {
    let versions = CrateVersions::current();

    let stdout = if mode.is_json() {
        format_info_json(&versions)?
    } else {
        format_info_text(&versions)
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn format_info_text(versions: &CrateVersions) -> String {
    format!(
        "status: ok\nname: {}\nversion: {}\napp: {}\nconfig: {}\ninfra: {}\nshared: {}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        versions.app,
        versions.config,
        versions.infra,
        versions.shared,
    )
}

fn format_info_json(versions: &CrateVersions) -> Result<String, CliError> {
    let payload = serde_json::json!({
        "status": "ok",
        "build": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "appVersion": versions.app,
            "configVersion": versions.config,
            "infraVersion": versions.infra,
            "sharedVersion": versions.shared,
        }
    });
    let mut output = serde_json::to_string_pretty(&payload)?;
    output.push('\n');
    Ok(output)
}
