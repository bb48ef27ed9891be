//! `tracing` subscriber setup.

use rehearse_config::LogFormat;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(format: LogFormat, level: &str) -> Result<(), TryInitError> {
    let default_level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let registry = Registry::default().with(filter);

    match format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry.with(layer).try_init(),
    }
}
