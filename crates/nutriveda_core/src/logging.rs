use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::NutrivedaConfig;

/// Default per-crate directives appended to the configured base level.
const CRATE_DIRECTIVES: &str = "nutriveda_app=debug,nutriveda_export=debug,nutriveda_docs=debug";

/// Builds the filter string for a base level such as `"info"`.
fn filter_for(level: &str) -> String {
    format!("{level},{CRATE_DIRECTIVES}")
}

/// Initializes the logging system with file + console output.
/// Returns a guard that must be kept alive for the duration of the app.
pub fn init_logging(config: &NutrivedaConfig) -> Result<WorkerGuard> {
    let logs_dir = NutrivedaConfig::logs_dir()?;
    install(&logs_dir, &filter_for(&config.log_level))
}

/// `RUST_LOG` wins over `default_filter` when set.
fn install(logs_dir: &Path, default_filter: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory: {}", logs_dir.display()))?;

    // File appender: daily rotation
    let file_appender = tracing_appender::rolling::daily(logs_dir, "nutriveda");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}
