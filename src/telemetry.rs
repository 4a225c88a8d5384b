use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Stdout carries the wire protocol, so logs
/// go to stderr, or as JSON lines to `--log-file`. Later calls are no-ops.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    if config.no_logs || TRACING_INIT.get().is_some() {
        return Ok(());
    }
    let level = tracing::Level::from(config.log_level);

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            TRACING_INIT.get_or_init(|| {
                let subscriber = tracing_subscriber::fmt()
                    .json()
                    .with_max_level(level)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false)
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
            });
        }
        None => {
            TRACING_INIT.get_or_init(|| {
                let subscriber = tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
            });
        }
    }
    Ok(())
}
