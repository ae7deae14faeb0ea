//! Logging - console on stderr plus a daily log file
//!
//! stdout belongs to the JSON that `controls` and `render` print, so nothing
//! here writes to it.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of the rotated files: energy_dashboard.log.YYYY-MM-DD
pub const LOG_FILE: &str = "energy_dashboard.log";

/// Used when RUST_LOG is unset
const DEFAULT_FILTER: &str = "info,energy_dashboard=debug,tower_http=debug";

/// Install the global subscriber. Buffered file lines are flushed when the
/// returned guard drops, so the caller holds it until exit.
pub fn init_logging(log_dir: impl AsRef<Path>) -> std::io::Result<WorkerGuard> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(std::io::Error::other)?;

    tracing::info!("Logging to stderr and {}", log_dir.join(LOG_FILE).display());
    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
