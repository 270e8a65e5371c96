use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_NAME: &str = "ratelimiter.log";

/// Installs the global subscriber, writing to `dir/ratelimiter.log`.
///
/// The dashboard owns the terminal in raw mode, so nothing is logged to
/// stdout or stderr. Filtering follows `RUST_LOG` and defaults to `info`.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(guard)
}
