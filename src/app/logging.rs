use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

pub const LOG_FILE: &str = "cloudplay.log";

/// Route `tracing` output to `<dir>/cloudplay.log` so the terminal stays
/// clean. Keep the guard alive until exit or buffered lines are lost.
pub fn init(dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))?;

    Ok(guard)
}
