//! Tracing subscriber setup.
//!
//! Console output always; a daily rolling file under the logs directory when
//! [`LogConfig::file`] is set. `RUST_LOG` overrides the configured filter.

use crate::config::LogConfig;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Log file name prefix; the appender adds the date suffix.
pub const LOG_FILE_PREFIX: &str = "bloom.log";

/// Directory log files are written to.
pub fn log_dir(config: &LogConfig) -> PathBuf {
    config
        .dir
        .clone()
        .unwrap_or_else(crate::bloom_dirs::logs_dir)
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("bloom=info"))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer. Calling this twice is a no-op.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console);

    if !config.file {
        let _ = registry.try_init();
        return None;
    }

    let dir = log_dir(config);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        let _ = registry.try_init();
        tracing::warn!("file logging disabled, cannot create {}: {e}", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    let _ = registry.with(file).try_init();
    Some(guard)
}
