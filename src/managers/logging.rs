//! Logging setup
//!
//! Steps are narrated on stderr at INFO. A daily-rolled file under the log
//! directory receives the configured level, and only the newest files are kept.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "stack-backup.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_directory: PathBuf,
    /// Level of the file output
    pub log_level: Level,
    /// Rolled files kept after startup
    pub max_files: u32,
}

impl LoggingConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            log_directory: config.log_directory.clone(),
            log_level: config.log_level.parse().unwrap_or(Level::INFO),
            max_files: config.log_max_files,
        }
    }
}

/// Keeps the background file writer alive; dropping it flushes pending lines
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

/// Install the console and file layers. `RUST_LOG` overrides both levels.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let log_dir = crate::config::expand_tilde(&config.log_directory);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter_for(config.log_level));

    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter_for(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    prune_logs(&log_dir, config.max_files)?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging for when the log directory cannot be used
pub fn init_console_logging() {
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter_for(Level::INFO))
        .try_init();
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()))
}

/// Delete all but the `keep` newest rolled files. Rolled names end in the
/// date, so name order is age order.
fn prune_logs(log_dir: &Path, keep: u32) -> Result<()> {
    let mut rolled: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_NAME))
        .map(|entry| entry.path())
        .collect();

    rolled.sort_unstable_by(|a, b| b.cmp(a));

    for path in rolled.iter().skip(keep as usize) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed old log file: {:?}", path),
            Err(e) => tracing::warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }

    Ok(())
}
