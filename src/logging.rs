//! Subscriber setup for the binaries.
//!
//! Everything is driven by [`LogConfig`]: a stderr layer filtered by
//! `level`, plus a daily-rotated `scheduler.log` under `dir` when
//! `file_logs` is set. The library itself only emits events.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "scheduler.log";

/// Keeps the non-blocking file writer alive; drop it last
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Directory for rotated log files, if file logging is on
pub fn file_log_dir(config: &LogConfig) -> Option<PathBuf> {
    let dir = config.dir.trim();
    if !config.file_logs || dir.is_empty() {
        return None;
    }
    Some(PathBuf::from(dir))
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Binaries only; the library never calls this.
pub fn init_tracing(config: &LogConfig) -> Option<FileLogGuard> {
    let env_filter = env_filter(&config.level);
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let file_writer = file_log_dir(config).and_then(|dir| match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &dir,
            LOG_FILE_PREFIX,
        ))),
        Err(err) => {
            eprintln!("failed to create log directory {}: {err}", dir.display());
            None
        }
    });

    match file_writer {
        Some((writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(FileLogGuard { _guard: guard })
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
