//! Structured logging bootstrap: `tracing` + `tracing-subscriber` with
//! an `EnvFilter` and optional JSON formatting, initialized once from
//! the binary's composition root (spec §2's ambient Logging addition).

use tracing_subscriber::{fmt, EnvFilter};

use gridbase_domain::error::{Error, Result};

/// Keeps the non-blocking file writer alive for the process lifetime;
/// dropping it stops log flushing, so the composition root must hold
/// this until shutdown.
pub struct LogGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

/// Output format for the process's log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored when stdout is a TTY.
    Pretty,
    /// One JSON object per line, for log aggregators.
    Json,
}

/// Initialize the global `tracing` subscriber.
///
/// `RUST_LOG` (or `default_level` if unset) drives the filter. Safe to
/// call at most once per process; a second call returns
/// [`Error::Internal`] rather than panicking, since
/// `tracing::subscriber::set_global_default` can only succeed once.
///
/// # Errors
///
/// Returns [`Error::Internal`] if a global subscriber is already
/// installed.
pub fn init_logging(format: LogFormat, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_owned()));

    let result = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    result.map_err(|err| Error::Internal {
        message: format!("failed to install global tracing subscriber: {err}"),
    })
}

/// Like [`init_logging`], but also tees output to a daily-rotating file
/// under `log_dir` (file name prefix `gridbase`). Returns a
/// [`LogGuard`] the caller must keep alive for the process lifetime.
///
/// # Errors
///
/// Returns [`Error::Internal`] if a global subscriber is already
/// installed.
pub fn init_logging_with_file(
    format: LogFormat,
    default_level: &str,
    log_dir: &std::path::Path,
) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_owned()));

    let file_appender = tracing_appender::rolling::daily(log_dir, "gridbase");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let result = match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .try_init(),
    };

    result
        .map_err(|err| Error::Internal {
            message: format!("failed to install global tracing subscriber: {err}"),
        })
        .map(|()| LogGuard(guard))
}
