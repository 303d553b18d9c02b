//! Logging setup.
//!
//! Structured `tracing` output to a log file, optionally mirrored to stdout:
//! - Writes to `~/.tilequeue/logs/tilequeue.log` by default (cleared on start)
//! - Compact single-line format, one event per line
//! - Level from `RUST_LOG`, defaulting to `info` (`debug` with the debug flag)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "tilequeue.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Output options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Mirror events to stdout
    pub stdout: bool,
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset
    pub debug: bool,
}

impl LogOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Initializes the global subscriber.
///
/// Creates `log_dir` if needed and truncates any previous log file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// cleared.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    options: LogOptions,
) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_target(false)
            .compact()
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_level()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be set once per process, so these
    // tests cover file preparation only.

    #[test]
    fn test_creates_nested_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("deep/nested/logs");

        let path = prepare_log_file(&log_dir, "test.log").unwrap();

        assert!(log_dir.exists());
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_clears_existing_file() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("test.log");
        fs::write(&log_path, "old log data").unwrap();

        prepare_log_file(dir.path(), "test.log").unwrap();

        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn test_default_level_follows_debug_flag() {
        assert_eq!(LogOptions::default().default_level(), "info");
        let stdout_only = LogOptions {
            stdout: true,
            debug: false,
        };
        assert_eq!(stdout_only.default_level(), "info");
        let debug = LogOptions {
            stdout: false,
            debug: true,
        };
        assert_eq!(debug.default_level(), "debug");
        assert!(EnvFilter::try_new(debug.default_level()).is_ok());
    }
}
