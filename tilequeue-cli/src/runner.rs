//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, credential resolution, logging
//! initialization and the async runtime so command handlers only deal with
//! their own work.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tilequeue::config::{CredentialSettings, ConfigFile, Credentials};
use tilequeue::logging::{init_logging, LogOptions, LoggingGuard, DEFAULT_LOG_FILE};
use tilequeue::queue::{FileQueue, QueueConfig, QueueKind};

use crate::error::CliError;

/// Flags accepted by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Load the config file named by `--config`, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    credentials: Option<Credentials>,
    runtime: Runtime,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// Log events always go to the configured log file; with `--debug` they
    /// are also mirrored to stdout at debug level.
    pub fn new(args: &GlobalArgs) -> Result<Self, CliError> {
        let config = load_config(args.config.as_deref())?;

        let overrides = CredentialSettings {
            access_key_id: args.access_key_id.clone(),
            secret_access_key: args.secret_access_key.clone(),
        };
        let credentials = Credentials::resolve(&config.credentials, &overrides)?;

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        let options = LogOptions {
            stdout: args.debug,
            debug: args.debug,
        };
        let logging_guard = init_logging(log_dir, &log_file, options)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            logging_guard,
            config,
            credentials,
            runtime,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Credentials resolved from environment, config file and flags.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilequeue v{}", tilequeue::VERSION);
        info!("tilequeue CLI: {} command", command);
    }

    /// Run a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Token cancelled on Ctrl-C, and on SIGTERM or SIGQUIT on Unix.
    pub fn shutdown_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let trigger = token.clone();
        self.runtime.spawn(async move {
            match shutdown_signal().await {
                Ok(signal) => {
                    info!(signal, "Shutdown signal received, finishing current jobs");
                    println!("\nShutting down after current jobs...");
                }
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signals"),
            }
            trigger.cancel();
        });
        token
    }

    /// Open the configured queue for a command run in its own process.
    ///
    /// Only the file queue is shared between processes; a memory queue would
    /// vanish when the command exits, so it is rejected here.
    pub fn open_queue(&self) -> Result<FileQueue, CliError> {
        let queue_config = QueueConfig::from(&self.config);
        match queue_config.kind {
            QueueKind::File => {
                let queue = queue_config.file_queue();
                if let Some(parent) = queue.path().parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        CliError::Config(format!(
                            "Cannot create queue directory '{}': {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                info!(queue = %queue_config.name, "Using file queue");
                Ok(queue)
            }
            QueueKind::Memory => Err(CliError::Config(
                "queue.type = memory only lives inside a single process; \
                 set queue.type = file to share jobs between commands"
                    .to_string(),
            )),
        }
    }
}

/// Waits for the first shutdown signal and returns its name.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = quit.recv() => Ok("SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_ends_shutdown_wait() {
        let waiter = tokio::spawn(shutdown_signal());
        // Let the handlers register before raising the signal
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let signal = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(signal, "SIGTERM");
    }
}
