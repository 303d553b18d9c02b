//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilequeue::config::{ConfigFileError, CredentialsError};
use tilequeue::queue::QueueError;
use tilequeue::render::RenderError;
use tilequeue::seed::SeedError;
use tilequeue::store::StoreError;
use tilequeue::worker::WorkerError;
use tilequeue::writer::WriteError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load the configuration file
    ConfigFile(ConfigFileError),
    /// Credentials were only partly supplied
    Credentials(CredentialsError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Seeding failed
    Seed(SeedError),
    /// Writing a tile list failed
    Write(WriteError),
    /// A queue operation failed
    Queue(QueueError),
    /// Failed to set up the renderer
    Renderer(RenderError),
    /// The blob store cannot take writes
    Store(StoreError),
    /// Failed to set up the worker pool
    Worker(WorkerError),
    /// Failed to open an input file
    FileRead { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Check the configuration file, or show the effective settings with:");
                eprintln!("  tilequeue config show");
            }
            CliError::Credentials(_) => {
                eprintln!();
                eprintln!("Supply both halves of the key pair, either:");
                eprintln!("  1. in the [credentials] section of config.ini");
                eprintln!("  2. via TILEQUEUE_ACCESS_KEY_ID and TILEQUEUE_SECRET_ACCESS_KEY");
                eprintln!("  3. with --access-key-id and --secret-access-key");
            }
            CliError::Seed(SeedError::Region(_)) => {
                eprintln!();
                eprintln!("Metro extract regions could not be loaded. Check:");
                eprintln!("  1. seed.metro_extract_url points at a reachable descriptor");
                eprintln!("  2. every city entry has a bbox or polygon");
            }
            CliError::Queue(QueueError::Unavailable { .. })
            | CliError::Seed(SeedError::Enqueue(_))
            | CliError::Write(WriteError::Enqueue(_)) => {
                eprintln!();
                eprintln!("The queue could not be reached. For file queues make sure the");
                eprintln!("directory holding queue.name exists and is writable.");
            }
            CliError::Store(_) => {
                eprintln!();
                eprintln!("The blob store is not writable. Check that store.target names a");
                eprintln!("directory this user can create and write to.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Credentials(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Seed(e) => write!(f, "Seeding failed: {}", e),
            CliError::Write(e) => write!(f, "{}", e),
            CliError::Queue(e) => write!(f, "Queue error: {}", e),
            CliError::Renderer(e) => write!(f, "Failed to create renderer: {}", e),
            CliError::Store(e) => write!(f, "Blob store unreachable: {}", e),
            CliError::Worker(e) => write!(f, "Failed to start workers: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Credentials(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Seed(e) => Some(e),
            CliError::Write(e) => Some(e),
            CliError::Queue(e) => Some(e),
            CliError::Renderer(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Worker(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<CredentialsError> for CliError {
    fn from(e: CredentialsError) -> Self {
        CliError::Credentials(e)
    }
}

impl From<SeedError> for CliError {
    fn from(e: SeedError) -> Self {
        CliError::Seed(e)
    }
}

impl From<WriteError> for CliError {
    fn from(e: WriteError) -> Self {
        CliError::Write(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<QueueError> for CliError {
    fn from(e: QueueError) -> Self {
        CliError::Queue(e)
    }
}
