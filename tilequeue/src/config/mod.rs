//! Application configuration.
//!
//! Settings are read from an INI file (by default `~/.tilequeue/config.ini`)
//! into a [`ConfigFile`], then converted into the per-component settings each
//! part of the pipeline takes.
//!
//! # Example
//!
//! ```
//! use tilequeue::config::ConfigFile;
//! use tilequeue::seed::SeedConfig;
//! use tilequeue::worker::WorkerConfig;
//!
//! let config = ConfigFile::default();
//! let seed = SeedConfig::from(&config);
//! let worker = WorkerConfig::from(&config);
//!
//! assert_eq!(seed.zoom_until, 10);
//! assert!(worker.workers >= 1);
//! ```

mod components;
mod credentials;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use credentials::{
    Credentials, CredentialsError, ACCESS_KEY_ID_ENV, SECRET_ACCESS_KEY_ENV,
};
pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
