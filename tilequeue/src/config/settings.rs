//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::queue::QueueKind;
use crate::render::OutputFormat;
use crate::store::{StorageClass, StoreKind};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub queue: QueueSettings,
    pub store: StoreSettings,
    pub render: RenderSettings,
    pub seed: SeedSettings,
    pub write: WriteSettings,
    pub worker: WorkerSettings,
    pub credentials: CredentialSettings,
    pub logging: LoggingSettings,
}

/// `[queue]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// "memory" or "file"
    pub queue_type: QueueKind,
    /// Queue identifier (file path for file queues)
    pub name: String,
    pub max_batch_size: usize,
    pub visibility_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// "directory" or "memory"
    pub store_type: StoreKind,
    /// Root directory for directory stores
    pub target: PathBuf,
    /// Key prefix inside the store
    pub path: String,
    pub storage_class: StorageClass,
}

/// `[render]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub url_template: String,
    pub layer: String,
    pub formats: Vec<OutputFormat>,
    pub timeout_secs: u64,
}

/// `[seed]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedSettings {
    pub zoom_start: u8,
    pub zoom_until: u8,
    /// Zoom from which seeding is restricted to metro extracts
    pub filter_metro_zoom: Option<u8>,
    pub unique_tiles: bool,
    /// Metro extract descriptor location (URL or path)
    pub metro_extract_url: Option<String>,
    /// Only these metro extract cities, if set
    pub metro_extract_cities: Option<Vec<String>>,
    /// Timeout for fetching the metro extract descriptor
    pub metro_extract_timeout_secs: u64,
    /// Extra `[west, south, east, north]` boxes seeded over their own range
    pub custom_bboxes: Vec<[f64; 4]>,
    pub custom_zoom_start: Option<u8>,
    pub custom_zoom_until: Option<u8>,
}

/// `[write]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSettings {
    pub expand_until_zoom: Option<u8>,
    pub tiles_of_interest: Option<PathBuf>,
    /// Directory of expired tile lists consumed by `intersect`
    pub expired_tiles_location: Option<PathBuf>,
    /// Most expired tile files consumed per `intersect` run
    pub max_expired_files: usize,
}

/// `[worker]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub workers: usize,
    /// Attempts per render or store call, and per enqueue batch
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// `[credentials]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialSettings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
