//! Default values for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::file::config_directory;
use super::settings::*;
use crate::queue::{QueueKind, DEFAULT_MAX_BATCH_SIZE};
use crate::render::DEFAULT_FORMATS;
use crate::store::{StorageClass, StoreKind};
use crate::writer::DEFAULT_EXPIRED_FILES_CAP;

pub const DEFAULT_QUEUE_FILE: &str = "queue.txt";
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_STORE_DIR: &str = "tiles";
pub const DEFAULT_LAYER: &str = "all";
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_ZOOM_START: u8 = 0;
pub const DEFAULT_ZOOM_UNTIL: u8 = 10;
pub const DEFAULT_METRO_EXTRACT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default worker count: one per CPU core.
pub fn default_workers() -> usize {
    crate::worker::default_workers()
}

impl Default for ConfigFile {
    fn default() -> Self {
        let base = config_directory();
        Self {
            queue: QueueSettings {
                queue_type: QueueKind::File,
                name: base.join(DEFAULT_QUEUE_FILE).display().to_string(),
                max_batch_size: DEFAULT_MAX_BATCH_SIZE,
                visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            },
            store: StoreSettings {
                store_type: StoreKind::Directory,
                target: base.join(DEFAULT_STORE_DIR),
                path: String::new(),
                storage_class: StorageClass::Standard,
            },
            render: RenderSettings {
                url_template: crate::render::DEFAULT_URL_TEMPLATE.to_string(),
                layer: DEFAULT_LAYER.to_string(),
                formats: DEFAULT_FORMATS.to_vec(),
                timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            },
            seed: SeedSettings {
                zoom_start: DEFAULT_ZOOM_START,
                zoom_until: DEFAULT_ZOOM_UNTIL,
                filter_metro_zoom: None,
                unique_tiles: true,
                metro_extract_url: None,
                metro_extract_cities: None,
                metro_extract_timeout_secs: DEFAULT_METRO_EXTRACT_TIMEOUT_SECS,
                custom_bboxes: Vec::new(),
                custom_zoom_start: None,
                custom_zoom_until: None,
            },
            write: WriteSettings {
                expand_until_zoom: None,
                tiles_of_interest: None,
                expired_tiles_location: None,
                max_expired_files: DEFAULT_EXPIRED_FILES_CAP,
            },
            worker: WorkerSettings {
                workers: default_workers(),
                max_retries: DEFAULT_MAX_RETRIES,
                retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            },
            credentials: CredentialSettings::default(),
            logging: LoggingSettings {
                file: base
                    .join(DEFAULT_LOG_DIR)
                    .join(crate::logging::DEFAULT_LOG_FILE),
            },
        }
    }
}
