//! Conversion from the config file into per-component settings.
//!
//! Each component receives only its own settings struct; nothing below the
//! CLI reads a [`ConfigFile`] directly.

use std::time::Duration;

use super::settings::ConfigFile;
use crate::queue::QueueConfig;
use crate::render::RenderConfig;
use crate::retry::RetryPolicy;
use crate::seed::SeedConfig;
use crate::store::StoreConfig;
use crate::worker::WorkerConfig;
use crate::writer::WriterConfig;

impl From<&ConfigFile> for RetryPolicy {
    fn from(config: &ConfigFile) -> Self {
        RetryPolicy::new(
            config.worker.max_retries,
            Duration::from_millis(config.worker.retry_base_delay_ms),
        )
    }
}

impl From<&ConfigFile> for QueueConfig {
    fn from(config: &ConfigFile) -> Self {
        QueueConfig {
            kind: config.queue.queue_type,
            name: config.queue.name.clone(),
            max_batch_size: config.queue.max_batch_size,
            visibility_timeout: Duration::from_secs(config.queue.visibility_timeout_secs),
        }
    }
}

impl From<&ConfigFile> for StoreConfig {
    fn from(config: &ConfigFile) -> Self {
        StoreConfig {
            kind: config.store.store_type,
            target: config.store.target.clone(),
            path: config.store.path.clone(),
            storage_class: config.store.storage_class,
        }
    }
}

impl From<&ConfigFile> for RenderConfig {
    fn from(config: &ConfigFile) -> Self {
        RenderConfig {
            url_template: config.render.url_template.clone(),
            layer: config.render.layer.clone(),
            formats: config.render.formats.clone(),
            timeout: Duration::from_secs(config.render.timeout_secs),
        }
    }
}

impl From<&ConfigFile> for SeedConfig {
    fn from(config: &ConfigFile) -> Self {
        SeedConfig {
            zoom_start: config.seed.zoom_start,
            zoom_until: config.seed.zoom_until,
            filter_metro_zoom: config.seed.filter_metro_zoom,
            unique_tiles: config.seed.unique_tiles,
        }
    }
}

impl From<&ConfigFile> for WriterConfig {
    fn from(config: &ConfigFile) -> Self {
        WriterConfig {
            expand_until_zoom: config.write.expand_until_zoom,
            retry: RetryPolicy::from(config),
        }
    }
}

impl From<&ConfigFile> for WorkerConfig {
    fn from(config: &ConfigFile) -> Self {
        WorkerConfig {
            workers: config.worker.workers,
            formats: config.render.formats.clone(),
            layer: config.render.layer.clone(),
            key_path: config.store.path.clone(),
            storage_class: config.store.storage_class,
            retry: RetryPolicy::from(config),
            poll_interval: Duration::from_millis(config.queue.poll_interval_ms),
        }
    }
}
