//! Per-job render and store state machine.
//!
//! A job moves through `RECEIVED -> RENDERING(format) -> STORING(format) ->
//! DONE` once per requested format, with `FAILED(format)` possible at either
//! stage. Formats are independent: a failure in one never stops the others.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ProcessingStats, WorkerConfig};
use crate::coord::TileCoord;
use crate::render::{OutputFormat, RenderError, Renderer};
use crate::retry::retry_with_backoff;
use crate::store::{BlobStore, StorageKey, StoreError, StoreOptions};

/// Where a format failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Render,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render => f.write_str("render"),
            Self::Store => f.write_str("store"),
        }
    }
}

/// One format that could not be produced for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFailure {
    pub format: OutputFormat,
    pub stage: FailureStage,
    pub error: String,
}

/// Result of processing one job across all requested formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub tile: TileCoord,
    /// Formats written, with the key each was written under
    pub stored: Vec<(OutputFormat, StorageKey)>,
    pub failures: Vec<FormatFailure>,
}

impl JobOutcome {
    /// A job is acknowledged once any format has been stored. A job where
    /// every format failed is left for redelivery.
    pub fn should_ack(&self) -> bool {
        !self.stored.is_empty()
    }

    /// Every requested format was stored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders a tile in every configured format and stores each result.
pub struct JobProcessor<R: Renderer, S: BlobStore> {
    renderer: Arc<R>,
    store: Arc<S>,
    config: WorkerConfig,
    stats: Arc<ProcessingStats>,
}

impl<R: Renderer, S: BlobStore> JobProcessor<R, S> {
    pub fn new(
        renderer: Arc<R>,
        store: Arc<S>,
        config: WorkerConfig,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Self {
            renderer,
            store,
            config,
            stats,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs every format through render then store.
    pub async fn process(&self, tile: TileCoord) -> JobOutcome {
        let mut outcome = JobOutcome {
            tile,
            stored: Vec::with_capacity(self.config.formats.len()),
            failures: Vec::new(),
        };

        for &format in &self.config.formats {
            match self.process_format(tile, format).await {
                Ok(key) => {
                    self.stats.format_stored();
                    outcome.stored.push((format, key));
                }
                Err(failure) => {
                    match failure.stage {
                        FailureStage::Render => self.stats.render_failed(),
                        FailureStage::Store => self.stats.store_failed(),
                    }
                    warn!(
                        tile = %tile,
                        format = %format,
                        stage = %failure.stage,
                        error = %failure.error,
                        "Format failed"
                    );
                    outcome.failures.push(failure);
                }
            }
        }
        outcome
    }

    async fn process_format(
        &self,
        tile: TileCoord,
        format: OutputFormat,
    ) -> Result<StorageKey, FormatFailure> {
        let failure = |stage, error: String| FormatFailure {
            format,
            stage,
            error,
        };
        let renderer = self.renderer.as_ref();
        let store = self.store.as_ref();

        let rendered = retry_with_backoff(
            &self.config.retry,
            "render",
            |e: &RenderError| e.is_retryable,
            move || renderer.render(tile, format),
        )
        .await;
        self.stats.retried(rendered.retries);
        let payload = rendered
            .result
            .map_err(|e| failure(FailureStage::Render, e.to_string()))?;

        let key = StorageKey::new(&self.config.key_path, &self.config.layer, tile, format);
        let options = StoreOptions {
            storage_class: self.config.storage_class,
            content_type: Some(format.content_type()),
        };
        let (key_ref, payload_ref, options_ref) = (&key, payload.as_slice(), &options);
        let stored = retry_with_backoff(
            &self.config.retry,
            "store",
            StoreError::is_retryable,
            move || store.put(key_ref, payload_ref, options_ref),
        )
        .await;
        self.stats.retried(stored.retries);
        stored
            .result
            .map_err(|e| failure(FailureStage::Store, e.to_string()))?;

        debug!(tile = %tile, format = %format, key = %key, bytes = payload.len(), "Format stored");
        Ok(key)
    }
}
