//! Enqueueing externally supplied tile lists.
//!
//! [`QueueWriter`] reads `zoom/column/row` lines (the format written by
//! expired tile list producers), skips and counts lines that fail to parse,
//! and submits the rest to the queue in bounded batches.

mod expand;
mod expired;

pub use expand::{explode_and_intersect, load_tiles_of_interest};
pub use expired::{list_expired_files, read_tile_files, remove_consumed, DEFAULT_EXPIRED_FILES_CAP};

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::coord::TileCoord;
use crate::queue::{enqueue_all, Queue, QueueError};
use crate::retry::RetryPolicy;

/// Errors that stop a write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    /// Every non-blank line failed to parse
    #[error("No valid tiles in input ({parse_failures} lines failed to parse)")]
    NoValidTiles { parse_failures: usize },

    /// A batch could not be submitted after retrying
    #[error("Failed to enqueue tiles: {0}")]
    Enqueue(#[from] QueueError),

    /// The input could not be read
    #[error("Failed to read tile list: {0}")]
    Read(String),

    /// A consumed tile list could not be deleted
    #[error("Failed to remove consumed tile list: {0}")]
    Remove(String),
}

/// Writer settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterConfig {
    /// Also enqueue ancestors of each tile down to this zoom
    pub expand_until_zoom: Option<u8>,
    /// Retry policy for batch submission
    pub retry: RetryPolicy,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Jobs placed on the queue
    pub enqueued: usize,
    /// Lines skipped because they did not parse
    pub parse_failures: usize,
}

/// Parses tile list lines into tiles.
///
/// Blank lines are ignored. Returns the parsed tiles and the number of lines
/// that failed to parse.
pub fn parse_tile_lines<I, S>(lines: I) -> (Vec<TileCoord>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tiles = Vec::new();
    let mut failures = 0;
    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        match TileCoord::parse(line) {
            Ok(tile) => tiles.push(tile),
            Err(e) => {
                failures += 1;
                warn!(line = index + 1, input = line.trim(), error = %e, "Skipping invalid tile");
            }
        }
    }
    (tiles, failures)
}

/// Writes tile lists to a queue.
pub struct QueueWriter<Q: Queue> {
    queue: Arc<Q>,
    config: WriterConfig,
    tiles_of_interest: Option<HashSet<TileCoord>>,
}

impl<Q: Queue> QueueWriter<Q> {
    pub fn new(queue: Arc<Q>, config: WriterConfig) -> Self {
        Self {
            queue,
            config,
            tiles_of_interest: None,
        }
    }

    /// Restricts enqueued tiles to the given set.
    pub fn with_tiles_of_interest(mut self, tiles: HashSet<TileCoord>) -> Self {
        self.tiles_of_interest = Some(tiles);
        self
    }

    /// Parses `lines` and enqueues every valid tile.
    ///
    /// Fails with [`WriteError::NoValidTiles`] only if at least one line was
    /// present and none parsed. An empty input enqueues nothing.
    pub async fn write<I, S>(&self, lines: I) -> Result<WriteSummary, WriteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (tiles, parse_failures) = parse_tile_lines(lines);
        if tiles.is_empty() && parse_failures > 0 {
            return Err(WriteError::NoValidTiles { parse_failures });
        }

        let tiles = self.expand(tiles);
        let enqueued = enqueue_all(self.queue.as_ref(), &tiles, &self.config.retry).await?;

        info!(
            queue = self.queue.name(),
            enqueued, parse_failures, "Tile list written"
        );
        Ok(WriteSummary {
            enqueued,
            parse_failures,
        })
    }

    /// Reads lines from `reader` until EOF, then writes them.
    pub async fn write_from<R>(&self, reader: R) -> Result<WriteSummary, WriteError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut collected = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| WriteError::Read(e.to_string()))?
        {
            collected.push(line);
        }
        self.write(collected).await
    }

    fn expand(&self, tiles: Vec<TileCoord>) -> Vec<TileCoord> {
        match (self.config.expand_until_zoom, &self.tiles_of_interest) {
            (None, None) => tiles,
            (until, toi) => {
                // Without an expansion zoom each tile only stands for itself
                let until = until.unwrap_or(crate::coord::MAX_ZOOM);
                explode_and_intersect(&tiles, toi.as_ref(), until)
            }
        }
    }
}
