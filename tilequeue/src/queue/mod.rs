//! Job queue contract and local queue implementations.
//!
//! The queue is the only synchronization point between job producers
//! (seeder, writer) and the worker pool. Implementations must provide
//! at-least-once delivery: a received job that is never acknowledged becomes
//! available again once its visibility timeout lapses. No ordering is
//! guaranteed.
//!
//! Two implementations live here:
//!
//! - [`MemoryQueue`] - in-process queue with visibility timeouts and
//!   redelivery, used for single-process pipelines and tests
//! - [`FileQueue`] - append-only tile list file in the `zoom/column/row`
//!   line format, shared by consumer processes through a locked lease table

mod file;
mod memory;

pub use file::FileQueue;
pub use memory::MemoryQueue;

use std::future::Future;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::debug;

use crate::coord::TileCoord;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Default maximum number of jobs per enqueue call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// Default visibility timeout for received jobs.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Which queue implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueKind {
    /// In-process queue; lives only as long as the process
    Memory,
    /// Tile list file shared between processes
    #[default]
    File,
}

impl QueueKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for QueueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(format!("unknown queue type '{}' (expected memory or file)", other)),
        }
    }
}

/// Queue selection and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub kind: QueueKind,
    /// Queue identifier; the file path for file queues
    pub name: String,
    pub max_batch_size: usize,
    pub visibility_timeout: Duration,
}

impl QueueConfig {
    /// Builds an in-process queue from these settings.
    pub fn memory_queue(&self) -> MemoryQueue {
        MemoryQueue::with_settings(&self.name, self.max_batch_size, self.visibility_timeout)
    }

    /// Builds a file queue from these settings.
    pub fn file_queue(&self) -> FileQueue {
        FileQueue::with_settings(&self.name, self.max_batch_size, self.visibility_timeout)
    }
}

/// A job as delivered by a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMessage {
    /// Opaque receipt used to acknowledge this delivery
    pub handle: String,
    /// Tile to regenerate
    pub tile: TileCoord,
    /// When the job was first placed on the queue
    pub enqueued_at: SystemTime,
    /// How many times this job has been delivered, including this one
    pub receive_count: u32,
}

/// Errors raised by queue operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    /// The queue could not be reached; worth retrying
    #[error("Queue '{queue}' unavailable: {reason}")]
    Unavailable { queue: String, reason: String },

    /// A batch larger than the queue accepts
    #[error("Batch of {size} jobs exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// A stored entry could not be decoded
    #[error("Corrupt queue entry '{entry}': {reason}")]
    Corrupt { entry: String, reason: String },
}

impl QueueError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Shared job queue.
///
/// All methods take `&self`; implementations synchronize internally so a
/// single queue can be shared by every worker in a pool.
pub trait Queue: Send + Sync + 'static {
    /// Queue identifier for logging.
    fn name(&self) -> &str;

    /// Largest batch accepted by [`Queue::enqueue_batch`].
    fn max_batch_size(&self) -> usize;

    /// Places a batch of jobs on the queue.
    fn enqueue_batch(
        &self,
        tiles: &[TileCoord],
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Waits up to `max_wait` for a job. `Ok(None)` means nothing arrived in
    /// time and is not an error.
    fn receive(
        &self,
        max_wait: Duration,
    ) -> impl Future<Output = Result<Option<JobMessage>, QueueError>> + Send;

    /// Removes a delivered job from the queue.
    fn ack(&self, job: &JobMessage) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Removes every pending job, returning how many were removed.
    fn clear(&self) -> impl Future<Output = Result<usize, QueueError>> + Send;
}

/// Enqueues `tiles` in batches no larger than the queue's maximum.
///
/// Each batch is retried per `policy`; the first batch that still fails
/// aborts the submission. Returns the number of jobs enqueued.
pub async fn enqueue_all<Q: Queue>(
    queue: &Q,
    tiles: &[TileCoord],
    policy: &RetryPolicy,
) -> Result<usize, QueueError> {
    let batch_size = queue.max_batch_size().max(1);
    let mut enqueued = 0;
    for batch in tiles.chunks(batch_size) {
        retry_with_backoff(policy, "enqueue_batch", QueueError::is_retryable, move || {
            queue.enqueue_batch(batch)
        })
        .await
        .result?;
        enqueued += batch.len();
    }
    debug!(queue = queue.name(), jobs = enqueued, "Enqueued jobs");
    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Queue that fails the first `failures` enqueue calls.
    struct FlakyQueue {
        failures: AtomicU32,
        batches: Mutex<Vec<Vec<TileCoord>>>,
    }

    impl FlakyQueue {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl Queue for FlakyQueue {
        fn name(&self) -> &str {
            "flaky"
        }

        fn max_batch_size(&self) -> usize {
            3
        }

        async fn enqueue_batch(&self, tiles: &[TileCoord]) -> Result<(), QueueError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(QueueError::Unavailable {
                    queue: "flaky".to_string(),
                    reason: "timeout".to_string(),
                });
            }
            self.batches.lock().unwrap().push(tiles.to_vec());
            Ok(())
        }

        async fn receive(&self, _max_wait: Duration) -> Result<Option<JobMessage>, QueueError> {
            Ok(None)
        }

        async fn ack(&self, _job: &JobMessage) -> Result<(), QueueError> {
            Ok(())
        }

        async fn clear(&self) -> Result<usize, QueueError> {
            Ok(0)
        }
    }

    fn tiles(n: u32) -> Vec<TileCoord> {
        (0..n).map(|i| TileCoord::new(4, i, 0).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_enqueue_all_respects_batch_size() {
        let queue = FlakyQueue::new(0);
        let count = enqueue_all(&queue, &tiles(7), &RetryPolicy::none())
            .await
            .unwrap();
        assert_eq!(count, 7);
        let sizes: Vec<_> = queue.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_enqueue_all_retries_transient_failures() {
        let queue = FlakyQueue::new(2);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let count = enqueue_all(&queue, &tiles(2), &policy).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_enqueue_all_surfaces_exhausted_retries() {
        let queue = FlakyQueue::new(10);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = enqueue_all(&queue, &tiles(2), &policy).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(queue.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_error_classification() {
        assert!(!QueueError::BatchTooLarge { size: 11, max: 10 }.is_retryable());
        assert!(!QueueError::Corrupt {
            entry: "x".to_string(),
            reason: "bad".to_string()
        }
        .is_retryable());
    }
}
