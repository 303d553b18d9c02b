//! Job consumption.
//!
//! Each [`Worker`] is a sequential loop: receive one job, render it in every
//! configured format, store each result, then decide whether to acknowledge.
//! A [`WorkerPool`] runs several workers against the same queue; the queue is
//! their only point of coordination.
//!
//! # Acknowledgment policy
//!
//! | Outcome                        | Action                                  |
//! |--------------------------------|-----------------------------------------|
//! | every format stored            | ack                                     |
//! | some formats stored            | ack, report the failed formats          |
//! | no format stored               | no ack; redelivered after the timeout   |

mod job;
mod pool;
mod stats;

pub use job::{FailureStage, FormatFailure, JobOutcome, JobProcessor};
pub use pool::{Worker, WorkerPool};
pub use stats::{ProcessingStats, StatsSnapshot};

use std::time::Duration;

use thiserror::Error;

use crate::render::{OutputFormat, DEFAULT_FORMATS};
use crate::retry::RetryPolicy;
use crate::store::StorageClass;

/// Default wait for a job before polling again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings for a worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Formats rendered for every job
    pub formats: Vec<OutputFormat>,
    /// Layer name used in storage keys
    pub layer: String,
    /// Key prefix in the blob store
    pub key_path: String,
    /// Durability class for writes
    pub storage_class: StorageClass,
    /// Retry policy for render and store calls
    pub retry: RetryPolicy,
    /// How long a receive waits for a job
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            formats: DEFAULT_FORMATS.to_vec(),
            layer: "all".to_string(),
            key_path: String::new(),
            storage_class: StorageClass::Standard,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One worker per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("No output formats configured")]
    NoFormats,
}
