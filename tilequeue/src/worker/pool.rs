//! Worker loop and pool.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{JobOutcome, JobProcessor, ProcessingStats, StatsSnapshot, WorkerConfig, WorkerError};
use crate::queue::{JobMessage, Queue, QueueError};
use crate::render::Renderer;
use crate::store::BlobStore;

/// A single sequential consumer.
pub struct Worker<Q: Queue, R: Renderer, S: BlobStore> {
    id: usize,
    queue: Arc<Q>,
    processor: Arc<JobProcessor<R, S>>,
    stats: Arc<ProcessingStats>,
}

impl<Q: Queue, R: Renderer, S: BlobStore> Clone for Worker<Q, R, S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            queue: Arc::clone(&self.queue),
            processor: Arc::clone(&self.processor),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<Q: Queue, R: Renderer, S: BlobStore> Worker<Q, R, S> {
    /// Waits up to one poll interval for a job and handles it fully.
    ///
    /// Returns `Ok(None)` when no job arrived in time.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, QueueError> {
        let poll_interval = self.processor.config().poll_interval;
        let job = match self.queue.receive(poll_interval).await {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.receive_failed();
                return Err(e);
            }
        };
        Ok(Some(self.handle(job).await))
    }

    /// Processes a delivered job and acknowledges it if anything was stored.
    pub async fn handle(&self, job: JobMessage) -> JobOutcome {
        self.stats.job_received();
        debug!(
            worker = self.id,
            tile = %job.tile,
            receive_count = job.receive_count,
            "Job received"
        );

        let outcome = self.processor.process(job.tile).await;

        if !outcome.should_ack() {
            self.stats.job_redelivered();
            error!(
                worker = self.id,
                tile = %job.tile,
                failures = outcome.failures.len(),
                "All formats failed, leaving job for redelivery"
            );
            return outcome;
        }

        if let Err(e) = self.queue.ack(&job).await {
            // The job comes back after its visibility timeout and is
            // rewritten with identical keys
            self.stats.ack_failed();
            warn!(worker = self.id, tile = %job.tile, error = %e, "Failed to acknowledge job");
        }

        if outcome.is_complete() {
            self.stats.job_completed();
            info!(
                worker = self.id,
                tile = %job.tile,
                formats = outcome.stored.len(),
                "Job complete"
            );
        } else {
            self.stats.job_partial();
            let failed: Vec<String> = outcome
                .failures
                .iter()
                .map(|f| format!("{}:{}", f.format, f.stage))
                .collect();
            warn!(
                worker = self.id,
                tile = %job.tile,
                stored = outcome.stored.len(),
                failed = %failed.join(","),
                "Job acknowledged with format failures"
            );
        }
        outcome
    }

    /// Consumes jobs until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed between jobs, so a job that has been
    /// received is always carried through to its disposition.
    pub async fn run(self, shutdown: CancellationToken) {
        debug!(worker = self.id, "Worker started");
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue.receive(self.processor.config().poll_interval) => received,
            };
            match received {
                Ok(Some(job)) => {
                    self.handle(job).await;
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.receive_failed();
                    warn!(worker = self.id, error = %e, "Receive failed");
                    if e.is_retryable() {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.processor.config().poll_interval) => {}
                        }
                    }
                }
            }
        }
        debug!(worker = self.id, "Worker stopped");
    }
}

/// A set of workers sharing one queue, renderer and store.
pub struct WorkerPool<Q: Queue, R: Renderer, S: BlobStore> {
    queue: Arc<Q>,
    processor: Arc<JobProcessor<R, S>>,
    stats: Arc<ProcessingStats>,
    workers: usize,
}

impl<Q: Queue, R: Renderer, S: BlobStore> WorkerPool<Q, R, S> {
    pub fn new(
        queue: Arc<Q>,
        renderer: Arc<R>,
        store: Arc<S>,
        config: WorkerConfig,
    ) -> Result<Self, WorkerError> {
        if config.formats.is_empty() {
            return Err(WorkerError::NoFormats);
        }
        let workers = config.workers.max(1);
        let stats = Arc::new(ProcessingStats::new());
        let processor = Arc::new(JobProcessor::new(
            renderer,
            store,
            config,
            Arc::clone(&stats),
        ));
        Ok(Self {
            queue,
            processor,
            stats,
            workers,
        })
    }

    pub fn stats(&self) -> Arc<ProcessingStats> {
        Arc::clone(&self.stats)
    }

    /// Builds the worker with the given id.
    pub fn worker(&self, id: usize) -> Worker<Q, R, S> {
        Worker {
            id,
            queue: Arc::clone(&self.queue),
            processor: Arc::clone(&self.processor),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Runs every worker until `shutdown` is cancelled and they have all
    /// finished their current job.
    pub async fn run(&self, shutdown: CancellationToken) -> StatsSnapshot {
        info!(
            queue = self.queue.name(),
            workers = self.workers,
            formats = ?self.processor.config().formats,
            "Worker pool starting"
        );

        let handles: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| tokio::spawn(self.worker(id).run(shutdown.clone())))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        let snapshot = self.stats.snapshot();
        info!(summary = %snapshot, "Worker pool stopped");
        snapshot
    }
}
