//! In-process queue with visibility timeouts.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::Notify;
use tracing::{debug, trace};

use super::{JobMessage, Queue, QueueError, DEFAULT_MAX_BATCH_SIZE, DEFAULT_VISIBILITY_TIMEOUT};
use crate::coord::TileCoord;

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    tile: TileCoord,
    enqueued_at: SystemTime,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    entry: Entry,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<Entry>,
    in_flight: HashMap<u64, InFlight>,
    next_id: u64,
}

impl State {
    /// Returns jobs whose visibility timeout lapsed to the front of the queue.
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(flight) = self.in_flight.remove(&id) {
                trace!(tile = %flight.entry.tile, "Visibility timeout lapsed, job redeliverable");
                self.pending.push_front(flight.entry);
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// Queue held in process memory.
///
/// A received job is hidden until it is acknowledged or its visibility
/// timeout lapses, after which it is delivered again. Acknowledging with the
/// handle of an older delivery is a no-op.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    max_batch_size: usize,
    visibility_timeout: Duration,
    state: Mutex<State>,
    available: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, DEFAULT_MAX_BATCH_SIZE, DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_settings(
        name: impl Into<String>,
        max_batch_size: usize,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            max_batch_size: max_batch_size.max(1),
            visibility_timeout,
            state: Mutex::new(State::default()),
            available: Notify::new(),
        }
    }

    /// Jobs waiting to be received (including lapsed in-flight jobs).
    pub fn pending_len(&self) -> usize {
        let mut state = self.lock();
        state.requeue_expired(Instant::now());
        state.pending.len()
    }

    /// Jobs received but neither acknowledged nor timed out.
    pub fn in_flight_len(&self) -> usize {
        let mut state = self.lock();
        state.requeue_expired(Instant::now());
        state.in_flight.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another thread panicked mid-update of
        // plain collections; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_take(&self) -> Result<Option<JobMessage>, Option<Instant>> {
        let now = Instant::now();
        let mut state = self.lock();
        state.requeue_expired(now);
        match state.pending.pop_front() {
            Some(mut entry) => {
                entry.receive_count += 1;
                let message = JobMessage {
                    handle: format!("{}:{}", entry.id, entry.receive_count),
                    tile: entry.tile,
                    enqueued_at: entry.enqueued_at,
                    receive_count: entry.receive_count,
                };
                state.in_flight.insert(
                    entry.id,
                    InFlight {
                        entry,
                        visible_at: now + self.visibility_timeout,
                    },
                );
                Ok(Some(message))
            }
            None => Err(state.next_expiry()),
        }
    }
}

fn parse_handle(handle: &str) -> Option<(u64, u32)> {
    let (id, count) = handle.split_once(':')?;
    Some((id.parse().ok()?, count.parse().ok()?))
}

impl Queue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn enqueue_batch(&self, tiles: &[TileCoord]) -> Result<(), QueueError> {
        if tiles.len() > self.max_batch_size {
            return Err(QueueError::BatchTooLarge {
                size: tiles.len(),
                max: self.max_batch_size,
            });
        }
        {
            let mut state = self.lock();
            let enqueued_at = SystemTime::now();
            for tile in tiles {
                let id = state.next_id;
                state.next_id += 1;
                state.pending.push_back(Entry {
                    id,
                    tile: *tile,
                    enqueued_at,
                    receive_count: 0,
                });
            }
        }
        self.available.notify_waiters();
        Ok(())
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<JobMessage>, QueueError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = match self.try_take() {
                Ok(message) => return Ok(message),
                Err(next_expiry) => next_expiry.map_or(deadline, |t| t.min(deadline)),
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let _ = tokio::time::timeout(wake_at.saturating_duration_since(now), notified).await;
        }
    }

    async fn ack(&self, job: &JobMessage) -> Result<(), QueueError> {
        let Some((id, count)) = parse_handle(&job.handle) else {
            return Err(QueueError::Corrupt {
                entry: job.handle.clone(),
                reason: "not a memory queue receipt".to_string(),
            });
        };
        let mut state = self.lock();
        match state.in_flight.get(&id) {
            Some(flight) if flight.entry.receive_count == count => {
                state.in_flight.remove(&id);
                trace!(tile = %job.tile, "Job acknowledged");
            }
            _ => {
                debug!(tile = %job.tile, handle = %job.handle, "Stale acknowledgment ignored");
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<usize, QueueError> {
        let mut state = self.lock();
        let removed = state.pending.len() + state.in_flight.len();
        state.pending.clear();
        state.in_flight.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tile(col: u32) -> TileCoord {
        TileCoord::new(5, col, 3).unwrap()
    }

    #[tokio::test]
    async fn test_receive_returns_enqueued_job() {
        let queue = MemoryQueue::new("test");
        queue.enqueue_batch(&[tile(1)]).await.unwrap();

        let job = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(job.tile, tile(1));
        assert_eq!(job.receive_count, 1);
        assert_eq!(queue.in_flight_len(), 1);
    }

    #[tokio::test]
    async fn test_receive_empty_times_out() {
        let queue = MemoryQueue::new("test");
        let job = queue.receive(Duration::from_millis(20)).await.unwrap();
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let queue = MemoryQueue::with_settings("test", 2, DEFAULT_VISIBILITY_TIMEOUT);
        let err = queue
            .enqueue_batch(&[tile(1), tile(2), tile(3)])
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::BatchTooLarge { size: 3, max: 2 });
    }

    #[tokio::test]
    async fn test_ack_removes_job() {
        let queue = MemoryQueue::new("test");
        queue.enqueue_batch(&[tile(1)]).await.unwrap();
        let job = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();
        queue.ack(&job).await.unwrap();

        assert_eq!(queue.in_flight_len(), 0);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_unacked_job_is_redelivered_after_timeout() {
        let queue = MemoryQueue::with_settings("test", 10, Duration::from_millis(30));
        queue.enqueue_batch(&[tile(1)]).await.unwrap();

        let first = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();
        assert!(queue.receive(Duration::from_millis(5)).await.unwrap().is_none());

        let second = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(second.tile, first.tile);
        assert_eq!(second.receive_count, 2);
        assert_ne!(second.handle, first.handle);

        // The stale receipt no longer removes the job
        queue.ack(&first).await.unwrap();
        assert_eq!(queue.in_flight_len(), 1);
        queue.ack(&second).await.unwrap();
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_waiting_receiver_wakes_on_enqueue() {
        let queue = Arc::new(MemoryQueue::new("test"));
        let receiver = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.receive(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue_batch(&[tile(7)]).await.unwrap();

        let job = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(job.tile, tile(7));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let queue = MemoryQueue::new("test");
        queue.enqueue_batch(&[tile(1), tile(2), tile(3)]).await.unwrap();
        queue.receive(Duration::from_millis(10)).await.unwrap();

        assert_eq!(queue.clear().await.unwrap(), 3);
        assert_eq!(queue.pending_len(), 0);
        assert!(queue.receive(Duration::from_millis(5)).await.unwrap().is_none());
    }
}
