//! Tile list file used as a queue shared between processes.
//!
//! Producers append `zoom/column/row` lines to the queue file. Consumers
//! share a read cursor and a lease table stored next to it in
//! `<queue>.state`, and every operation holds an exclusive lock on
//! `<queue>.lock`, so any number of processes can consume the same file
//! without receiving the same line twice.
//!
//! A received line stays leased until it is acknowledged or its visibility
//! timeout lapses, after which it is delivered again. A restarted consumer
//! resumes from the persisted cursor.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{JobMessage, Queue, QueueError, DEFAULT_MAX_BATCH_SIZE, DEFAULT_VISIBILITY_TIMEOUT};
use crate::coord::TileCoord;

/// Interval between checks for newly appended lines or lapsed leases.
const TAIL_INTERVAL: Duration = Duration::from_millis(50);

/// A delivered line awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Lease {
    tile: String,
    /// Delivery token; a redelivery replaces it so older receipts go stale
    token: u64,
    receive_count: u32,
    first_received_ms: u64,
    visible_at_ms: u64,
}

/// Consumer state shared through the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct QueueState {
    /// Byte offset of the next unread line
    cursor: u64,
    next_token: u64,
    /// Leases keyed by the byte offset of their line
    leases: BTreeMap<u64, Lease>,
}

/// Paths of the queue file and its companions.
#[derive(Debug, Clone)]
struct QueueFiles {
    name: String,
    queue: PathBuf,
    state: PathBuf,
    lock: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn parse_handle(handle: &str) -> Option<(u64, u64)> {
    let (offset, token) = handle.split_once(':')?;
    Some((offset.parse().ok()?, token.parse().ok()?))
}

impl QueueFiles {
    fn new(queue: PathBuf) -> Self {
        Self {
            name: queue.display().to_string(),
            state: with_suffix(&queue, ".state"),
            lock: with_suffix(&queue, ".lock"),
            queue,
        }
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> QueueError {
        QueueError::Unavailable {
            queue: self.name.clone(),
            reason: e.to_string(),
        }
    }

    /// Runs `op` against the shared state while holding the queue lock.
    ///
    /// The state is written back whenever `op` changed it, including when
    /// `op` fails after advancing the cursor past a corrupt line.
    fn with_lock<T>(
        &self,
        op: impl FnOnce(&Self, &mut QueueState) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock)
            .map_err(|e| self.unavailable(e))?;
        lock.lock_exclusive().map_err(|e| self.unavailable(e))?;

        let before = self.load_state()?;
        let mut state = before.clone();
        let result = op(self, &mut state);
        if state != before {
            self.save_state(&state)?;
        }
        // Dropping the handle releases the lock
        drop(lock);
        result
    }

    fn load_state(&self) -> Result<QueueState, QueueError> {
        let bytes = match std::fs::read(&self.state) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(QueueState::default()),
            Err(e) => return Err(self.unavailable(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| QueueError::Corrupt {
            entry: self.state.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn save_state(&self, state: &QueueState) -> Result<(), QueueError> {
        let bytes = serde_json::to_vec(state).map_err(|e| self.unavailable(e))?;
        let temp = with_suffix(&self.state, ".tmp");
        std::fs::write(&temp, bytes).map_err(|e| self.unavailable(e))?;
        std::fs::rename(&temp, &self.state).map_err(|e| self.unavailable(e))
    }

    fn open_queue_file(&self) -> Result<Option<File>, QueueError> {
        match File::open(&self.queue) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn append(&self, body: &str) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.queue)
            .map_err(|e| self.unavailable(e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| self.unavailable(e))?;
        file.flush().map_err(|e| self.unavailable(e))
    }

    /// Reads complete lines from the cursor, calling `visit` with each
    /// line's offset and text until it returns `false` or no complete line
    /// remains. The cursor is advanced past every visited line.
    fn scan_from_cursor(
        &self,
        state: &mut QueueState,
        mut visit: impl FnMut(u64, &str) -> bool,
    ) -> Result<(), QueueError> {
        let Some(file) = self.open_queue_file()? else {
            return Ok(());
        };
        let len = file.metadata().map_err(|e| self.unavailable(e))?.len();
        if state.cursor > len {
            warn!(queue = %self.name, cursor = state.cursor, len, "Queue file shrank, rewinding cursor");
            state.cursor = 0;
        }

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(state.cursor))
            .map_err(|e| self.unavailable(e))?;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| self.unavailable(e))?;
            // A line without its newline may still be mid-write
            if read == 0 || !line.ends_with('\n') {
                return Ok(());
            }
            let offset = state.cursor;
            state.cursor += read as u64;
            if !visit(offset, line.trim()) {
                return Ok(());
            }
        }
    }

    /// Delivers a lapsed lease or the next unread line.
    fn take_next(
        &self,
        state: &mut QueueState,
        visibility_timeout: Duration,
        now: SystemTime,
    ) -> Result<Option<JobMessage>, QueueError> {
        let now_ms = unix_millis(now);
        let visible_at_ms = now_ms.saturating_add(visibility_timeout.as_millis() as u64);

        let lapsed = state
            .leases
            .iter()
            .find(|(_, lease)| lease.visible_at_ms <= now_ms)
            .map(|(offset, _)| *offset);
        if let Some(offset) = lapsed {
            let token = state.next_token;
            state.next_token += 1;
            if let Some(lease) = state.leases.get_mut(&offset) {
                lease.token = token;
                lease.receive_count += 1;
                lease.visible_at_ms = visible_at_ms;
                trace!(queue = %self.name, tile = %lease.tile, "Visibility timeout lapsed, redelivering");
                return self.message(offset, lease).map(Some);
            }
        }

        let mut next = None;
        self.scan_from_cursor(state, |offset, line| {
            if line.is_empty() {
                return true;
            }
            next = Some((offset, line.to_string()));
            false
        })?;
        let Some((offset, line)) = next else {
            return Ok(None);
        };

        let tile = match TileCoord::parse(&line) {
            Ok(tile) => tile,
            Err(e) => {
                warn!(queue = %self.name, offset, error = %e, "Skipping corrupt queue line");
                return Err(QueueError::Corrupt {
                    entry: line,
                    reason: e.to_string(),
                });
            }
        };
        let token = state.next_token;
        state.next_token += 1;
        let lease = Lease {
            tile: tile.to_string(),
            token,
            receive_count: 1,
            first_received_ms: now_ms,
            visible_at_ms,
        };
        let message = self.message(offset, &lease)?;
        state.leases.insert(offset, lease);
        Ok(Some(message))
    }

    fn message(&self, offset: u64, lease: &Lease) -> Result<JobMessage, QueueError> {
        let tile = TileCoord::parse(&lease.tile).map_err(|e| QueueError::Corrupt {
            entry: lease.tile.clone(),
            reason: e.to_string(),
        })?;
        Ok(JobMessage {
            handle: format!("{}:{}", offset, lease.token),
            tile,
            // Lines carry no timestamp; the first delivery stands in for it
            enqueued_at: UNIX_EPOCH + Duration::from_millis(lease.first_received_ms),
            receive_count: lease.receive_count,
        })
    }
}

/// Tile list file consumed through shared, lock-protected leases.
#[derive(Debug)]
pub struct FileQueue {
    files: QueueFiles,
    max_batch_size: usize,
    visibility_timeout: Duration,
}

impl FileQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_settings(path, DEFAULT_MAX_BATCH_SIZE, DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_settings(
        path: impl Into<PathBuf>,
        max_batch_size: usize,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            files: QueueFiles::new(path.into()),
            max_batch_size: max_batch_size.max(1),
            visibility_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.files.queue
    }

    /// File holding the shared cursor and leases.
    pub fn state_path(&self) -> &Path {
        &self.files.state
    }

    /// Creates the queue file if needed and checks that the queue can be
    /// locked and its state read.
    pub async fn open(&self) -> Result<(), QueueError> {
        self.locked(|files, _state| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&files.queue)
                .map(|_| ())
                .map_err(|e| files.unavailable(e))
        })
        .await
    }

    /// Jobs received but neither acknowledged nor timed out.
    pub async fn in_flight_len(&self) -> Result<usize, QueueError> {
        self.locked(|_files, state| {
            let now_ms = unix_millis(SystemTime::now());
            Ok(state
                .leases
                .values()
                .filter(|lease| lease.visible_at_ms > now_ms)
                .count())
        })
        .await
    }

    async fn locked<T, F>(&self, op: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&QueueFiles, &mut QueueState) -> Result<T, QueueError> + Send + 'static,
    {
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || files.with_lock(op))
            .await
            .map_err(|e| self.files.unavailable(e))?
    }
}

impl Queue for FileQueue {
    fn name(&self) -> &str {
        &self.files.name
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
        let mut body = String::with_capacity(tiles.len() * 16);
        for tile in tiles {
            body.push_str(&tile.to_string());
            body.push('\n');
        }
        self.locked(move |files, _state| files.append(&body)).await
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<JobMessage>, QueueError> {
        let deadline = Instant::now() + max_wait;
        let visibility_timeout = self.visibility_timeout;
        loop {
            let job = self
                .locked(move |files, state| {
                    files.take_next(state, visibility_timeout, SystemTime::now())
                })
                .await?;
            if job.is_some() {
                return Ok(job);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(TAIL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, job: &JobMessage) -> Result<(), QueueError> {
        let Some((offset, token)) = parse_handle(&job.handle) else {
            return Err(QueueError::Corrupt {
                entry: job.handle.clone(),
                reason: "not a file queue receipt".to_string(),
            });
        };
        let tile = job.tile;
        self.locked(move |files, state| {
            match state.leases.get(&offset) {
                Some(lease) if lease.token == token => {
                    state.leases.remove(&offset);
                    trace!(queue = %files.name, %tile, "Job acknowledged");
                }
                _ => debug!(queue = %files.name, %tile, offset, token, "Stale acknowledgment ignored"),
            }
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<usize, QueueError> {
        let removed = self
            .locked(|files, state| {
                let mut removed = state.leases.len();
                files.scan_from_cursor(state, |_, line| {
                    if !line.is_empty() {
                        removed += 1;
                    }
                    true
                })?;

                match OpenOptions::new().write(true).open(&files.queue) {
                    Ok(file) => file.set_len(0).map_err(|e| files.unavailable(e))?,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(files.unavailable(e)),
                }
                state.cursor = 0;
                state.leases.clear();
                Ok(removed)
            })
            .await?;
        debug!(queue = %self.files.name, removed, "Cleared file queue");
        Ok(removed)
    }
}
