//! Lock-free processing counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by every worker in a pool.
///
/// All operations use `Relaxed` ordering; the counters are independent.
#[derive(Debug)]
pub struct ProcessingStats {
    start_time: Instant,

    // === Jobs ===
    /// Jobs delivered by the queue
    jobs_received: AtomicU64,
    /// Jobs acknowledged with every format stored
    jobs_completed: AtomicU64,
    /// Jobs acknowledged with at least one format failure
    jobs_partial: AtomicU64,
    /// Jobs not acknowledged because every format failed
    jobs_redelivered: AtomicU64,

    // === Formats ===
    formats_stored: AtomicU64,
    render_failures: AtomicU64,
    store_failures: AtomicU64,
    /// Extra render and store attempts after a transient failure
    retries: AtomicU64,

    // === Queue ===
    receive_errors: AtomicU64,
    ack_errors: AtomicU64,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            jobs_received: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_partial: AtomicU64::new(0),
            jobs_redelivered: AtomicU64::new(0),
            formats_stored: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            ack_errors: AtomicU64::new(0),
        }
    }

    pub fn job_received(&self) {
        self.jobs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_partial(&self) {
        self.jobs_partial.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_redelivered(&self) {
        self.jobs_redelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_stored(&self) {
        self.formats_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_failed(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn store_failed(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self, count: u32) {
        self.retries.fetch_add(u64::from(count), Ordering::Relaxed);
    }

    pub fn receive_failed(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ack_failed(&self) {
        self.ack_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            jobs_received: self.jobs_received.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_partial: self.jobs_partial.load(Ordering::Relaxed),
            jobs_redelivered: self.jobs_redelivered.load(Ordering::Relaxed),
            formats_stored: self.formats_stored.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            ack_errors: self.ack_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ProcessingStats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub jobs_received: u64,
    pub jobs_completed: u64,
    pub jobs_partial: u64,
    pub jobs_redelivered: u64,
    pub formats_stored: u64,
    pub render_failures: u64,
    pub store_failures: u64,
    pub retries: u64,
    pub receive_errors: u64,
    pub ack_errors: u64,
}

impl StatsSnapshot {
    /// Jobs acknowledged, fully or partially.
    pub fn jobs_acked(&self) -> u64 {
        self.jobs_completed + self.jobs_partial
    }

    pub fn jobs_per_second(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.jobs_acked() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} received, {} acked ({} partial), {} left for redelivery, \
             {} formats stored, {} render failures, {} store failures, {} retries",
            self.jobs_received,
            self.jobs_acked(),
            self.jobs_partial,
            self.jobs_redelivered,
            self.formats_stored,
            self.render_failures,
            self.store_failures,
            self.retries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ProcessingStats::new();
        stats.job_received();
        stats.job_received();
        stats.job_completed();
        stats.job_partial();
        stats.format_stored();
        stats.render_failed();
        stats.retried(2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_received, 2);
        assert_eq!(snapshot.jobs_acked(), 2);
        assert_eq!(snapshot.render_failures, 1);
        assert_eq!(snapshot.retries, 2);
    }

    #[test]
    fn test_display_summary() {
        let snapshot = StatsSnapshot {
            jobs_received: 3,
            jobs_completed: 2,
            jobs_redelivered: 1,
            ..StatsSnapshot::default()
        };
        let text = snapshot.to_string();
        assert!(text.starts_with("3 received, 2 acked (0 partial), 1 left for redelivery"));
    }
}
