//! Shared health state for the /health endpoint.
//! Updated by ScrapeQueue and ScrapeWorker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Scrape pipeline counters. Updated by the worker and queue, read by API.
#[derive(Default)]
pub struct HealthState {
    /// True while the scrape worker is draining its channel.
    pub worker_running: AtomicBool,
    /// URLs queued or in flight.
    pub queue_pending: AtomicU64,
    /// Unix millis of the last successful scrape (0 = none).
    pub last_scrape_at_ms: AtomicU64,
    pub scrapes_succeeded: AtomicU64,
    pub scrapes_failed: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_worker_running(&self, v: bool) {
        self.worker_running.store(v, Ordering::Relaxed);
    }

    pub fn inc_queue_pending(&self) {
        self.queue_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_queue_pending(&self) {
        let _ = self
            .queue_pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn record_success(&self, at_ms: u64) {
        self.scrapes_succeeded.fetch_add(1, Ordering::Relaxed);
        self.last_scrape_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.scrapes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_running(&self) -> bool {
        self.worker_running.load(Ordering::Relaxed)
    }

    pub fn queue_pending(&self) -> u64 {
        self.queue_pending.load(Ordering::Relaxed)
    }

    pub fn last_scrape_at_ms(&self) -> u64 {
        self.last_scrape_at_ms.load(Ordering::Relaxed)
    }

    pub fn scrapes_succeeded(&self) -> u64 {
        self.scrapes_succeeded.load(Ordering::Relaxed)
    }

    pub fn scrapes_failed(&self) -> u64 {
        self.scrapes_failed.load(Ordering::Relaxed)
    }
}
