use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::api::health::HealthState;
use crate::error::{AppError, Result};
use crate::types::ScrapeJob;

/// API-side handle for submitting scrape jobs. A URL already queued or in
/// flight is not queued twice.
#[derive(Clone)]
pub struct ScrapeQueue {
    tx: mpsc::Sender<ScrapeJob>,
    pending: Arc<DashSet<String>>,
    health: Arc<HealthState>,
}

impl ScrapeQueue {
    pub fn new(
        capacity: usize,
        health: Arc<HealthState>,
    ) -> (Self, mpsc::Receiver<ScrapeJob>, Arc<DashSet<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let pending = Arc::new(DashSet::new());
        let queue = Self {
            tx,
            pending: Arc::clone(&pending),
            health,
        };
        (queue, rx, pending)
    }

    /// Returns Ok(false) when the URL was already pending.
    pub fn enqueue(&self, url: &str) -> Result<bool> {
        if !self.pending.insert(url.to_string()) {
            return Ok(false);
        }

        match self.tx.try_send(ScrapeJob { url: url.to_string() }) {
            Ok(()) => {
                self.health.inc_queue_pending();
                Ok(true)
            }
            Err(e) => {
                self.pending.remove(url);
                let reason = match e {
                    TrySendError::Full(_) => "scrape queue is full",
                    TrySendError::Closed(_) => "scrape worker has stopped",
                };
                Err(AppError::QueueFull(reason.to_string()))
            }
        }
    }
}
