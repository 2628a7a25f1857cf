use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashSet;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::ScrapeTimings;
use crate::db::ObservationStore;
use crate::error::Result;
use crate::scraper::client::ScrapeClient;
use crate::types::ScrapeJob;

/// Drains scrape jobs one URL at a time and records each page as observations.
/// Runs as a dedicated background task; failures are logged and counted, never
/// retried.
pub struct ScrapeWorker {
    client: ScrapeClient,
    store: ObservationStore,
    job_rx: mpsc::Receiver<ScrapeJob>,
    pending: Arc<DashSet<String>>,
    health: Arc<HealthState>,
    timings: Arc<ScrapeTimings>,
    delay: Duration,
}

impl ScrapeWorker {
    pub fn new(
        client: ScrapeClient,
        store: ObservationStore,
        job_rx: mpsc::Receiver<ScrapeJob>,
        pending: Arc<DashSet<String>>,
        health: Arc<HealthState>,
        timings: Arc<ScrapeTimings>,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            store,
            job_rx,
            pending,
            health,
            timings,
            delay,
        }
    }

    pub async fn run(mut self) {
        self.health.set_worker_running(true);

        while let Some(job) = self.job_rx.recv().await {
            let started = Instant::now();
            match self.scrape_and_record(&job.url).await {
                Ok(merchant_id) => {
                    self.timings.record(started.elapsed());
                    self.health
                        .record_success(Utc::now().timestamp_millis().max(0) as u64);
                    info!(
                        merchant_id,
                        url = %job.url,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        remaining = self.health.queue_pending().saturating_sub(1),
                        "scrape recorded"
                    );
                }
                Err(e) => {
                    self.health.record_failure();
                    warn!(url = %job.url, "scrape failed: {e}");
                }
            }

            self.pending.remove(&job.url);
            self.health.dec_queue_pending();

            // Courtesy pause between consecutive page fetches.
            tokio::time::sleep(self.delay).await;
        }

        self.health.set_worker_running(false);
        warn!("scrape job channel closed; worker exiting");
    }

    async fn scrape_and_record(&self, url: &str) -> Result<i64> {
        let page = self.client.scrape(url).await?;
        info!(
            url,
            merchant = %page.name,
            headline = %page.main.text,
            categories = page.categories.len(),
            upsized_badge = page.upsized_badge,
            "scraped merchant page"
        );
        self.store.record_scrape(&page, Utc::now()).await
    }
}
