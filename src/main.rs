mod api;
mod config;
mod db;
mod error;
mod scraper;
mod stats;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::ScrapeTimings;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::ObservationStore;
use crate::error::Result;
use crate::scraper::{ScrapeClient, ScrapeQueue, ScrapeWorker};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);
    let store = ObservationStore::new(pool);

    // --- Shared pipeline state ---
    let health = Arc::new(HealthState::new());
    let timings = Arc::new(ScrapeTimings::new());
    let (queue, job_rx, pending) = ScrapeQueue::new(CHANNEL_CAPACITY, Arc::clone(&health));

    // Scrape worker (one URL at a time, paced by SCRAPE_DELAY_SECS)
    let client = ScrapeClient::new(&cfg)?;
    let worker = ScrapeWorker::new(
        client,
        store.clone(),
        job_rx,
        pending,
        Arc::clone(&health),
        Arc::clone(&timings),
        Duration::from_secs(cfg.scrape_delay_secs),
    );
    tokio::spawn(async move { worker.run().await });
    info!(
        "Scrape worker started (delay={}s, timeout={}s, hosts={})",
        cfg.scrape_delay_secs,
        cfg.scrape_timeout_secs,
        cfg.allowed_hosts.join(",")
    );

    // HTTP API server
    let api_state = ApiState {
        store,
        queue,
        allowed_hosts: cfg.allowed_hosts.clone(),
        health,
        timings,
    };
    let app = router(api_state, &cfg.cors_origins);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
