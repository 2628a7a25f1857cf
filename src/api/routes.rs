use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::ScrapeTimings;
use crate::config::{limits, MAIN_CATEGORY};
use crate::db::{HistoryFilter, ObservationStore};
use crate::error::{AppError, Result};
use crate::scraper::client::validate_merchant_url;
use crate::scraper::ScrapeQueue;
use crate::stats::{
    compute_category_statistics, compute_summary, daily_trend, group_history_by_day, is_upsized,
    rank_by_current_rate, CategoryStatistic, DailyHistory, DashboardSummary, TrendPoint,
};
use crate::types::{HistoryRecord, Merchant, Observation, Rate};

#[derive(Clone)]
pub struct ApiState {
    pub store: ObservationStore,
    pub queue: ScrapeQueue,
    pub allowed_hosts: Vec<String>,
    pub health: Arc<HealthState>,
    pub timings: Arc<ScrapeTimings>,
}

pub fn router(state: ApiState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/merchants", get(get_merchants))
        .route("/merchants/upsized", get(get_upsized_merchants))
        .route("/merchants/:id", axum::routing::delete(delete_merchant))
        .route("/merchants/:id/history", get(get_merchant_history))
        .route("/merchants/:id/history/daily", get(get_merchant_daily_history))
        .route("/merchants/:id/statistics", get(get_merchant_statistics))
        .route("/merchants/:id/trends", get(get_merchant_trends))
        .route("/statistics", get(get_statistics))
        .route("/history", get(get_history))
        .route("/top-cashback", get(get_top_cashback))
        .route("/scrape", post(post_scrape))
        .route("/scrape/batch", post(post_scrape_batch))
        .route("/rescrape-all", post(post_rescrape_all))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state);

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MerchantsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct MerchantHistoryQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct DailyHistoryQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct StatisticsQuery {
    pub merchant_name: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub merchant_name: Option<String>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
}

#[derive(Deserialize)]
pub struct TopCashbackQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct BatchScrapeRequest {
    pub urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct UpsizedMerchantResponse {
    pub merchant_id: i64,
    pub name: String,
    pub url: String,
    pub current_rate: Rate,
    pub prior_rate: Option<Rate>,
    pub observed_at: DateTime<Utc>,
    /// When this rate was first reached.
    pub record_set_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct MerchantStatisticResponse {
    pub merchant_id: i64,
    pub merchant_name: String,
    #[serde(flatten)]
    pub statistic: CategoryStatistic,
}

#[derive(Serialize)]
pub struct TopCashbackResponse {
    pub merchant_id: i64,
    pub name: String,
    pub url: String,
    pub category: String,
    pub current_rate: Rate,
    pub observed_at: DateTime<Utc>,
    pub is_current_highest: bool,
}

#[derive(Serialize)]
pub struct ScrapeAck {
    pub success: bool,
    pub message: String,
    pub queued: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub worker_running: bool,
    pub queue_pending: u64,
    pub last_scrape_at: Option<DateTime<Utc>>,
    pub scrapes_succeeded: u64,
    pub scrapes_failed: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub sample_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_dashboard(State(state): State<ApiState>) -> Result<Json<DashboardSummary>> {
    let by_merchant = state.store.observations_by_merchant().await?;
    Ok(Json(compute_summary(&by_merchant, Utc::now())))
}

async fn get_merchants(
    State(state): State<ApiState>,
    Query(params): Query<MerchantsQuery>,
) -> Result<Json<Vec<Merchant>>> {
    let merchants = state
        .store
        .list_merchants(
            clamp_limit(params.limit, limits::DEFAULT_LIMIT),
            params.offset.unwrap_or(0).max(0),
            params.search.as_deref().filter(|s| !s.is_empty()),
        )
        .await?;
    Ok(Json(merchants))
}

async fn get_upsized_merchants(
    State(state): State<ApiState>,
) -> Result<Json<Vec<UpsizedMerchantResponse>>> {
    let merchants = merchants_by_id(&state.store).await?;
    let per_merchant = statistics_by_merchant(&state.store.observations_by_merchant().await?);

    let mut upsized: Vec<UpsizedMerchantResponse> = per_merchant
        .iter()
        .filter(|(_, stats)| is_upsized(stats))
        .filter_map(|(id, stats)| {
            let main = stats.get(MAIN_CATEGORY)?;
            let merchant = merchants.get(id)?;
            Some(UpsizedMerchantResponse {
                merchant_id: *id,
                name: merchant.name.clone(),
                url: merchant.url.clone(),
                current_rate: main.current_rate,
                prior_rate: main.current_prior_rate,
                observed_at: main.current_observed_at,
                record_set_at: main.highest_observed_at,
            })
        })
        .collect();
    upsized.sort_by(|a, b| {
        b.current_rate
            .cmp(&a.current_rate)
            .then(a.merchant_id.cmp(&b.merchant_id))
    });

    Ok(Json(upsized))
}

async fn get_merchant_history(
    State(state): State<ApiState>,
    Path(merchant_id): Path<i64>,
    Query(params): Query<MerchantHistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>> {
    require_merchant(&state.store, merchant_id).await?;
    let history = state
        .store
        .merchant_history(
            merchant_id,
            params.category.as_deref(),
            Some(clamp_limit(params.limit, limits::DEFAULT_LIMIT)),
        )
        .await?;
    Ok(Json(history))
}

/// Whole days only: the full history is grouped, never a truncated tail.
async fn get_merchant_daily_history(
    State(state): State<ApiState>,
    Path(merchant_id): Path<i64>,
    Query(params): Query<DailyHistoryQuery>,
) -> Result<Json<Vec<DailyHistory>>> {
    require_merchant(&state.store, merchant_id).await?;
    let history = state
        .store
        .merchant_history(merchant_id, params.category.as_deref(), None)
        .await?;
    let statistics =
        compute_category_statistics(&state.store.observations_for_merchant(merchant_id).await?);
    Ok(Json(group_history_by_day(&history, &statistics)))
}

async fn get_merchant_statistics(
    State(state): State<ApiState>,
    Path(merchant_id): Path<i64>,
) -> Result<Json<Vec<CategoryStatistic>>> {
    require_merchant(&state.store, merchant_id).await?;
    let observations = state.store.observations_for_merchant(merchant_id).await?;
    Ok(Json(
        compute_category_statistics(&observations).into_values().collect(),
    ))
}

async fn get_merchant_trends(
    State(state): State<ApiState>,
    Path(merchant_id): Path<i64>,
    Query(params): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>> {
    require_merchant(&state.store, merchant_id).await?;
    let days = params
        .days
        .unwrap_or(limits::DEFAULT_TREND_DAYS)
        .clamp(1, limits::MAX_TREND_DAYS);
    let category = params.category.as_deref().unwrap_or(MAIN_CATEGORY);
    let since = Utc::now() - Duration::days(days);

    let observations = state.store.observations_for_merchant(merchant_id).await?;
    Ok(Json(daily_trend(&observations, category, since)))
}

async fn delete_merchant(
    State(state): State<ApiState>,
    Path(merchant_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let name = state
        .store
        .delete_merchant(merchant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("merchant {merchant_id}")))?;

    info!(merchant_id, "deleted merchant {name} and its history");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("merchant '{name}' and all its observations were deleted"),
    })))
}

/// Statistics for merchants whose name contains `merchant_name`, or for
/// every merchant when no name is given. Ordered by merchant name, then category.
async fn get_statistics(
    State(state): State<ApiState>,
    Query(params): Query<StatisticsQuery>,
) -> Result<Json<Vec<MerchantStatisticResponse>>> {
    let merchants: Vec<Merchant> = match params.merchant_name.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => state.store.merchants_named(name).await?,
        None => {
            let mut all: Vec<Merchant> = merchants_by_id(&state.store).await?.into_values().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            all
        }
    };

    let mut out = Vec::new();
    for merchant in merchants {
        let observations = state.store.observations_for_merchant(merchant.id).await?;
        for statistic in compute_category_statistics(&observations).into_values() {
            out.push(MerchantStatisticResponse {
                merchant_id: merchant.id,
                merchant_name: merchant.name.clone(),
                statistic,
            });
        }
    }
    Ok(Json(out))
}

async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>> {
    let filter = HistoryFilter {
        merchant_name: params.merchant_name.filter(|s| !s.is_empty()),
        min_rate: params.min_rate.map(rate_param).transpose()?,
        max_rate: params.max_rate.map(rate_param).transpose()?,
        limit: clamp_limit(params.limit, limits::DEFAULT_HISTORY_LIMIT),
        offset: params.offset.unwrap_or(0).max(0),
    };
    Ok(Json(state.store.history(&filter).await?))
}

async fn get_top_cashback(
    State(state): State<ApiState>,
    Query(params): Query<TopCashbackQuery>,
) -> Result<Json<Vec<TopCashbackResponse>>> {
    let category = params.category.as_deref().unwrap_or(MAIN_CATEGORY);
    let limit = params
        .limit
        .unwrap_or(limits::DEFAULT_TOP_LIMIT)
        .clamp(1, limits::MAX_TOP_LIMIT);

    let merchants = merchants_by_id(&state.store).await?;
    let per_merchant = statistics_by_merchant(&state.store.observations_by_merchant().await?);

    let top = rank_by_current_rate(&per_merchant, category, limit)
        .into_iter()
        .filter_map(|(id, stat)| {
            let merchant = merchants.get(&id)?;
            Some(TopCashbackResponse {
                merchant_id: id,
                name: merchant.name.clone(),
                url: merchant.url.clone(),
                category: stat.category.clone(),
                current_rate: stat.current_rate,
                observed_at: stat.current_observed_at,
                is_current_highest: stat.is_current_highest,
            })
        })
        .collect();
    Ok(Json(top))
}

async fn post_scrape(
    State(state): State<ApiState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeAck>> {
    validate_merchant_url(&req.url, &state.allowed_hosts)?;
    let queued = state.queue.enqueue(&req.url)?;

    let message = if queued {
        "scrape queued; results appear once the page has been fetched".to_string()
    } else {
        "scrape already pending for this URL".to_string()
    };
    Ok(Json(ScrapeAck {
        success: true,
        message,
        queued: usize::from(queued),
        skipped: usize::from(!queued),
    }))
}

async fn post_scrape_batch(
    State(state): State<ApiState>,
    Json(req): Json<BatchScrapeRequest>,
) -> Result<Json<ScrapeAck>> {
    for url in &req.urls {
        validate_merchant_url(url, &state.allowed_hosts)?;
    }
    let (queued, skipped) = enqueue_all(&state.queue, &req.urls)?;

    Ok(Json(ScrapeAck {
        success: true,
        message: format!("batch scrape queued for {queued} merchants"),
        queued,
        skipped,
    }))
}

async fn post_rescrape_all(State(state): State<ApiState>) -> Result<Json<ScrapeAck>> {
    let urls = state.store.merchant_urls().await?;
    let (queued, skipped) = enqueue_all(&state.queue, &urls)?;
    info!(queued, skipped, "rescrape of all merchants requested");

    Ok(Json(ScrapeAck {
        success: true,
        message: format!("rescrape queued for {queued} of {} merchants", urls.len()),
        queued,
        skipped,
    }))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let last_ms = h.last_scrape_at_ms();
    Json(HealthResponse {
        worker_running: h.worker_running(),
        queue_pending: h.queue_pending(),
        last_scrape_at: (last_ms > 0)
            .then(|| DateTime::from_timestamp_millis(last_ms as i64))
            .flatten(),
        scrapes_succeeded: h.scrapes_succeeded(),
        scrapes_failed: h.scrapes_failed(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.timings.percentiles();
    Json(LatencyResponse {
        p50_ms,
        p95_ms,
        p99_ms,
        sample_count: state.timings.len(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, limits::MAX_LIMIT)
}

fn rate_param(percent: f64) -> Result<Rate> {
    Rate::from_percent(percent)
        .ok_or_else(|| AppError::Validation(format!("invalid rate filter {percent}")))
}

async fn require_merchant(store: &ObservationStore, merchant_id: i64) -> Result<Merchant> {
    store
        .merchant(merchant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("merchant {merchant_id}")))
}

async fn merchants_by_id(store: &ObservationStore) -> Result<BTreeMap<i64, Merchant>> {
    Ok(store
        .all_merchants()
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect())
}

fn statistics_by_merchant(
    by_merchant: &BTreeMap<i64, Vec<Observation>>,
) -> BTreeMap<i64, BTreeMap<String, CategoryStatistic>> {
    by_merchant
        .iter()
        .map(|(&id, observations)| (id, compute_category_statistics(observations)))
        .collect()
}

/// Stops at the first queue failure; URLs queued before it stay queued.
fn enqueue_all(queue: &ScrapeQueue, urls: &[String]) -> Result<(usize, usize)> {
    let mut queued = 0;
    let mut skipped = 0;
    for url in urls {
        if queue.enqueue(url)? {
            queued += 1;
        } else {
            skipped += 1;
        }
    }
    Ok((queued, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::TimeZone;
    use serde_json::Value;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::types::{ScrapedOffer, ScrapedPage};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn offer(category: &str, hundredths: u32) -> ScrapedOffer {
        let rate = Rate::from_hundredths(hundredths);
        ScrapedOffer {
            category: category.to_string(),
            text: format!("Up to {rate} Cashback"),
            rate,
        }
    }

    fn page(name: &str, main: u32, prior: Option<u32>, categories: &[(&str, u32)]) -> ScrapedPage {
        ScrapedPage {
            name: name.to_string(),
            url: format!("https://www.shopback.com.au/{}", name.to_lowercase()),
            main: offer(MAIN_CATEGORY, main),
            categories: categories.iter().map(|&(c, r)| offer(c, r)).collect(),
            upsized_badge: prior.is_some(),
            prior_offer: prior.map(|p| format!("Up to {} Cashback", Rate::from_hundredths(p))),
            prior_rate: prior.map(Rate::from_hundredths),
        }
    }

    async fn test_app() -> (Router, ObservationStore) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let store = ObservationStore::new(pool);

        let health = Arc::new(HealthState::new());
        let (queue, _rx, _pending) = ScrapeQueue::new(16, Arc::clone(&health));
        let state = ApiState {
            store: store.clone(),
            queue,
            allowed_hosts: vec!["shopback.com".to_string(), "shopback.com.au".to_string()],
            health,
            timings: Arc::new(ScrapeTimings::new()),
        };
        (router(state, &[]), store)
    }

    /// Two scrapes per merchant, six hours apart.
    async fn seed(store: &ObservationStore) {
        let later = t0() + Duration::hours(6);
        // Amazon: 3% -> 4%, no prior offer shown.
        store.record_scrape(&page("Amazon", 300, None, &[]), t0()).await.unwrap();
        store.record_scrape(&page("Amazon", 400, None, &[]), later).await.unwrap();
        // Agoda: 5% -> 8%, page shows the old 5% struck through.
        store
            .record_scrape(&page("Agoda", 500, None, &[("Hotels", 700)]), t0())
            .await
            .unwrap();
        store
            .record_scrape(&page("Agoda", 800, Some(500), &[("Hotels", 650)]), later)
            .await
            .unwrap();
        // Myer: 6% -> 2%, dropped.
        store.record_scrape(&page("Myer", 600, None, &[]), t0()).await.unwrap();
        store.record_scrape(&page("Myer", 200, None, &[]), later).await.unwrap();
        // Kmart: single observation is never upsized.
        store.record_scrape(&page("Kmart", 900, None, &[]), t0()).await.unwrap();
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn upsized_lists_merchants_at_record_rate_by_rate_descending() {
        let (app, store) = test_app().await;
        seed(&store).await;

        let (status, body) = send(&app, "GET", "/api/merchants/upsized", None).await;
        assert_eq!(status, StatusCode::OK);

        let list = body.as_array().unwrap();
        let names: Vec<_> = list.iter().map(|m| m["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Agoda", "Amazon"]);

        assert_eq!(list[0]["current_rate"], 8.0);
        assert_eq!(list[0]["prior_rate"], 5.0);
        assert_eq!(list[0]["url"], "https://www.shopback.com.au/agoda");
        assert_eq!(list[1]["current_rate"], 4.0);
        assert!(list[1]["prior_rate"].is_null());
    }

    #[tokio::test]
    async fn statistics_by_name_are_flattened_per_category() {
        let (app, store) = test_app().await;
        seed(&store).await;

        let (status, body) = send(&app, "GET", "/api/statistics?merchant_name=Agoda", None).await;
        assert_eq!(status, StatusCode::OK);

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row["merchant_name"], "Agoda");
            assert!(row.get("statistic").is_none(), "statistic must be flattened");
        }

        let hotels = &rows[0];
        assert_eq!(hotels["category"], "Hotels");
        assert_eq!(hotels["current_rate"], 6.5);
        assert_eq!(hotels["highest_rate"], 7.0);
        assert_eq!(hotels["is_current_highest"], false);
        assert_eq!(hotels["is_current_lowest"], true);
        assert_eq!(hotels["gap_to_highest"], 0.5);

        let main = &rows[1];
        assert_eq!(main["category"], "Main");
        assert_eq!(main["current_rate"], 8.0);
        assert_eq!(main["is_current_highest"], true);
        assert_eq!(main["observation_count"], 2);
    }

    #[tokio::test]
    async fn statistics_without_name_cover_every_merchant_by_name() {
        let (app, store) = test_app().await;
        seed(&store).await;

        let (_, body) = send(&app, "GET", "/api/statistics", None).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["merchant_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Agoda", "Agoda", "Amazon", "Kmart", "Myer"]);
    }

    #[tokio::test]
    async fn unknown_merchant_is_not_found() {
        let (app, _store) = test_app().await;

        let (status, body) = send(&app, "GET", "/api/merchants/42/statistics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("42"));

        let (status, _) = send(&app, "DELETE", "/api/merchants/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn daily_history_keeps_whole_days() {
        let (app, store) = test_app().await;
        seed(&store).await;

        let (status, body) = send(&app, "GET", "/api/merchants/2/history/daily", None).await;
        assert_eq!(status, StatusCode::OK);
        let days = body.as_array().unwrap();
        assert_eq!(days.len(), 1);
        let categories = days[0]["categories"].as_array().unwrap();
        assert_eq!(categories[0]["category"], "Main");
        assert_eq!(categories[0]["records"].as_array().unwrap().len(), 2);
        assert_eq!(categories[1]["records"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scrape_rejects_lookalike_host() {
        let (app, _store) = test_app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/scrape",
            Some(serde_json::json!({ "url": "https://shopback.com.evil.example/agoda" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 50), 50);
        assert_eq!(clamp_limit(Some(0), 50), 1);
        assert_eq!(clamp_limit(Some(5_000), 50), limits::MAX_LIMIT);
    }

    #[test]
    fn negative_rate_filter_is_rejected() {
        assert!(matches!(rate_param(-1.0), Err(AppError::Validation(_))));
        assert_eq!(rate_param(2.5).unwrap(), Rate::from_hundredths(250));
    }

    #[tokio::test]
    async fn enqueue_all_counts_duplicates() {
        let health = Arc::new(HealthState::new());
        let (queue, _rx, _pending) = ScrapeQueue::new(16, health);
        let urls = vec![
            "https://www.shopback.com.au/a".to_string(),
            "https://www.shopback.com.au/b".to_string(),
            "https://www.shopback.com.au/a".to_string(),
        ];
        assert_eq!(enqueue_all(&queue, &urls).unwrap(), (2, 1));
    }
}
