use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::config::MAIN_CATEGORY;
use crate::db::models::{HistoryRow, MerchantRow, ObservationRow};
use crate::error::{AppError, Result};
use crate::types::{HistoryRecord, Merchant, Observation, Rate, ScrapedPage};

const HISTORY_SELECT: &str = r#"
    SELECT o.id, o.merchant_id, m.name AS merchant_name, m.url AS merchant_url,
           o.category, o.rate_text, o.rate_hundredths, o.prior_offer,
           o.prior_rate_hundredths, o.upsized_badge, o.observed_at
    FROM observations o
    JOIN merchants m ON m.id = o.merchant_id
"#;

/// Filters for the cross-merchant history listing.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub merchant_name: Option<String>,
    pub min_rate: Option<Rate>,
    pub max_rate: Option<Rate>,
    pub limit: i64,
    pub offset: i64,
}

/// SQLite-backed store of merchants and their scraped observations.
#[derive(Clone)]
pub struct ObservationStore {
    pool: SqlitePool,
}

impl ObservationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one scraped page as a "Main" observation plus one observation
    /// per sub-category, all stamped `observed_at`. Returns the merchant id.
    pub async fn record_scrape(&self, page: &ScrapedPage, observed_at: DateTime<Utc>) -> Result<i64> {
        validate_page(page)?;
        let at = observed_at.timestamp_millis();

        let mut tx = self.pool.begin().await?;

        let merchant_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO merchants (name, url, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&page.name)
        .bind(&page.url)
        .bind(at)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO observations (
                merchant_id, category, rate_text, rate_hundredths,
                prior_offer, prior_rate_hundredths, upsized_badge, observed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(merchant_id)
        .bind(MAIN_CATEGORY)
        .bind(&page.main.text)
        .bind(i64::from(page.main.rate.hundredths()))
        .bind(&page.prior_offer)
        .bind(page.prior_rate.map(|r| i64::from(r.hundredths())))
        .bind(page.upsized_badge)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        for offer in &page.categories {
            sqlx::query(
                r#"
                INSERT INTO observations (
                    merchant_id, category, rate_text, rate_hundredths,
                    prior_offer, prior_rate_hundredths, upsized_badge, observed_at
                ) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?)
                "#,
            )
            .bind(merchant_id)
            .bind(&offer.category)
            .bind(&offer.text)
            .bind(i64::from(offer.rate.hundredths()))
            .bind(page.upsized_badge)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            merchant_id,
            categories = page.categories.len(),
            "recorded scrape for {}",
            page.name
        );
        Ok(merchant_id)
    }

    pub async fn list_merchants(
        &self,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<Vec<Merchant>> {
        let pattern = search.map(like_pattern);
        let rows: Vec<MerchantRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM merchants
            WHERE ? IS NULL OR name LIKE ?
            ORDER BY updated_at DESC, id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Merchant::try_from).collect()
    }

    pub async fn merchant(&self, merchant_id: i64) -> Result<Option<Merchant>> {
        let row: Option<MerchantRow> = sqlx::query_as(
            "SELECT id, name, url, created_at, updated_at FROM merchants WHERE id = ?",
        )
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Merchant::try_from).transpose()
    }

    /// Merchants whose name contains `name`, ordered by name.
    pub async fn merchants_named(&self, name: &str) -> Result<Vec<Merchant>> {
        let rows: Vec<MerchantRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM merchants
            WHERE name LIKE ?
            ORDER BY name, id
            "#,
        )
        .bind(like_pattern(name))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Merchant::try_from).collect()
    }

    pub async fn all_merchants(&self) -> Result<Vec<Merchant>> {
        let rows: Vec<MerchantRow> = sqlx::query_as(
            "SELECT id, name, url, created_at, updated_at FROM merchants ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Merchant::try_from).collect()
    }

    pub async fn merchant_urls(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar("SELECT url FROM merchants ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }

    /// Full history of one merchant, oldest first. Rows sharing a timestamp
    /// keep insertion order.
    pub async fn observations_for_merchant(&self, merchant_id: i64) -> Result<Vec<Observation>> {
        let rows: Vec<ObservationRow> = sqlx::query_as(
            r#"
            SELECT merchant_id, category, rate_hundredths, prior_rate_hundredths, observed_at
            FROM observations
            WHERE merchant_id = ?
            ORDER BY observed_at, id
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Observation::try_from).collect()
    }

    /// Every merchant's history, oldest first. Merchants without observations
    /// map to an empty history.
    pub async fn observations_by_merchant(&self) -> Result<BTreeMap<i64, Vec<Observation>>> {
        let merchant_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM merchants")
            .fetch_all(&self.pool)
            .await?;
        let mut by_merchant: BTreeMap<i64, Vec<Observation>> =
            merchant_ids.into_iter().map(|id| (id, Vec::new())).collect();

        let rows: Vec<ObservationRow> = sqlx::query_as(
            r#"
            SELECT merchant_id, category, rate_hundredths, prior_rate_hundredths, observed_at
            FROM observations
            ORDER BY merchant_id, observed_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let obs = Observation::try_from(row)?;
            by_merchant.entry(obs.merchant_id).or_default().push(obs);
        }
        Ok(by_merchant)
    }

    /// One merchant's records, newest first. `None` returns the full history.
    pub async fn merchant_history(
        &self,
        merchant_id: i64,
        category: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryRecord>> {
        let sql = format!(
            "{HISTORY_SELECT} WHERE o.merchant_id = ? AND (? IS NULL OR o.category = ?) \
             ORDER BY o.observed_at DESC, o.id DESC LIMIT ?"
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql)
            .bind(merchant_id)
            .bind(category)
            .bind(category)
            // SQLite treats a negative LIMIT as unbounded.
            .bind(limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HistoryRecord::try_from).collect()
    }

    /// Cross-merchant records, newest first.
    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(HISTORY_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(name) = &filter.merchant_name {
            qb.push(" AND m.name LIKE ").push_bind(like_pattern(name));
        }
        if let Some(min) = filter.min_rate {
            qb.push(" AND o.rate_hundredths >= ")
                .push_bind(i64::from(min.hundredths()));
        }
        if let Some(max) = filter.max_rate {
            qb.push(" AND o.rate_hundredths <= ")
                .push_bind(i64::from(max.hundredths()));
        }
        qb.push(" ORDER BY o.observed_at DESC, o.id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows: Vec<HistoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(HistoryRecord::try_from).collect()
    }

    /// Remove a merchant and all its observations. Returns the deleted
    /// merchant's name, or None if it did not exist.
    pub async fn delete_merchant(&self, merchant_id: i64) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let name: Option<String> = sqlx::query_scalar("SELECT name FROM merchants WHERE id = ?")
            .bind(merchant_id)
            .fetch_optional(&mut *tx)
            .await?;
        if name.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM observations WHERE merchant_id = ?")
            .bind(merchant_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM merchants WHERE id = ?")
            .bind(merchant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(name)
    }
}

fn like_pattern(fragment: &str) -> String {
    format!("%{fragment}%")
}

/// Ingestion boundary checks. Rates are non-negative by construction.
fn validate_page(page: &ScrapedPage) -> Result<()> {
    if page.name.trim().is_empty() {
        return Err(AppError::Validation(format!("empty merchant name for {}", page.url)));
    }
    if page.url.trim().is_empty() {
        return Err(AppError::Validation("empty merchant url".to_string()));
    }
    for offer in &page.categories {
        if offer.category.trim().is_empty() {
            return Err(AppError::Validation(format!("empty category label on {}", page.url)));
        }
        if offer.category == MAIN_CATEGORY {
            return Err(AppError::Validation(format!(
                "sub-category may not be named {MAIN_CATEGORY:?} on {}",
                page.url
            )));
        }
    }
    Ok(())
}
