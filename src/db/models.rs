//! Database row types matching `migrations/`. Timestamps are Unix milliseconds
//! and rates are hundredths of a percent; conversion into domain types rejects
//! rows that break those invariants instead of coercing them.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::types::{HistoryRecord, Merchant, Observation, Rate};

#[derive(Debug, sqlx::FromRow)]
pub struct MerchantRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ObservationRow {
    pub merchant_id: i64,
    pub category: String,
    pub rate_hundredths: i64,
    pub prior_rate_hundredths: Option<i64>,
    pub observed_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub merchant_id: i64,
    pub merchant_name: String,
    pub merchant_url: String,
    pub category: String,
    pub rate_text: String,
    pub rate_hundredths: i64,
    pub prior_offer: Option<String>,
    pub prior_rate_hundredths: Option<i64>,
    pub upsized_badge: bool,
    pub observed_at: i64,
}

pub fn rate_from_column(hundredths: i64) -> Result<Rate> {
    u32::try_from(hundredths)
        .map(Rate::from_hundredths)
        .map_err(|_| AppError::InvalidRecord(format!("rate out of range: {hundredths}")))
}

pub fn timestamp_from_column(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::InvalidRecord(format!("timestamp out of range: {ms}")))
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = AppError;

    fn try_from(row: MerchantRow) -> Result<Self> {
        Ok(Merchant {
            id: row.id,
            name: row.name,
            url: row.url,
            created_at: timestamp_from_column(row.created_at)?,
            updated_at: timestamp_from_column(row.updated_at)?,
        })
    }
}

impl TryFrom<ObservationRow> for Observation {
    type Error = AppError;

    fn try_from(row: ObservationRow) -> Result<Self> {
        Ok(Observation {
            merchant_id: row.merchant_id,
            category: row.category,
            rate: rate_from_column(row.rate_hundredths)?,
            observed_at: timestamp_from_column(row.observed_at)?,
            prior_rate: row.prior_rate_hundredths.map(rate_from_column).transpose()?,
        })
    }
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryRecord {
            id: row.id,
            merchant_id: row.merchant_id,
            merchant_name: row.merchant_name,
            merchant_url: row.merchant_url,
            category: row.category,
            rate_text: row.rate_text,
            rate: rate_from_column(row.rate_hundredths)?,
            prior_offer: row.prior_offer,
            prior_rate: row.prior_rate_hundredths.map(rate_from_column).transpose()?,
            upsized_badge: row.upsized_badge,
            observed_at: timestamp_from_column(row.observed_at)?,
        })
    }
}
