use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// Cashback percentage in fixed point: hundredths of a percent (`4.5%` = 450).
///
/// Rates come from the source as discrete percentages, so equality between two
/// `Rate`s is exact integer equality. Serialized as a float percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rate(u32);

impl Rate {
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Rate(hundredths)
    }

    /// Round a percentage to the nearest hundredth. Negative, non-finite or
    /// out-of-range inputs are rejected.
    pub fn from_percent(percent: f64) -> Option<Self> {
        if !percent.is_finite() || percent < 0.0 {
            return None;
        }
        let hundredths = (percent * 100.0).round();
        if hundredths > f64::from(u32::MAX) {
            return None;
        }
        Some(Rate(hundredths as u32))
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn saturating_sub(self, other: Rate) -> Rate {
        Rate(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        match self.0 % 100 {
            0 => write!(f, "{whole}%"),
            frac if frac % 10 == 0 => write!(f, "{whole}.{}%", frac / 10),
            frac => write!(f, "{whole}.{frac:02}%"),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let percent = f64::deserialize(deserializer)?;
        Rate::from_percent(percent)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid cashback rate {percent}")))
    }
}

// ---------------------------------------------------------------------------
// Observations & merchants
// ---------------------------------------------------------------------------

/// One scraped data point for a merchant's category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub merchant_id: i64,
    pub category: String,
    pub rate: Rate,
    pub observed_at: DateTime<Utc>,
    /// Rate the page showed as "previous offer", if it showed one.
    pub prior_rate: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Observation joined with its merchant, as returned by history queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub merchant_id: i64,
    pub merchant_name: String,
    pub merchant_url: String,
    pub category: String,
    /// Offer text exactly as scraped, e.g. "Up to 4.5% Cashback".
    pub rate_text: String,
    pub rate: Rate,
    pub prior_offer: Option<String>,
    pub prior_rate: Option<Rate>,
    /// Whether the page itself displayed an "Upsized" badge at scrape time.
    pub upsized_badge: bool,
    pub observed_at: DateTime<Utc>,
}

impl From<&HistoryRecord> for Observation {
    fn from(record: &HistoryRecord) -> Self {
        Observation {
            merchant_id: record.merchant_id,
            category: record.category.clone(),
            rate: record.rate,
            observed_at: record.observed_at,
            prior_rate: record.prior_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Scrape results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedOffer {
    pub category: String,
    pub text: String,
    pub rate: Rate,
}

/// Everything extracted from one merchant page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub name: String,
    pub url: String,
    pub main: ScrapedOffer,
    pub categories: Vec<ScrapedOffer>,
    pub upsized_badge: bool,
    pub prior_offer: Option<String>,
    pub prior_rate: Option<Rate>,
}

/// Unit of work for the scrape worker.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub url: String,
}
