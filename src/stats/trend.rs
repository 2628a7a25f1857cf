use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{Observation, Rate};

/// Per-day aggregate of one category's rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub avg_rate: f64,
    pub max_rate: Rate,
    pub min_rate: Rate,
    pub count: usize,
}

/// Daily mean/max/min for `category`, from `since` onwards, oldest day first.
pub fn daily_trend(
    observations: &[Observation],
    category: &str,
    since: DateTime<Utc>,
) -> Vec<TrendPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<Rate>> = BTreeMap::new();
    for obs in observations
        .iter()
        .filter(|o| o.category == category && o.observed_at >= since)
    {
        days.entry(obs.observed_at.date_naive()).or_default().push(obs.rate);
    }

    days.into_iter()
        .filter_map(|(date, rates)| {
            let max_rate = *rates.iter().max()?;
            let min_rate = *rates.iter().min()?;
            let sum: u64 = rates.iter().map(|r| u64::from(r.hundredths())).sum();
            Some(TrendPoint {
                date,
                avg_rate: sum as f64 / rates.len() as f64 / 100.0,
                max_rate,
                min_rate,
                count: rates.len(),
            })
        })
        .collect()
}
