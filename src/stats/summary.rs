use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::{MAIN_CATEGORY, RECENT_WINDOW_HOURS};
use crate::stats::engine::compute_category_statistics;
use crate::stats::upsize::is_upsized;
use crate::types::Observation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_merchants: usize,
    pub total_observations: usize,
    pub recent_observations: usize,
    pub upsized_merchant_count: usize,
    /// Mean current headline rate in percent, over merchants that have one.
    pub avg_main_rate: Option<f64>,
}

/// Cross-merchant dashboard figures. `now` anchors the trailing 24h window.
pub fn compute_summary(
    by_merchant: &BTreeMap<i64, Vec<Observation>>,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let window_start = now - Duration::hours(RECENT_WINDOW_HOURS);

    let mut total_observations = 0;
    let mut recent_observations = 0;
    let mut upsized_merchant_count = 0;
    let mut main_sum_hundredths: u64 = 0;
    let mut main_count: u64 = 0;

    for observations in by_merchant.values() {
        total_observations += observations.len();
        recent_observations += observations
            .iter()
            .filter(|o| o.observed_at > window_start)
            .count();

        let stats = compute_category_statistics(observations);
        if is_upsized(&stats) {
            upsized_merchant_count += 1;
        }
        if let Some(main) = stats.get(MAIN_CATEGORY) {
            main_sum_hundredths += u64::from(main.current_rate.hundredths());
            main_count += 1;
        }
    }

    let avg_main_rate =
        (main_count > 0).then(|| main_sum_hundredths as f64 / main_count as f64 / 100.0);

    DashboardSummary {
        total_merchants: by_merchant.len(),
        total_observations,
        recent_observations,
        upsized_merchant_count,
        avg_main_rate,
    }
}
