use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::stats::engine::CategoryStatistic;

/// Merchants carrying `category`, highest current rate first. Equal rates
/// fall back to the lower merchant id.
pub fn rank_by_current_rate<'a>(
    per_merchant: &'a BTreeMap<i64, BTreeMap<String, CategoryStatistic>>,
    category: &str,
    limit: usize,
) -> Vec<(i64, &'a CategoryStatistic)> {
    let mut ranked: Vec<_> = per_merchant
        .iter()
        .filter_map(|(&merchant_id, stats)| stats.get(category).map(|s| (merchant_id, s)))
        .collect();
    ranked.sort_by_key(|&(merchant_id, stat)| (Reverse(stat.current_rate), merchant_id));
    ranked.truncate(limit);
    ranked
}
