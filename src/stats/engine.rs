use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Observation, Rate};

/// Extremes and flags for one (merchant, category) history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistic {
    pub category: String,
    pub current_rate: Rate,
    pub current_observed_at: DateTime<Utc>,
    /// Prior-offer marker carried by the current observation, if any.
    pub current_prior_rate: Option<Rate>,
    pub highest_rate: Rate,
    pub highest_observed_at: DateTime<Utc>,
    pub lowest_rate: Rate,
    pub lowest_observed_at: DateTime<Utc>,
    pub is_current_highest: bool,
    pub is_current_lowest: bool,
    pub gap_to_highest: Rate,
    pub observation_count: usize,
}

/// Compute per-category statistics for one merchant's observations.
///
/// Input order does not need to be chronological: each category is sorted by
/// `observed_at` with a stable sort, so equal timestamps keep their input
/// order and the last of them is "current". Extremes report the earliest
/// observation that reached the extreme rate. An empty input yields an empty map.
pub fn compute_category_statistics(
    observations: &[Observation],
) -> BTreeMap<String, CategoryStatistic> {
    debug_assert!(
        observations
            .windows(2)
            .all(|pair| pair[0].merchant_id == pair[1].merchant_id),
        "observations from more than one merchant"
    );

    let mut by_category: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        by_category.entry(obs.category.as_str()).or_default().push(obs);
    }

    by_category
        .into_iter()
        .filter_map(|(category, mut history)| {
            history.sort_by_key(|o| o.observed_at);
            summarize(category, &history).map(|stat| (category.to_string(), stat))
        })
        .collect()
}

/// `history` must already be sorted ascending by `observed_at`.
fn summarize(category: &str, history: &[&Observation]) -> Option<CategoryStatistic> {
    let current = *history.last()?;
    let mut highest = history[0];
    let mut lowest = history[0];

    // Strict comparisons: the first (earliest) holder of an extreme wins ties.
    for &obs in &history[1..] {
        if obs.rate > highest.rate {
            highest = obs;
        }
        if obs.rate < lowest.rate {
            lowest = obs;
        }
    }

    Some(CategoryStatistic {
        category: category.to_string(),
        current_rate: current.rate,
        current_observed_at: current.observed_at,
        current_prior_rate: current.prior_rate,
        highest_rate: highest.rate,
        highest_observed_at: highest.observed_at,
        lowest_rate: lowest.rate,
        lowest_observed_at: lowest.observed_at,
        is_current_highest: current.rate == highest.rate,
        is_current_lowest: current.rate == lowest.rate,
        gap_to_highest: highest.rate.saturating_sub(current.rate),
        observation_count: history.len(),
    })
}
