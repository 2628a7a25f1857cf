use std::collections::BTreeMap;

use crate::config::MAIN_CATEGORY;
use crate::stats::engine::CategoryStatistic;

/// A merchant is upsized when its current headline rate ties or beats every
/// earlier headline rate and there is more than one headline observation.
/// A lone first observation is a baseline, not a record. Sub-categories are
/// ignored.
pub fn is_upsized(statistics: &BTreeMap<String, CategoryStatistic>) -> bool {
    statistics
        .get(MAIN_CATEGORY)
        .is_some_and(|main| main.is_current_highest && main.observation_count > 1)
}
