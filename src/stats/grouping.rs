//! Display reshaping of a merchant's history: day → category → records.
//!
//! Statistics are computed beforehand by the engine and only attached here.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::MAIN_CATEGORY;
use crate::stats::engine::CategoryStatistic;
use crate::types::HistoryRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyHistory {
    pub date: NaiveDate,
    pub categories: Vec<CategoryDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDay {
    pub category: String,
    /// Newest first.
    pub records: Vec<HistoryRecord>,
    /// All-time statistic for the category, not just this day.
    pub statistic: Option<CategoryStatistic>,
}

/// Days newest first; "Main" leads each day, other categories follow alphabetically.
pub fn group_history_by_day(
    history: &[HistoryRecord],
    statistics: &BTreeMap<String, CategoryStatistic>,
) -> Vec<DailyHistory> {
    let mut days: BTreeMap<Reverse<NaiveDate>, BTreeMap<(bool, &str), Vec<&HistoryRecord>>> =
        BTreeMap::new();

    for record in history {
        let date = record.observed_at.date_naive();
        let key = (record.category != MAIN_CATEGORY, record.category.as_str());
        days.entry(Reverse(date))
            .or_default()
            .entry(key)
            .or_default()
            .push(record);
    }

    days.into_iter()
        .map(|(Reverse(date), categories)| DailyHistory {
            date,
            categories: categories
                .into_iter()
                .map(|((_, category), mut records)| {
                    records.sort_by_key(|r| Reverse((r.observed_at, r.id)));
                    CategoryDay {
                        category: category.to_string(),
                        records: records.into_iter().cloned().collect(),
                        statistic: statistics.get(category).cloned(),
                    }
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::engine::compute_category_statistics;
    use crate::types::{Observation, Rate};
    use chrono::{TimeZone, Utc};

    fn record(id: i64, category: &str, percent: u32, day: u32, hour: u32) -> HistoryRecord {
        HistoryRecord {
            id,
            merchant_id: 1,
            merchant_name: "Agoda".to_string(),
            merchant_url: "https://www.shopback.com.au/agoda".to_string(),
            category: category.to_string(),
            rate_text: format!("{percent}%"),
            rate: Rate::from_hundredths(percent * 100),
            prior_offer: None,
            prior_rate: None,
            upsized_badge: false,
            observed_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn groups_newest_day_first_with_main_leading() {
        let history = vec![
            record(1, "Main", 5, 1, 9),
            record(2, "Hotels", 3, 1, 9),
            record(3, "Main", 6, 2, 9),
            record(4, "Flights", 1, 2, 9),
            record(5, "Hotels", 4, 2, 9),
            record(6, "Main", 7, 2, 18),
        ];
        let observations: Vec<_> = history.iter().map(Observation::from).collect();
        let stats = compute_category_statistics(&observations);

        let days = group_history_by_day(&history, &stats);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());

        let names: Vec<_> = days[0].categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Main", "Flights", "Hotels"]);

        let main = &days[0].categories[0];
        assert_eq!(main.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![6, 3]);
        assert_eq!(main.statistic.as_ref().unwrap().highest_rate, Rate::from_hundredths(700));

        assert_eq!(days[1].categories.len(), 2);
        assert_eq!(days[1].categories[0].category, "Main");
    }

    #[test]
    fn missing_statistic_is_none() {
        let history = vec![record(1, "Main", 5, 1, 9)];
        let days = group_history_by_day(&history, &BTreeMap::new());
        assert!(days[0].categories[0].statistic.is_none());
    }

    #[test]
    fn empty_history_has_no_days() {
        assert!(group_history_by_day(&[], &BTreeMap::new()).is_empty());
    }
}
