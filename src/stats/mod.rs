pub mod engine;
pub mod grouping;
pub mod ranking;
pub mod summary;
pub mod trend;
pub mod upsize;

pub use engine::{compute_category_statistics, CategoryStatistic};
pub use grouping::{group_history_by_day, DailyHistory};
pub use ranking::rank_by_current_rate;
pub use summary::{compute_summary, DashboardSummary};
pub use trend::{daily_trend, TrendPoint};
pub use upsize::is_upsized;
