pub mod models;
pub mod store;

pub use store::{HistoryFilter, ObservationStore};
