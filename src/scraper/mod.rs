pub mod client;
pub mod parse;
pub mod queue;
pub mod worker;

pub use client::ScrapeClient;
pub use queue::ScrapeQueue;
pub use worker::ScrapeWorker;
