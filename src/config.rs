use crate::error::{AppError, Result};

/// Category label of a merchant's headline offer.
pub const MAIN_CATEGORY: &str = "Main";

/// Trailing window used by the dashboard's "recent observations" count.
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Channel capacity for queued scrape jobs.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Scraped sub-category labels longer than this are truncated with "...".
pub const MAX_CATEGORY_LEN: usize = 100;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default merchant hosts. Subdomains (`www.`) of these are accepted too.
pub const ALLOWED_HOSTS: &str = "shopback.com,shopback.com.au";

/// Bounds for list endpoints. Out-of-range query values are clamped.
pub mod limits {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;
    pub const DEFAULT_TOP_LIMIT: usize = 10;
    pub const MAX_TOP_LIMIT: usize = 50;
    pub const DEFAULT_TREND_DAYS: i64 = 30;
    pub const MAX_TREND_DAYS: i64 = 365;
    pub const MIN_SCRAPE_DELAY_SECS: u64 = 1;
    pub const MAX_SCRAPE_DELAY_SECS: u64 = 10;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Pause between URLs of one scrape batch (SCRAPE_DELAY_SECS, clamped 1..=10)
    pub scrape_delay_secs: u64,
    /// Per-request timeout for merchant page fetches (SCRAPE_TIMEOUT_SECS)
    pub scrape_timeout_secs: u64,
    /// Hosts merchant URLs may point at (SCRAPE_ALLOWED_HOSTS, comma-separated).
    pub allowed_hosts: Vec<String>,
    /// Origins allowed by CORS (CORS_ORIGINS, comma-separated).
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        use limits::{MAX_SCRAPE_DELAY_SECS, MIN_SCRAPE_DELAY_SECS};

        let allowed_hosts = parse_list(
            &std::env::var("SCRAPE_ALLOWED_HOSTS").unwrap_or_else(|_| ALLOWED_HOSTS.to_string()),
        )
        .into_iter()
        .map(|h| h.to_ascii_lowercase())
        .collect::<Vec<_>>();
        if allowed_hosts.is_empty() {
            return Err(AppError::Config(
                "SCRAPE_ALLOWED_HOSTS must name at least one host".to_string(),
            ));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "cashback.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8001".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            scrape_delay_secs: std::env::var("SCRAPE_DELAY_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<u64>()
                .unwrap_or(2)
                .clamp(MIN_SCRAPE_DELAY_SECS, MAX_SCRAPE_DELAY_SECS),
            scrape_timeout_secs: std::env::var("SCRAPE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
            allowed_hosts,
            cors_origins: parse_list(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string()),
            ),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
