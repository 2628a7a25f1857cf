use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Url;
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::scraper::parse::parse_page;
use crate::types::ScrapedPage;

/// Fetches merchant pages and turns them into `ScrapedPage`s.
#[derive(Clone)]
pub struct ScrapeClient {
    http: reqwest::Client,
    allowed_hosts: Vec<String>,
}

impl ScrapeClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.scrape_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            allowed_hosts: cfg.allowed_hosts.clone(),
        })
    }

    pub fn validate_url(&self, url: &str) -> Result<()> {
        validate_merchant_url(url, &self.allowed_hosts)
    }

    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        self.validate_url(url)?;

        let resp = self.http.get(url).send().await?.error_for_status()?;
        debug!(
            url,
            content_type = ?resp.headers().get(reqwest::header::CONTENT_TYPE),
            "fetched merchant page"
        );
        let html = resp.text().await?;

        parse_page(&html, url)
    }
}

/// Only http(s) URLs on an allowed host, or a subdomain of one, are scraped.
pub fn validate_merchant_url(url: &str, allowed_hosts: &[String]) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|e| AppError::Validation(format!("invalid URL {url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!("unsupported scheme in {url:?}")));
    }
    match parsed.host_str() {
        Some(host) if allowed_hosts.iter().any(|allowed| host_matches(host, allowed)) => Ok(()),
        _ => Err(AppError::Validation(format!(
            "URL must be a merchant page on {}: {url}",
            allowed_hosts.join(", ")
        ))),
    }
}

/// Exact match, or `allowed` preceded by a label boundary.
fn host_matches(host: &str, allowed: &str) -> bool {
    let host = host.trim_end_matches('.');
    host.eq_ignore_ascii_case(allowed)
        || host
            .len()
            .checked_sub(allowed.len() + 1)
            .is_some_and(|dot| {
                host.as_bytes()[dot] == b'.' && host[dot + 1..].eq_ignore_ascii_case(allowed)
            })
}
