//! Offer extraction from merchant page HTML.
//!
//! Pages are matched on `data-testid` markers and a few class names rather
//! than parsed into a DOM; the helpers below only need balanced tags around
//! the elements they look at.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::{MAIN_CATEGORY, MAX_CATEGORY_LEN};
use crate::error::{AppError, Result};
use crate::types::{Rate, ScrapedOffer, ScrapedPage};

const LINE_THROUGH_CLASS: &str = "text-decor_line-through";

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("valid p regex"));
static H5_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h5\b([^>]*)>(.*?)</h5>").expect("valid h5 regex"));
static HEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)up to.*%.*cashback").expect("valid headline regex"));
static NAME_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cashback|discount|codes|vouchers|deals)\b").expect("valid name regex")
});

/// First percentage in `text`, e.g. "Up to 4.5% Cashback" → 4.5%.
/// Dollar amounts are not percentages and yield None.
pub fn parse_rate(text: &str) -> Option<Rate> {
    let caps = PERCENT_RE.captures(text)?;
    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    Rate::from_percent(percent)
}

/// Extract everything recorded for one scrape. Fails when the headline rate
/// is missing or unparseable; a page is never recorded as 0% by default.
pub fn parse_page(html: &str, url: &str) -> Result<ScrapedPage> {
    let name = extract_merchant_name(html, url);
    let main = extract_main_offer(html);

    let text = main
        .text
        .ok_or_else(|| AppError::Scrape(format!("no headline offer found on {url}")))?;
    let rate = parse_rate(&text)
        .ok_or_else(|| AppError::Scrape(format!("unparseable headline offer {text:?} on {url}")))?;

    let prior_rate = main.prior_offer.as_deref().and_then(parse_rate);

    Ok(ScrapedPage {
        name,
        url: url.to_string(),
        main: ScrapedOffer {
            category: MAIN_CATEGORY.to_string(),
            text,
            rate,
        },
        categories: extract_category_offers(html),
        upsized_badge: main.upsized_badge,
        prior_offer: main.prior_offer,
        prior_rate,
    })
}

pub fn extract_merchant_name(html: &str, url: &str) -> String {
    if let Some(caps) = TITLE_RE.captures(html) {
        let title = text_of(&caps[1]);
        if let Some((head, _)) = title.split_once('|') {
            let name = normalize_ws(&NAME_NOISE_RE.replace_all(head, " "));
            if !name.is_empty() {
                return name;
            }
        }
    }

    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name = slug
        .split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        "Unknown Store".to_string()
    } else {
        name
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct MainOffer {
    pub text: Option<String>,
    pub upsized_badge: bool,
    pub prior_offer: Option<String>,
}

pub fn extract_main_offer(html: &str) -> MainOffer {
    let text = element_inner(html, "current-offer")
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            // Struck-through headings carry the prior offer, never the current one.
            let headings: Vec<String> = H5_RE
                .captures_iter(html)
                .filter(|c| !c[1].contains(LINE_THROUGH_CLASS))
                .map(|c| text_of(&c[2]))
                .collect();
            headings
                .iter()
                .find(|h| HEADLINE_RE.is_match(h))
                .or_else(|| headings.iter().find(|h| PERCENT_RE.is_match(h)))
                .cloned()
        });

    let upsized_badge = P_RE
        .captures_iter(html)
        .any(|c| text_of(&c[1]).to_lowercase().contains("upsized"));

    let prior_offer = match element_inner(html, "worse-offer") {
        Some(inner) => Some(text_of(inner)).filter(|t| !t.is_empty()),
        None => H5_RE
            .captures_iter(html)
            .find(|c| c[1].contains(LINE_THROUGH_CLASS))
            .map(|c| text_of(&c[2]))
            .filter(|t| !t.is_empty()),
    };

    MainOffer {
        text,
        upsized_badge,
        prior_offer,
    }
}

/// Sub-category offers from the page's rate table. Rows are consecutive
/// `<p>` pairs of (label, rate); badges such as "Upsized" or "Ends in 3 days"
/// are ignored.
pub fn extract_category_offers(html: &str) -> Vec<ScrapedOffer> {
    let container = element_inner(html, "cashback-rates")
        .map(|inner| element_inner(inner, "cashback-tier-block").unwrap_or(inner))
        .or_else(|| element_inner(html, "all-cashback-rates"));
    let Some(container) = container else {
        debug!("no cashback rate table on page");
        return Vec::new();
    };

    let texts: Vec<String> = P_RE
        .captures_iter(container)
        .map(|c| text_of(&c[1]))
        .filter(|t| !t.is_empty() && !is_badge(t))
        .collect();

    let mut offers = Vec::new();
    let mut i = 0;
    while i + 1 < texts.len() {
        let (label, value) = (&texts[i], &texts[i + 1]);
        if label.contains('%') || !value.contains('%') {
            i += 1;
            continue;
        }
        i += 2;

        let Some(rate) = parse_rate(value) else {
            continue;
        };
        let category = truncate_category(label);
        if category == MAIN_CATEGORY {
            debug!("skipping sub-category using reserved label {MAIN_CATEGORY:?}");
            continue;
        }
        offers.push(ScrapedOffer {
            category,
            text: value.clone(),
            rate,
        });
    }
    offers
}

fn is_badge(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("upsized") || lower.starts_with("ends")
}

fn truncate_category(label: &str) -> String {
    if label.chars().count() > MAX_CATEGORY_LEN {
        let mut out: String = label.chars().take(MAX_CATEGORY_LEN).collect();
        out.push_str("...");
        out
    } else {
        label.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

/// Inner HTML of the first element carrying `data-testid="{testid}"`.
fn element_inner<'a>(html: &'a str, testid: &str) -> Option<&'a str> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let testid = testid.to_ascii_lowercase();
    let attr = [
        format!("data-testid=\"{testid}\""),
        format!("data-testid='{testid}'"),
    ]
    .iter()
    .filter_map(|needle| lower.find(needle.as_str()))
    .min()?;

    let tag_start = lower[..attr].rfind('<')?;
    let tag: String = lower[tag_start + 1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if tag.is_empty() {
        return None;
    }
    let start = attr + lower[attr..].find('>')? + 1;
    let end = matching_close(html, start, &tag)?;
    Some(&html[start..end])
}

/// Byte offset of the `</tag` closing the element whose content starts at `from`.
fn matching_close(html: &str, from: usize, tag: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;

    loop {
        let next_close = find_tag(&lower, &close, pos)?;
        match find_tag(&lower, &open, pos) {
            Some(next_open) if next_open < next_close => {
                depth += 1;
                pos = next_open + open.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some(next_close);
                }
                pos = next_close + close.len();
            }
        }
    }
}

/// Like `str::find` but skips prefixes of longer tag names (`<p` in `<path`).
fn find_tag(lower: &str, pat: &str, mut from: usize) -> Option<usize> {
    loop {
        let at = lower.get(from..)?.find(pat)? + from;
        let next = lower.as_bytes().get(at + pat.len());
        if matches!(next, Some(b) if b.is_ascii_alphanumeric()) {
            from = at + pat.len();
            continue;
        }
        return Some(at);
    }
}

/// Visible text of an HTML fragment: tags stripped, entities decoded,
/// whitespace collapsed.
fn text_of(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_PAGE: &str = r#"
        <html><head><title>Agoda Cashback Deals | ShopBack</title></head>
        <body>
          <div class="offer">
            <span data-testid="current-offer">Up to 7.5% Cashback</span>
            <h5 data-testid="worse-offer">Up to 5% Cashback</h5>
            <p class="badge">Upsized</p>
          </div>
          <div data-testid="cashback-rates">
            <div data-testid="cashback-tier-block">
              <div class="flex_row justify_space-between"><p>Hotels &amp; Resorts</p><p>7.5%</p></div>
              <div class="flex_row justify_space-between"><p>Flights</p><p>Up to 2%</p></div>
              <div class="flex_row justify_space-between"><p>Gift cards</p><p>$10</p></div>
              <div class="flex_row justify_space-between"><p>Main</p><p>3%</p></div>
            </div>
          </div>
          <p>Terms apply: 100% of purchases</p>
        </body></html>
    "#;

    const LEGACY_PAGE: &str = r#"
        <html><head><title>Myer</title></head>
        <body>
          <h5 class="title">Popular stores</h5>
          <h5 class="text-decor_line-through">4%</h5>
          <h5 class="rate">Up to 6% Cashback</h5>
          <div data-testid="all-cashback-rates">
            <div class="bg_sbds-background-color-secondary">
              <div class="flex_1"><p>Beauty</p></div>
              <p class="font_bold">Upsized</p>
              <p class="font_bold">8%</p>
              <p class="font_bold">Ends in 2 days</p>
            </div>
            <div class="bg_sbds-background-color-secondary">
              <div class="flex_1"><p>Home</p></div>
              <p class="font_bold">3.5%</p>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_rates() {
        assert_eq!(parse_rate("Up to 4.5% Cashback"), Some(Rate::from_hundredths(450)));
        assert_eq!(parse_rate("12%"), Some(Rate::from_hundredths(1200)));
        assert_eq!(parse_rate("$10 Cashback"), None);
        assert_eq!(parse_rate(""), None);
    }

    #[test]
    fn simple_page_extracts_everything() {
        let page = parse_page(SIMPLE_PAGE, "https://www.shopback.com.au/agoda").unwrap();
        assert_eq!(page.name, "Agoda");
        assert_eq!(page.main.category, "Main");
        assert_eq!(page.main.text, "Up to 7.5% Cashback");
        assert_eq!(page.main.rate, Rate::from_hundredths(750));
        assert!(page.upsized_badge);
        assert_eq!(page.prior_offer.as_deref(), Some("Up to 5% Cashback"));
        assert_eq!(page.prior_rate, Some(Rate::from_hundredths(500)));

        let categories: Vec<_> = page
            .categories
            .iter()
            .map(|o| (o.category.as_str(), o.rate.hundredths()))
            .collect();
        assert_eq!(categories, vec![("Hotels & Resorts", 750), ("Flights", 200)]);
    }

    #[test]
    fn legacy_page_falls_back_to_headings() {
        let page = parse_page(LEGACY_PAGE, "https://www.shopback.com.au/myer").unwrap();
        assert_eq!(page.name, "Myer");
        assert_eq!(page.main.rate, Rate::from_hundredths(600));
        assert_eq!(page.prior_offer.as_deref(), Some("4%"));
        assert!(page.upsized_badge);

        let categories: Vec<_> = page
            .categories
            .iter()
            .map(|o| (o.category.as_str(), o.rate.hundredths()))
            .collect();
        assert_eq!(categories, vec![("Beauty", 800), ("Home", 350)]);
    }

    #[test]
    fn struck_through_heading_is_not_the_headline() {
        let html = r#"<h5 class="text-decor_line-through">4%</h5><h5 class="rate">6% back</h5>"#;
        let main = extract_main_offer(html);
        assert_eq!(main.text.as_deref(), Some("6% back"));
        assert_eq!(main.prior_offer.as_deref(), Some("4%"));

        let page = parse_page(html, "https://www.shopback.com.au/myer").unwrap();
        assert_eq!(page.main.rate, Rate::from_hundredths(600));
        assert_eq!(page.prior_rate, Some(Rate::from_hundredths(400)));
    }

    #[test]
    fn only_struck_through_heading_means_no_headline() {
        let html = r#"<title>Myer | ShopBack</title><h5 class="text-decor_line-through">4%</h5>"#;
        let err = parse_page(html, "https://www.shopback.com.au/myer").unwrap_err();
        assert!(matches!(err, AppError::Scrape(_)));
    }

    #[test]
    fn testid_lookup_accepts_single_quotes_and_attribute_order() {
        let html = r#"<section class="x" data-testid='current-offer' id="o">Up to <b>3%</b></section>"#;
        assert_eq!(element_inner(html, "current-offer"), Some("Up to <b>3%</b>"));
        assert_eq!(element_inner(html, "worse-offer"), None);
    }

    #[test]
    fn missing_headline_is_an_error() {
        let html = "<html><title>Nothing | ShopBack</title><body><p>Closed</p></body></html>";
        let err = parse_page(html, "https://www.shopback.com.au/nothing").unwrap_err();
        assert!(matches!(err, AppError::Scrape(_)));
    }

    #[test]
    fn name_falls_back_to_url_slug() {
        assert_eq!(
            extract_merchant_name("<html></html>", "https://www.shopback.com.au/david-jones/"),
            "David Jones"
        );
    }

    #[test]
    fn long_category_is_truncated() {
        let label = "x".repeat(MAX_CATEGORY_LEN + 20);
        let truncated = truncate_category(&label);
        assert_eq!(truncated.chars().count(), MAX_CATEGORY_LEN + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn nested_same_tag_is_balanced() {
        let html = r#"<div data-testid="outer"><div><p>a</p></div><p>b</p></div><p>c</p>"#;
        assert_eq!(
            element_inner(html, "outer"),
            Some("<div><p>a</p></div><p>b</p>")
        );
    }
}
