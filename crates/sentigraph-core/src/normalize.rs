//! Raw row → typed record conversion.
//!
//! Rows that cannot be parsed are dropped (`None`), never reported as errors:
//! the only trace they leave is a lower record count.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::identity::derive_post_id;
use crate::model::{PostRow, PriceRow, SentimentScore};

/// Column names of the price and post CSV sources.
pub mod columns {
    pub const DATE: &str = "Date";
    pub const TICKER: &str = "Stock Name";
    pub const OPEN: &str = "Open";
    pub const HIGH: &str = "High";
    pub const LOW: &str = "Low";
    pub const CLOSE: &str = "Close";
    pub const VOLUME: &str = "Volume";
    pub const TEXT: &str = "Tweet";
    pub const USER: &str = "User";
    pub const TOPICS: &str = "Topics";
    pub const SENTIMENT: &str = "Sentiment";
    pub const CONFIDENCE: &str = "Confidence";
    pub const EVENT_ID: &str = "EventId";
}

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"));
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid mention regex"));

/// Named-column access to one raw source row.
///
/// Implementations only provide the untouched cell. `field` returns `None`
/// both for absent columns and for empty or `NaN` cells, so optional columns
/// never surface a blank string. `text` keeps a literal `NaN` as content.
pub trait Fields {
    fn raw(&self, column: &str) -> Option<&str>;

    fn field(&self, column: &str) -> Option<&str> {
        self.raw(column).and_then(non_null)
    }

    fn text(&self, column: &str) -> Option<&str> {
        self.raw(column).map(str::trim).filter(|v| !v.is_empty())
    }
}

impl Fields for HashMap<String, String> {
    fn raw(&self, column: &str) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl Fields for HashMap<&str, &str> {
    fn raw(&self, column: &str) -> Option<&str> {
        self.get(column).copied()
    }
}

/// Treats blank cells and pandas-style `NaN` markers as missing.
pub fn non_null(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed)
    }
}

/// Parse a source timestamp. Offsets are dropped, keeping the wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse only the calendar date of a source timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|ts| ts.date())
}

/// Every `#tag` in `text`, without the `#`, case preserved, duplicates kept.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_RE.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Every `@handle` in `text`, without the `@`, case preserved, duplicates kept.
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Split a pipe-delimited topic list.
pub fn split_topics(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize one price row.
pub fn normalize_price(row: &impl Fields) -> Option<PriceRow> {
    let ticker = row.field(columns::TICKER)?;
    let date = parse_date(row.field(columns::DATE)?)?;
    let open = parse_f64(row.field(columns::OPEN)?)?;
    let high = parse_f64(row.field(columns::HIGH)?)?;
    let low = parse_f64(row.field(columns::LOW)?)?;
    let close = parse_f64(row.field(columns::CLOSE)?)?;
    let volume = parse_volume(row.field(columns::VOLUME)?)?;

    Some(PriceRow::new(ticker, date, open, high, low, close, volume))
}

/// Normalize one post row.
pub fn normalize_post(row: &impl Fields) -> Option<PostRow> {
    let ticker = row.field(columns::TICKER)?.to_string();
    let raw_timestamp = row.field(columns::DATE)?.to_string();
    let timestamp = parse_timestamp(&raw_timestamp)?;
    let text = row.text(columns::TEXT).unwrap_or("").to_string();

    // Both halves or neither; a half-scored post is left for enrichment.
    let sentiment = row
        .field(columns::SENTIMENT)
        .and_then(parse_f64)
        .zip(row.field(columns::CONFIDENCE).and_then(parse_f64))
        .map(|(sentiment, confidence)| SentimentScore::new(sentiment, confidence));

    Some(PostRow {
        id: derive_post_id(Some(&text), &raw_timestamp),
        ticker,
        hashtags: extract_hashtags(&text),
        mentions: extract_mentions(&text),
        topics: row.field(columns::TOPICS).map(split_topics).unwrap_or_default(),
        sentiment,
        user_id: row.field(columns::USER).map(str::to_string),
        event_id: row.field(columns::EVENT_ID).map(str::to_string),
        date_only: timestamp.date(),
        timestamp,
        raw_timestamp,
        text,
    })
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_volume(value: &str) -> Option<i64> {
    let value = value.trim();
    value
        .parse::<i64>()
        .ok()
        .or_else(|| parse_f64(value).map(|v| v as i64))
}
