//! Normalized records handed to the graph writer.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::identity::PostId;

/// Calendar date format used for `TradingDay` keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format stored on post nodes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One daily price bar for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub daily_change: f64,
    pub volatility: f64,
}

impl PriceRow {
    /// Build a bar, deriving `daily_change` and `volatility` from the prices.
    pub fn new(
        ticker: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        let (daily_change, volatility) = if open != 0.0 {
            ((close - open) / open, (high - low) / open)
        } else {
            (0.0, 0.0)
        };

        Self {
            ticker: ticker.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
            daily_change,
            volatility,
        }
    }

    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

/// A sentiment value together with the classifier confidence.
///
/// Both halves always travel together so a post can never carry one without
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub sentiment: f64,
    pub confidence: f64,
}

impl SentimentScore {
    pub fn new(sentiment: f64, confidence: f64) -> Self {
        Self { sentiment, confidence }
    }
}

/// One social post, normalized and ready for upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: PostId,
    pub ticker: String,
    pub text: String,
    /// Timestamp string exactly as read from the source.
    pub raw_timestamp: String,
    pub timestamp: NaiveDateTime,
    pub date_only: NaiveDate,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: Option<SentimentScore>,
    pub user_id: Option<String>,
    pub event_id: Option<String>,
}

impl PostRow {
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn date_key(&self) -> String {
        self.date_only.format(DATE_FORMAT).to_string()
    }
}

/// A sentiment write-back for an existing post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentUpdate {
    pub id: PostId,
    pub score: SentimentScore,
}

impl SentimentUpdate {
    pub fn new(id: PostId, score: SentimentScore) -> Self {
        Self { id, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 9, 30).unwrap()
    }

    #[test]
    fn test_price_metrics() {
        let row = PriceRow::new("AAPL", day(), 100.0, 110.0, 95.0, 105.0, 1_000);
        assert!((row.daily_change - 0.05).abs() < 1e-12);
        assert!((row.volatility - 0.15).abs() < 1e-12);
        assert_eq!(row.date_key(), "2021-09-30");
    }

    #[test]
    fn test_zero_open_guards_division() {
        for (high, low, close) in [(0.0, 0.0, 0.0), (10.0, 1.0, 5.0), (-3.0, 7.0, 1e9)] {
            let row = PriceRow::new("X", day(), 0.0, high, low, close, 0);
            assert_eq!(row.daily_change, 0.0);
            assert_eq!(row.volatility, 0.0);
        }
    }
}
