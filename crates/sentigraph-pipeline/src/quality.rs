//! Pre-ingestion checks over the raw CSV sources.

use std::collections::HashSet;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use sentigraph_core::normalize::{columns, parse_date};
use sentigraph_core::{Fields, SentigraphResult};

use crate::ingest::SourceKind;
use crate::source::{CsvSource, RawRow, MAX_CHUNK_SIZE};

const PRICE_COLUMNS: [&str; 4] = [columns::DATE, columns::TICKER, columns::CLOSE, columns::VOLUME];
const POST_COLUMNS: [&str; 3] = [columns::DATE, columns::TEXT, columns::TICKER];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceChecks {
    pub invalid_dates: usize,
    /// Close present but not a positive number.
    pub bad_close: usize,
    /// Volume present but negative or not a number.
    pub bad_volume: usize,
    /// Rows repeating an earlier (date, ticker) pair.
    pub duplicate_keys: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostChecks {
    pub invalid_dates: usize,
    pub null_text: usize,
    pub null_ticker: usize,
    /// Rows repeating an earlier (text, calendar date) pair.
    pub duplicate_text_per_day: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QualityChecks {
    Prices(PriceChecks),
    Posts(PostChecks),
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub kind: SourceKind,
    pub source: String,
    pub rows: usize,
    pub malformed_lines: usize,
    pub missing_columns: Vec<String>,
    /// Absent when required columns are missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<QualityChecks>,
}

impl QualityReport {
    fn new(kind: SourceKind, source: &CsvSource, required: &[&str]) -> SentigraphResult<Self> {
        let headers = source.headers()?;
        let missing_columns = required
            .iter()
            .filter(|c| !headers.iter().any(|h| h.trim() == **c))
            .map(|c| c.to_string())
            .collect();

        Ok(Self {
            kind,
            source: source.path().display().to_string(),
            rows: 0,
            malformed_lines: 0,
            missing_columns,
            checks: None,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_ok() {
            return write!(f, "{} source: missing columns {}", self.kind, self.missing_columns.join(", "));
        }
        write!(f, "{} source: {} rows", self.kind, self.rows)?;
        match &self.checks {
            Some(QualityChecks::Prices(c)) => write!(
                f,
                ", {} invalid dates, {} bad close, {} bad volume, {} duplicate keys",
                c.invalid_dates, c.bad_close, c.bad_volume, c.duplicate_keys
            ),
            Some(QualityChecks::Posts(c)) => write!(
                f,
                ", {} invalid dates, {} null text, {} null ticker, {} duplicate text per day",
                c.invalid_dates, c.null_text, c.null_ticker, c.duplicate_text_per_day
            ),
            None => Ok(()),
        }
    }
}

/// Check the price CSV. A missing file is an error; missing columns are reported.
pub fn check_prices(path: &Path) -> SentigraphResult<QualityReport> {
    let source = CsvSource::open(path, MAX_CHUNK_SIZE)?;
    let mut report = QualityReport::new(SourceKind::Prices, &source, &PRICE_COLUMNS)?;
    if !report.is_ok() {
        return Ok(report);
    }

    let mut checks = PriceChecks::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut chunks = source.chunks(|_: &RawRow| true)?;
    for chunk in chunks.by_ref() {
        for row in &chunk.rows {
            report.rows += 1;
            let date = row.field(columns::DATE);
            if date.and_then(parse_date).is_none() {
                checks.invalid_dates += 1;
            }
            if row
                .field(columns::CLOSE)
                .is_some_and(|v| !v.trim().parse::<f64>().is_ok_and(|c| c > 0.0))
            {
                checks.bad_close += 1;
            }
            if row
                .field(columns::VOLUME)
                .is_some_and(|v| !v.trim().parse::<f64>().is_ok_and(|n| n >= 0.0))
            {
                checks.bad_volume += 1;
            }
            let key = (
                date.unwrap_or_default().to_string(),
                row.field(columns::TICKER).unwrap_or_default().to_string(),
            );
            if !seen.insert(key) {
                checks.duplicate_keys += 1;
            }
        }
    }

    report.malformed_lines = chunks.malformed();
    report.checks = Some(QualityChecks::Prices(checks));
    info!("{report}");
    Ok(report)
}

/// Check the post CSV. A missing file is an error; missing columns are reported.
pub fn check_posts(path: &Path) -> SentigraphResult<QualityReport> {
    let source = CsvSource::open(path, MAX_CHUNK_SIZE)?;
    let mut report = QualityReport::new(SourceKind::Posts, &source, &POST_COLUMNS)?;
    if !report.is_ok() {
        return Ok(report);
    }

    let mut checks = PostChecks::default();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut chunks = source.chunks(|_: &RawRow| true)?;
    for chunk in chunks.by_ref() {
        for row in &chunk.rows {
            report.rows += 1;
            let date = row.field(columns::DATE).and_then(parse_date);
            if date.is_none() {
                checks.invalid_dates += 1;
            }
            let text = row.text(columns::TEXT);
            if text.is_none() {
                checks.null_text += 1;
            }
            if row.field(columns::TICKER).is_none() {
                checks.null_ticker += 1;
            }
            if !seen.insert(text_day_key(text.unwrap_or_default(), date)) {
                checks.duplicate_text_per_day += 1;
            }
        }
    }

    report.malformed_lines = chunks.malformed();
    report.checks = Some(QualityChecks::Posts(checks));
    info!("{report}");
    Ok(report)
}

/// 64-bit key for a (text, calendar date) pair, so memory grows with the
/// number of posts rather than their length.
fn text_day_key(text: &str, date: Option<NaiveDate>) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    date.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_csv;
    use sentigraph_core::SentigraphError;

    #[test]
    fn test_price_checks() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Adj Close,Volume,Stock Name
2021-09-30,1,1,1,10,10,100,X
2021-09-30,1,1,1,10,10,100,X
yesterday,1,1,1,0,0,-5,X
2021-10-01,1,1,1,abc,abc,,X
",
        );
        let report = check_prices(file.path()).unwrap();

        assert!(report.is_ok());
        assert_eq!(report.rows, 4);
        assert_eq!(
            report.checks,
            Some(QualityChecks::Prices(PriceChecks {
                invalid_dates: 1,
                bad_close: 2,
                bad_volume: 1,
                duplicate_keys: 1,
            }))
        );
    }

    #[test]
    fn test_post_checks() {
        let file = write_csv(
            "Date,Tweet,Stock Name
2021-09-30 10:00:00+00:00,hello,X
2021-09-30 18:00:00+00:00,hello,X
2021-10-01 10:00:00+00:00,,
nope,hi,X
",
        );
        let report = check_posts(file.path()).unwrap();

        assert_eq!(
            report.checks,
            Some(QualityChecks::Posts(PostChecks {
                invalid_dates: 1,
                null_text: 1,
                null_ticker: 1,
                duplicate_text_per_day: 1,
            }))
        );
    }

    #[test]
    fn test_duplicate_key_is_text_and_day() {
        let day = NaiveDate::from_ymd_opt(2021, 9, 30);
        let next = NaiveDate::from_ymd_opt(2021, 10, 1);
        assert_eq!(text_day_key("hello", day), text_day_key("hello", day));
        assert_ne!(text_day_key("hello", day), text_day_key("hello", next));
        assert_ne!(text_day_key("hello", day), text_day_key("hello!", day));
    }

    #[test]
    fn test_nan_text_is_not_null() {
        let file = write_csv(
            "Date,Tweet,Stock Name
2021-09-30 10:00:00+00:00,NaN,X
2021-09-30 11:00:00+00:00,,X
",
        );
        let report = check_posts(file.path()).unwrap();

        match report.checks {
            Some(QualityChecks::Posts(c)) => {
                assert_eq!(c.null_text, 1);
                assert_eq!(c.duplicate_text_per_day, 0);
            }
            other => panic!("unexpected checks: {other:?}"),
        }
    }

    #[test]
    fn test_missing_columns_reported() {
        let file = write_csv("Date,Stock Name\n2021-09-30,X\n");
        let report = check_prices(file.path()).unwrap();

        assert!(!report.is_ok());
        assert_eq!(report.missing_columns, vec!["Close", "Volume"]);
        assert!(report.checks.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = check_posts(Path::new("/nowhere/posts.csv")).unwrap_err();
        assert!(matches!(err, SentigraphError::SourceNotFound(_)));
    }
}
