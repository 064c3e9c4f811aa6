//! Inclusive calendar-date windows for ingestion requests.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{SentigraphError, SentigraphResult};
use crate::model::DATE_FORMAT;
use crate::normalize::parse_timestamp;

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window used by the full pipeline when the caller gives no dates.
    pub fn pipeline_default() -> Self {
        Self::new(ymd(2015, 1, 1), ymd(2024, 1, 1))
    }

    /// Window used by the standalone price sync / post import.
    pub fn ingest_default() -> Self {
        Self::new(ymd(2021, 9, 30), ymd(2022, 9, 30))
    }

    /// Resolve request date strings against a default window.
    ///
    /// Absent, blank, and the literal `"string"` placeholder fall back to the
    /// matching bound of `default`; anything else must parse.
    pub fn resolve(start: Option<&str>, end: Option<&str>, default: DateWindow) -> SentigraphResult<Self> {
        let start = match given(start) {
            Some(s) => parse_date(s)?,
            None => default.start,
        };
        let end = match given(end) {
            Some(s) => parse_date(s)?,
            None => default.end,
        };
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn start_key(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_key(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

/// Returns the trimmed value unless it is missing or a placeholder.
pub fn given(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "string")
}

fn parse_date(value: &str) -> SentigraphResult<NaiveDate> {
    parse_timestamp(value)
        .map(|ts| ts.date())
        .ok_or_else(|| SentigraphError::InvalidDate(value.to_string()))
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
