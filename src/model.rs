// src/model.rs

use chrono::NaiveDate;
use serde::Serialize;

/// Date layouts seen across the upstream datasets, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y"];

/// One row per (region, date) as published by the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub region: String,
    pub date: NaiveDate,
    pub confirmed: u64,
    pub deaths: u64,
    /// Absent when the source does not publish it (the JSON API may not).
    pub confirmed_per_100k: Option<f64>,
}

/// All real regions for a single reporting date.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub records: Vec<RawRecord>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A snapshot row with its derived metrics.
///
/// `population` and `incidence` are `None` when the source row has no usable
/// per-100k figure; they are never `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub region: String,
    pub date: NaiveDate,
    pub confirmed: u64,
    pub deaths: u64,
    pub population: Option<f64>,
    pub mortality_rate: f64,
    pub incidence: Option<f64>,
}

/// Parse a reporting date in any of the accepted layouts
/// (`YYYY-MM-DD`, `YYYYMMDD`, `DD/MM/YYYY`).
pub fn parse_report_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_matches('"');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_date_layouts() {
        let want = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_report_date("2024-01-31"), Some(want));
        assert_eq!(parse_report_date("20240131"), Some(want));
        assert_eq!(parse_report_date("31/01/2024"), Some(want));
        assert_eq!(parse_report_date(" \"2024-01-31\" "), Some(want));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_report_date(""), None);
        assert_eq!(parse_report_date("yesterday"), None);
        assert_eq!(parse_report_date("2024-13-01"), None);
    }
}
