// src/fetch/csv_body.rs

use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::Cursor;
use tracing::trace;

use super::to_record;
use crate::error::{PipelineError, Result};
use crate::model::RawRecord;

const REQUIRED_COLUMNS: &[&str] = &[
    "state",
    "date",
    "totalCases",
    "deaths",
    "totalCases_per_100k_inhabitants",
];

/// One CSV line; every other column in the file is ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    state: String,
    date: String,
    #[serde(rename = "totalCases")]
    total_cases: u64,
    deaths: u64,
    #[serde(rename = "totalCases_per_100k_inhabitants")]
    per_100k: Option<f64>,
}

/// Parse a headed CSV body into raw records, in file order.
pub fn parse(body: &str) -> Result<Vec<RawRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(body.as_bytes()));

    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::Parse(format!("reading CSV header: {e}")))?
        .clone();
    for col in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *col) {
            return Err(PipelineError::Parse(format!(
                "CSV is missing required column `{col}`"
            )));
        }
    }

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // +2: one for the header, one for 1-based lines
        let line = idx + 2;
        let row = result.map_err(|e| PipelineError::Parse(format!("CSV line {line}: {e}")))?;
        trace!(line, state = %row.state, "csv row");
        records.push(to_record(
            line,
            &row.state,
            &row.date,
            row.total_cases,
            row.deaths,
            row.per_100k,
        )?);
    }
    Ok(records)
}
