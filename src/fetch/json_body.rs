// src/fetch/json_body.rs

use serde::Deserialize;

use super::to_record;
use crate::error::{PipelineError, Result};
use crate::model::RawRecord;

#[derive(Debug, Deserialize)]
struct Envelope {
    results: Vec<JsonRow>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    date: String,
    state: String,
    confirmed: u64,
    deaths: u64,
    #[serde(default)]
    confirmed_per_100k_inhabitants: Option<f64>,
}

/// One decoded page of a paginated API response.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Link to the following page, if the API reports one.
    pub next: Option<String>,
}

/// Decode a single, unnumbered page.
pub fn parse_page(body: &str) -> Result<Page> {
    parse_page_at(body, 1)
}

/// Decode page `page` (1-based) of a paginated response. Errors name the
/// page as well as the row within it.
pub fn parse_page_at(body: &str, page: usize) -> Result<Page> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| PipelineError::Parse(format!("page {page}: JSON envelope: {e}")))?;

    let records = envelope
        .results
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            to_record(
                idx + 1,
                &row.state,
                &row.date,
                row.confirmed,
                row.deaths,
                row.confirmed_per_100k_inhabitants,
            )
            .map_err(|e| match e {
                PipelineError::Parse(msg) => PipelineError::Parse(format!("page {page}, {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        records,
        next: envelope.next.filter(|n| !n.trim().is_empty()),
    })
}
