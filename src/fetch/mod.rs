// src/fetch/mod.rs

use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::model::{parse_report_date, RawRecord};

pub mod csv_body;
pub mod json_body;

const USER_AGENT: &str = concat!("covidbr/", env!("CARGO_PKG_VERSION"));

/// Shape of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// Flat CSV with `state,date,totalCases,deaths,totalCases_per_100k_inhabitants`.
    Csv,
    /// `{ "results": [...], "next": ... }` envelope.
    Json,
}

impl FromStr for BodyFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(BodyFormat::Csv),
            "json" => Ok(BodyFormat::Json),
            other => Err(PipelineError::Configuration(format!(
                "unknown body format `{other}` (expected csv or json)"
            ))),
        }
    }
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyFormat::Csv => f.write_str("csv"),
            BodyFormat::Json => f.write_str("json"),
        }
    }
}

/// A fully resolved place to fetch from.
#[derive(Clone)]
pub struct Source {
    pub url: String,
    pub format: BodyFormat,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
    pub max_pages: usize,
    pub requires_token: bool,
    pub auth_scheme: String,
    token: Option<String>,
}

// Hand-written so the token never reaches a log line.
impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("url", &self.url)
            .field("format", &self.format)
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .field("max_pages", &self.max_pages)
            .field("requires_token", &self.requires_token)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Source {
    /// Anonymous source with default timeout and paging.
    pub fn new(url: impl Into<String>, format: BodyFormat) -> Self {
        let defaults = SourceConfig::default();
        Self {
            url: url.into(),
            format,
            query: Vec::new(),
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_pages: defaults.max_pages,
            requires_token: false,
            auth_scheme: "Token".to_string(),
            token: None,
        }
    }

    /// Mark the source as authenticated and attach its token.
    pub fn with_token(mut self, scheme: impl Into<String>, token: impl Into<String>) -> Self {
        self.requires_token = true;
        self.auth_scheme = scheme.into();
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Resolve from configuration, reading the token from the process env.
    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        Self::from_config_with(cfg, |key| std::env::var(key).ok())
    }

    /// Like [`Source::from_config`] with an injected variable lookup.
    pub fn from_config_with<F>(cfg: &SourceConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut source = Source::new(cfg.url.clone(), cfg.format)
            .with_timeout(Duration::from_secs(cfg.timeout_secs))
            .with_max_pages(cfg.max_pages);
        source.query = cfg
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(auth) = &cfg.auth {
            let token = lookup(&auth.token_env)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "API token not found; set the {} environment variable",
                        auth.token_env
                    ))
                })?;
            source = source.with_token(auth.scheme.clone(), token);
        }
        Ok(source)
    }

    fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("{} {}", self.auth_scheme, t))
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PipelineError::Configuration(format!("building HTTP client: {e}")))
}

/// GET `url` and return the body text. Query params are only attached when
/// `with_query` is set.
fn get_text(client: &Client, source: &Source, url: &str, with_query: bool) -> Result<String> {
    debug!(%url, "GET");
    let mut req = client.get(url);
    if with_query && !source.query.is_empty() {
        req = req.query(&source.query);
    }
    if let Some(value) = source.authorization() {
        req = req.header(AUTHORIZATION, value);
    }
    req.send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(|e| PipelineError::Retrieval {
            url: url.to_string(),
            source: e,
        })
}

/// Download the full dataset behind `source` and parse it into records.
///
/// One request for CSV; for JSON, `next` links are followed sequentially up
/// to `max_pages`. Nothing is retried.
#[instrument(level = "info", skip(source), fields(url = %source.url, format = %source.format))]
pub fn fetch(source: &Source) -> Result<Vec<RawRecord>> {
    if source.requires_token && source.token.is_none() {
        return Err(PipelineError::Configuration(format!(
            "source {} requires a token but none was supplied",
            source.url
        )));
    }
    let client = build_client(source.timeout)?;

    let records = match source.format {
        BodyFormat::Csv => {
            let body = get_text(&client, source, &source.url, true)?;
            csv_body::parse(&body)?
        }
        BodyFormat::Json => fetch_json_pages(&client, source)?,
    };

    info!(rows = records.len(), "fetched dataset");
    Ok(records)
}

fn fetch_json_pages(client: &Client, source: &Source) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    let mut url = source.url.clone();
    let mut pages = 0usize;

    loop {
        let body = get_text(client, source, &url, pages == 0)?;
        pages += 1;
        let page = json_body::parse_page_at(&body, pages)?;
        debug!(page = pages, rows = page.records.len(), "parsed page");
        records.extend(page.records);

        let Some(next) = page.next else { break };
        if pages >= source.max_pages {
            warn!(
                pages,
                next = %next,
                "page limit reached; remaining pages not fetched"
            );
            break;
        }
        url = resolve_next(&url, &next)?;
    }

    Ok(records)
}

/// `next` may be absolute or relative to the page that carried it.
fn resolve_next(current: &str, next: &str) -> Result<String> {
    let base = Url::parse(current)
        .map_err(|e| PipelineError::Parse(format!("invalid page url {current}: {e}")))?;
    base.join(next)
        .map(|u| u.to_string())
        .map_err(|e| PipelineError::Parse(format!("invalid next link {next}: {e}")))
}

/// Parse a body already in memory. JSON `next` links are ignored.
pub fn parse_body(format: BodyFormat, body: &str) -> Result<Vec<RawRecord>> {
    match format {
        BodyFormat::Csv => csv_body::parse(body),
        BodyFormat::Json => json_body::parse_page(body).map(|page| page.records),
    }
}

/// Shared row → record conversion for both body formats.
pub(crate) fn to_record(
    row: usize,
    region: &str,
    date: &str,
    confirmed: u64,
    deaths: u64,
    confirmed_per_100k: Option<f64>,
) -> Result<RawRecord> {
    let region = region.trim();
    if region.is_empty() {
        return Err(PipelineError::Parse(format!("row {row}: empty region name")));
    }
    let date = parse_report_date(date)
        .ok_or_else(|| PipelineError::Parse(format!("row {row}: unrecognised date `{date}`")))?;
    Ok(RawRecord {
        region: region.to_string(),
        date,
        confirmed,
        deaths,
        confirmed_per_100k,
    })
}
