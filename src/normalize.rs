// src/normalize.rs

use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::ExclusionConfig;
use crate::error::{PipelineError, Result};
use crate::model::{RawRecord, Snapshot};

/// Decides which region names are aggregate/placeholder rows.
pub trait RegionFilter {
    fn excludes(&self, region: &str) -> bool;
}

impl<F> RegionFilter for F
where
    F: Fn(&str) -> bool,
{
    fn excludes(&self, region: &str) -> bool {
        self(region)
    }
}

/// Exact names (case-insensitive) plus regex patterns matched anywhere in
/// the name. Covers both `isin([...])` and `contains("A|B")` dataset styles.
#[derive(Debug, Clone)]
pub struct RegionExclusion {
    exact: HashSet<String>,
    patterns: Vec<Regex>,
}

impl RegionExclusion {
    pub fn new<I, S>(exact: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exact: exact
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .collect(),
            patterns: Vec::new(),
        }
    }

    /// Add a substring pattern. Invalid regexes are a configuration error.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| {
            PipelineError::Configuration(format!("invalid exclusion pattern `{pattern}`: {e}"))
        })?;
        self.patterns.push(re);
        Ok(self)
    }

    pub fn from_config(cfg: &ExclusionConfig) -> Result<Self> {
        cfg.patterns
            .iter()
            .try_fold(Self::new(&cfg.exact), |acc, p| acc.with_pattern(p))
    }
}

impl Default for RegionExclusion {
    fn default() -> Self {
        Self::new(ExclusionConfig::default().exact)
    }
}

impl RegionFilter for RegionExclusion {
    fn excludes(&self, region: &str) -> bool {
        let region = region.trim();
        self.exact.contains(&region.to_uppercase())
            || self.patterns.iter().any(|re| re.is_match(region))
    }
}

/// Drop aggregate rows, keeping the rest in input order.
pub fn retain_regions<F: RegionFilter + ?Sized>(records: &[RawRecord], filter: &F) -> Vec<RawRecord> {
    records
        .iter()
        .filter(|r| !filter.excludes(&r.region))
        .cloned()
        .collect()
}

/// Select the latest-date snapshot of real regions.
pub fn normalize<F: RegionFilter + ?Sized>(records: &[RawRecord], filter: &F) -> Result<Snapshot> {
    let kept = retain_regions(records, filter);
    debug!(
        total = records.len(),
        excluded = records.len() - kept.len(),
        "applied region exclusion"
    );

    let date = kept.iter().map(|r| r.date).max().ok_or_else(|| {
        PipelineError::EmptyDataset(format!(
            "no records left after excluding aggregate regions ({} in input)",
            records.len()
        ))
    })?;

    let latest: Vec<RawRecord> = kept.into_iter().filter(|r| r.date == date).collect();
    if latest.is_empty() {
        return Err(PipelineError::EmptyDataset(format!("no records for {date}")));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(latest.len());
    if let Some(dup) = latest.iter().find(|r| !seen.insert(r.region.as_str())) {
        return Err(PipelineError::Parse(format!(
            "region {} appears more than once for {date}",
            dup.region
        )));
    }

    info!(%date, regions = latest.len(), "selected latest snapshot");
    Ok(Snapshot {
        date,
        records: latest,
    })
}
