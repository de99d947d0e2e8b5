// src/rank.rs

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};

use crate::error::{PipelineError, Result};
use crate::model::EnrichedRecord;

/// Column a table can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MortalityRate,
    Confirmed,
    Deaths,
    Incidence,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::MortalityRate,
        Metric::Confirmed,
        Metric::Deaths,
        Metric::Incidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::MortalityRate => "mortality_rate",
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Incidence => "incidence",
        }
    }

    /// The record's value for this metric; `None` only for undefined incidence.
    pub fn value(&self, r: &EnrichedRecord) -> Option<f64> {
        match self {
            Metric::MortalityRate => Some(r.mortality_rate),
            Metric::Confirmed => Some(r.confirmed as f64),
            Metric::Deaths => Some(r.deaths as f64),
            Metric::Incidence => r.incidence,
        }
    }

    /// Descending by value, undefined last.
    fn compare_desc(&self, a: &EnrichedRecord, b: &EnrichedRecord) -> Ordering {
        match (self.value(a), self.value(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "unknown metric `{s}` (expected one of mortality_rate, confirmed, deaths, incidence)"
                ))
            })
    }
}

/// Records ordered from highest to lowest by `metric`.
///
/// Best and worst are fixed at construction over the unsorted input, so ties
/// resolve by input order whatever the ranking metric.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable {
    pub metric: Metric,
    pub records: Vec<EnrichedRecord>,
    best: EnrichedRecord,
    worst: EnrichedRecord,
}

impl RankedTable {
    /// The first `n` records (all of them if fewer).
    pub fn top(&self, n: usize) -> &[EnrichedRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Lowest mortality rate in the table.
    pub fn best(&self) -> &EnrichedRecord {
        &self.best
    }

    /// Highest mortality rate in the table.
    pub fn worst(&self) -> &EnrichedRecord {
        &self.worst
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stable descending sort by `metric`. Fails on empty input since best and
/// worst would be undefined.
pub fn rank(records: &[EnrichedRecord], metric: Metric) -> Result<RankedTable> {
    let best = best(records)?.clone();
    let worst = worst(records)?.clone();
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| metric.compare_desc(a, b));
    Ok(RankedTable {
        metric,
        records: sorted,
        best,
        worst,
    })
}

/// Record with the lowest mortality rate, earliest in `records` on ties.
pub fn best(records: &[EnrichedRecord]) -> Result<&EnrichedRecord> {
    records
        .iter()
        .reduce(|acc, r| if r.mortality_rate < acc.mortality_rate { r } else { acc })
        .ok_or(PipelineError::EmptyInput)
}

/// Record with the highest mortality rate, earliest in `records` on ties.
pub fn worst(records: &[EnrichedRecord]) -> Result<&EnrichedRecord> {
    records
        .iter()
        .reduce(|acc, r| if r.mortality_rate > acc.mortality_rate { r } else { acc })
        .ok_or(PipelineError::EmptyInput)
}
