// src/pipeline.rs

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::config::{Config, RankingConfig};
use crate::derive::derive;
use crate::error::Result;
use crate::fetch::{fetch, Source};
use crate::model::{EnrichedRecord, RawRecord};
use crate::normalize::{normalize, retain_regions, RegionExclusion, RegionFilter};
use crate::rank::{rank, Metric, RankedTable};
use crate::variation::{monthly_variation, totals, Totals};

/// Everything a rendering collaborator needs from one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub date: NaiveDate,
    /// Snapshot order, as derived.
    pub records: Vec<EnrichedRecord>,
    pub table: RankedTable,
    pub top: Vec<EnrichedRecord>,
    pub best: EnrichedRecord,
    pub worst: EnrichedRecord,
    pub totals: Totals,
    /// Month-over-month change in total confirmed, percent.
    pub variation: Option<f64>,
}

/// Knobs for [`process`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub exclusion: RegionExclusion,
    pub metric: Metric,
    pub top_n: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            exclusion: RegionExclusion::from_config(&config.exclusion)?,
            metric: config.ranking.metric,
            top_n: config.ranking.top_n,
        })
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let ranking = RankingConfig::default();
        Self {
            exclusion: RegionExclusion::default(),
            metric: ranking.metric,
            top_n: ranking.top_n,
        }
    }
}

/// Normalize → derive → rank over rows already in memory. Deterministic:
/// the same input always yields the same report.
pub fn process(raw: &[RawRecord], opts: &PipelineOptions) -> Result<Report> {
    process_with(raw, &opts.exclusion, opts.metric, opts.top_n)
}

/// [`process`] with any region filter, e.g. a closure.
pub fn process_with<F: RegionFilter + ?Sized>(
    raw: &[RawRecord],
    filter: &F,
    metric: Metric,
    top_n: usize,
) -> Result<Report> {
    let snapshot = normalize(raw, filter)?;
    let records = derive(&snapshot);
    let table = rank(&records, metric)?;
    let best = table.best().clone();
    let worst = table.worst().clone();
    let top = table.top(top_n).to_vec();

    let variation = monthly_variation(&retain_regions(raw, filter));
    let totals = totals(&records);

    info!(
        date = %snapshot.date,
        %metric,
        best = %best.region,
        worst = %worst.region,
        ?variation,
        "ranked snapshot"
    );

    Ok(Report {
        date: snapshot.date,
        records,
        table,
        top,
        best,
        worst,
        totals,
        variation,
    })
}

/// Fetch from the configured source and process the result.
#[instrument(level = "info", skip(config), fields(url = %config.source.url))]
pub fn run(config: &Config) -> Result<Report> {
    let source = Source::from_config(&config.source)?;
    let opts = PipelineOptions::from_config(config)?;
    let raw = fetch(&source)?;
    process(&raw, &opts)
}
