// src/derive.rs

use tracing::{debug, warn};

use crate::model::{EnrichedRecord, RawRecord, Snapshot};

const PER_100K: f64 = 100_000.0;

/// `confirmed / per_100k * 100000`, or `None` when the per-100k figure is
/// missing, zero or not finite.
pub fn population(confirmed: u64, confirmed_per_100k: Option<f64>) -> Option<f64> {
    let per_100k = confirmed_per_100k.filter(|v| v.is_finite() && *v != 0.0)?;
    let pop = confirmed as f64 / per_100k * PER_100K;
    pop.is_finite().then_some(pop)
}

/// Deaths as a percentage of confirmed cases; exactly `0.0` with no cases.
pub fn mortality_rate(confirmed: u64, deaths: u64) -> f64 {
    if confirmed == 0 {
        return 0.0;
    }
    deaths as f64 / confirmed as f64 * 100.0
}

/// Cases per 100k inhabitants. Inherits an undefined population.
pub fn incidence(confirmed: u64, population: Option<f64>) -> Option<f64> {
    let pop = population.filter(|p| *p != 0.0)?;
    Some(confirmed as f64 / pop * PER_100K)
}

pub fn enrich(record: &RawRecord) -> EnrichedRecord {
    let population = population(record.confirmed, record.confirmed_per_100k);
    EnrichedRecord {
        region: record.region.clone(),
        date: record.date,
        confirmed: record.confirmed,
        deaths: record.deaths,
        population,
        mortality_rate: mortality_rate(record.confirmed, record.deaths),
        incidence: incidence(record.confirmed, population),
    }
}

/// One enriched record per snapshot row, in the same order.
pub fn derive(snapshot: &Snapshot) -> Vec<EnrichedRecord> {
    let out: Vec<EnrichedRecord> = snapshot.records.iter().map(enrich).collect();

    let undefined = out.iter().filter(|r| r.population.is_none()).count();
    if undefined > 0 {
        warn!(
            undefined,
            date = %snapshot.date,
            "population undefined for some regions; incidence left empty"
        );
    }
    debug!(records = out.len(), "derived metrics");
    out
}
