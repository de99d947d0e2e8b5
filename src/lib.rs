// src/lib.rs
//! Daily COVID-19 snapshot for Brazilian states: fetch cumulative per-state
//! rows, keep the latest date, derive population, mortality and incidence,
//! then rank.

pub mod config;
pub mod derive;
pub mod error;
pub mod fetch;
pub mod format;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod rank;
pub mod variation;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use model::{EnrichedRecord, RawRecord, Snapshot};
pub use pipeline::{process, run, PipelineOptions, Report};
pub use rank::{Metric, RankedTable};
