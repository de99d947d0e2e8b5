// src/error.rs

use thiserror::Error;

/// Every way a pipeline run can fail. All variants are terminal for the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing credential or invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// HTTP failure, non-success status or timeout while fetching.
    #[error("retrieval of {url} failed: {source}")]
    Retrieval {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body could not be turned into records.
    #[error("parse error: {0}")]
    Parse(String),

    /// No usable rows after filtering.
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// Ranking was asked to work on zero records.
    #[error("cannot rank an empty set of records")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the output table failed.
    #[error("output error: {0}")]
    Output(String),
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::Output(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(e: arrow::error::ArrowError) -> Self {
        PipelineError::Output(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        PipelineError::Output(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
