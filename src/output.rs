// src/output.rs

use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use csv::WriterBuilder;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::error::{PipelineError, Result};
use crate::model::EnrichedRecord;

/// Flat-file layouts the table can be written as, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("tsv") => Ok(TableFormat::Tsv),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(PipelineError::Configuration(format!(
                "unsupported output file {} (use .csv, .tsv or .parquet)",
                path.display()
            ))),
        }
    }
}

/// `<prefix>_<YYYYMMDD>.<ext>`, e.g. `dados_covid_20240101.csv`.
pub fn dated_file_name(prefix: &str, date: NaiveDate, ext: &str) -> String {
    format!("{}_{}.{}", prefix, date.format("%Y%m%d"), ext.trim_start_matches('.'))
}

/// Where this run's table goes, if anywhere: explicit `path` first, then a
/// dated file inside `dir`.
pub fn resolve_output_path(cfg: &OutputConfig, date: NaiveDate) -> Option<PathBuf> {
    cfg.path.clone().or_else(|| {
        cfg.dir
            .as_ref()
            .map(|dir| dir.join(dated_file_name(&cfg.prefix, date, &cfg.extension)))
    })
}

/// Write the enriched table to `path`.
///
/// The file appears only once fully written: data goes to `<path>.tmp`
/// which is then renamed over the target.
pub fn write_table(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    let written = match format {
        TableFormat::Csv => write_delimited(&tmp_path, records, b','),
        TableFormat::Tsv => write_delimited(&tmp_path, records, b'\t'),
        TableFormat::Parquet => write_parquet(&tmp_path, records),
    };
    if let Err(e) = written {
        if let Err(rm) = fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %rm, "could not remove partial output");
        }
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    info!(path = %path.display(), rows = records.len(), "wrote table");
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_delimited(path: &Path, records: &[EnrichedRecord], delimiter: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

fn table_schema() -> Schema {
    Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("confirmed", DataType::UInt64, false),
        Field::new("deaths", DataType::UInt64, false),
        Field::new("population", DataType::Float64, true),
        Field::new("mortality_rate", DataType::Float64, false),
        Field::new("incidence", DataType::Float64, true),
    ])
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as i32
}

fn write_parquet(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
    let schema = Arc::new(table_schema());

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.region.as_str()),
        )),
        Arc::new(Date32Array::from_iter_values(
            records.iter().map(|r| days_since_epoch(r.date)),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.confirmed),
        )),
        Arc::new(UInt64Array::from_iter_values(records.iter().map(|r| r.deaths))),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.population).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.mortality_rate),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.incidence).collect::<Vec<_>>(),
        )),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn sample() -> Vec<EnrichedRecord> {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        vec![
            EnrichedRecord {
                region: "AA".into(),
                date,
                confirmed: 100,
                deaths: 10,
                population: Some(10_000.0),
                mortality_rate: 10.0,
                incidence: Some(1000.0),
            },
            EnrichedRecord {
                region: "BB".into(),
                date,
                confirmed: 200,
                deaths: 5,
                population: None,
                mortality_rate: 2.5,
                incidence: None,
            },
        ]
    }

    #[test]
    fn writes_csv_with_empty_cells_for_undefined() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("table.csv");
        write_table(&path, &sample())?;

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "region,date,confirmed,deaths,population,mortality_rate,incidence"
        );
        assert_eq!(lines[1], "AA,2024-01-01,100,10,10000.0,10.0,1000.0");
        assert_eq!(lines[2], "BB,2024-01-01,200,5,,2.5,");
        assert!(!tmp_path_for(&path).exists());
        Ok(())
    }

    #[test]
    fn writes_tsv() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("table.tsv");
        write_table(&path, &sample())?;
        let text = fs::read_to_string(&path)?;
        assert!(text.lines().nth(1).unwrap_or_default().starts_with("AA\t2024-01-01\t100"));
        Ok(())
    }

    #[test]
    fn writes_parquet_with_nulls() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("table.parquet");
        write_table(&path, &sample())?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>()?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);

        let batch = &batches[0];
        let population = batch
            .column_by_name("population")
            .expect("population column");
        assert_eq!(population.null_count(), 1);
        let dates = batch
            .column_by_name("date")
            .and_then(|c| c.as_any().downcast_ref::<Date32Array>())
            .expect("date column");
        assert_eq!(dates.value(0), 19_723);
        Ok(())
    }

    #[test]
    fn unsupported_extension_leaves_existing_output_alone() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("table.xlsx");
        fs::write(&path, "previous")?;
        let err = write_table(&path, &sample()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(fs::read_to_string(&path)?, "previous");
        Ok(())
    }

    #[test]
    fn dated_names_and_resolution() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            dated_file_name("dados_covid", date, ".csv"),
            "dados_covid_20240307.csv"
        );

        let mut cfg = OutputConfig::default();
        assert_eq!(resolve_output_path(&cfg, date), None);

        cfg.dir = Some(PathBuf::from("docs"));
        assert_eq!(
            resolve_output_path(&cfg, date),
            Some(PathBuf::from("docs/dados_covid_20240307.csv"))
        );

        cfg.path = Some(PathBuf::from("out/table.parquet"));
        assert_eq!(
            resolve_output_path(&cfg, date),
            Some(PathBuf::from("out/table.parquet"))
        );
    }
}
