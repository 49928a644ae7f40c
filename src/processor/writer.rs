//! Table output for every pipeline stage
//!
//! Each stage table is written as `<name>.<ext>` in the output directory,
//! either as UTF-8 CSV with a header row (missing values as empty fields) or
//! as Parquet with the configured compression.

use crate::config::{CompressionAlgorithm, OutputFormat};
use crate::error::Result;

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;

/// Writes named tables into one output directory
#[derive(Debug, Clone)]
pub struct TableWriter {
    output_dir: PathBuf,
    format: OutputFormat,
    compression: CompressionAlgorithm,
}

impl TableWriter {
    pub fn new(output_dir: PathBuf, format: OutputFormat, compression: CompressionAlgorithm) -> Self {
        Self {
            output_dir,
            format,
            compression,
        }
    }

    /// Path a table of the given name is written to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", name, self.format.extension()))
    }

    /// Write a table on the blocking pool; returns the row count
    pub async fn write(&self, name: &str, frame: DataFrame) -> Result<usize> {
        let writer = self.clone();
        let name = name.to_string();
        task::spawn_blocking(move || writer.write_blocking(&name, frame)).await?
    }

    fn write_blocking(&self, name: &str, mut frame: DataFrame) -> Result<usize> {
        let path = self.path_for(name);
        let file = File::create(&path)?;

        match self.format {
            OutputFormat::Csv => {
                CsvWriter::new(file)
                    .include_header(true)
                    .finish(&mut frame)?;
            }
            OutputFormat::Parquet => {
                ParquetWriter::new(file)
                    .with_compression(self.compression.to_polars_compression())
                    .finish(&mut frame)?;
            }
        }

        debug!(
            "Wrote {} rows x {} columns to {}",
            frame.height(),
            frame.width(),
            path.display()
        );
        Ok(frame.height())
    }
}

/// Read a written table back.
///
/// CSV carries no types, so `schema` overrides inferred column types (dates
/// in particular); Parquet ignores it.
pub fn read_table(path: &Path, schema: Option<SchemaRef>) -> Result<DataFrame> {
    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        let file = File::open(path)?;
        return Ok(ParquetReader::new(file).finish()?);
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(schema)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(frame)
}
