//! Command-line interface components.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{CompressionAlgorithm, OutputFormat, ProcessorConfig};
use crate::error::Result;
use crate::priority::PriorityTable;

#[derive(Parser, Debug)]
#[command(name = "imgw_processor")]
#[command(about = "Normalize IMGW hydrological and meteorological archives into per-station and per-county daily tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Directory holding the extracted IMGW archive files
    #[arg(value_name = "INPUT_DIR")]
    pub input_path: PathBuf,

    /// Output directory for the written tables
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Meteorological station registry (';'-delimited, with header)
    #[arg(long, value_name = "FILE")]
    pub meteo_stations: Option<PathBuf>,

    /// Hydrological station registry (';'-delimited, with header)
    #[arg(long, value_name = "FILE")]
    pub hydro_stations: Option<PathBuf>,

    /// Output table format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Parquet compression algorithm
    #[arg(long, value_enum)]
    pub compression: Option<CompressionAlgorithm>,

    /// JSON priority table replacing the built-in meteorological one
    #[arg(long, value_name = "JSON")]
    pub priorities: Option<PathBuf>,

    /// Full JSON configuration; other flags override its values
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Drop region-day columns missing in more than PCT percent of rows
    /// (70 when given without a value)
    #[arg(long, value_name = "PCT", num_args = 0..=1, default_missing_value = "70")]
    pub drop_sparse_columns: Option<f64>,

    /// Maximum number of files parsed concurrently
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Also write every normalized per-source table
    #[arg(long)]
    pub source_tables: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the processing configuration from the flags
    pub fn to_config(&self) -> Result<ProcessorConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessorConfig::from_json_file(path)?,
            None => ProcessorConfig::default(),
        };

        if let Some(path) = &self.meteo_stations {
            config = config.with_meteo_station_registry(path.clone());
        }
        if let Some(path) = &self.hydro_stations {
            config = config.with_hydro_station_registry(path.clone());
        }
        if let Some(format) = self.format {
            config = config.with_output_format(format);
        }
        if let Some(compression) = self.compression {
            config = config.with_compression(compression);
        }
        if let Some(path) = &self.priorities {
            config = config.with_meteo_priorities(PriorityTable::from_json_file(path)?);
        }
        if let Some(threshold) = self.drop_sparse_columns {
            config = config.with_sparse_column_threshold(Some(threshold));
        }
        if let Some(max_files) = self.max_concurrent {
            config = config.with_max_concurrent_files(max_files);
        }
        if self.source_tables {
            config = config.with_source_tables();
        }

        config.validate()?;
        Ok(config)
    }
}
