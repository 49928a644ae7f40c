//! Configuration management and validation.
//!
//! Provides the processing parameters, output settings, and the priority
//! and aggregation tables each pipeline domain runs with.

use clap::ValueEnum;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::aggregate::{AggregationPolicy, default_policies};
use crate::constants::DEFAULT_SPARSE_COLUMN_THRESHOLD;
use crate::error::{ImgwError, Result};
use crate::priority::PriorityTable;

/// Table format for every written output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// UTF-8 CSV with a header row
    #[default]
    Csv,
    /// Apache Parquet
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    #[default]
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    #[value(alias = "none")]
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Global configuration for IMGW processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum concurrent file processing
    pub max_concurrent_files: usize,

    /// Format of every written table
    pub output_format: OutputFormat,

    /// Parquet compression; ignored for CSV output
    pub compression: CompressionAlgorithm,

    /// Also write each normalized per-source table
    pub write_source_tables: bool,

    /// Drop columns of the region-day tables whose missing share (in percent)
    /// exceeds this threshold
    pub sparse_column_threshold: Option<f64>,

    /// Meteorological station registry; enrichment and aggregation are
    /// skipped without it
    pub meteo_station_registry: Option<PathBuf>,

    /// Hydrological station registry
    pub hydro_station_registry: Option<PathBuf>,

    pub meteo_priorities: PriorityTable,
    pub hydro_priorities: PriorityTable,

    pub meteo_aggregation: Vec<AggregationPolicy>,
    pub hydro_aggregation: Vec<AggregationPolicy>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        let meteo_priorities = PriorityTable::meteo_default();
        let hydro_priorities = PriorityTable::hydro_default();
        Self {
            max_concurrent_files: num_cpus::get(),
            output_format: OutputFormat::Csv,
            compression: CompressionAlgorithm::Snappy,
            write_source_tables: false,
            sparse_column_threshold: None,
            meteo_station_registry: None,
            hydro_station_registry: None,
            meteo_aggregation: default_policies(&meteo_priorities),
            hydro_aggregation: default_policies(&hydro_priorities),
            meteo_priorities,
            hydro_priorities,
        }
    }
}

impl ProcessorConfig {
    /// Load a full configuration from JSON
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImgwError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(ImgwError::Configuration {
                message: "max_concurrent_files must be at least 1".to_string(),
            });
        }
        if let Some(threshold) = self.sparse_column_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ImgwError::Configuration {
                    message: format!("sparse column threshold {threshold} is not a percentage"),
                });
            }
        }
        self.meteo_priorities.validate()?;
        self.hydro_priorities.validate()?;
        Ok(())
    }

    /// Set maximum concurrent files
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    /// Write the per-source tables as well
    pub fn with_source_tables(mut self) -> Self {
        self.write_source_tables = true;
        self
    }

    /// Enable sparse-column dropping; `None` uses the default threshold
    pub fn with_sparse_column_threshold(mut self, threshold: Option<f64>) -> Self {
        self.sparse_column_threshold = Some(threshold.unwrap_or(DEFAULT_SPARSE_COLUMN_THRESHOLD));
        self
    }

    pub fn with_meteo_station_registry(mut self, path: PathBuf) -> Self {
        self.meteo_station_registry = Some(path);
        self
    }

    pub fn with_hydro_station_registry(mut self, path: PathBuf) -> Self {
        self.hydro_station_registry = Some(path);
        self
    }

    /// Replace the meteorological priority table; aggregation policies
    /// follow the new canonical columns
    pub fn with_meteo_priorities(mut self, table: PriorityTable) -> Self {
        self.meteo_aggregation = default_policies(&table);
        self.meteo_priorities = table;
        self
    }
}
