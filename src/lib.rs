//! IMGW Processor Library
//!
//! Normalizes IMGW (Polish hydrological and meteorological service) station
//! archives into canonical per-station daily tables and per-county daily
//! aggregates.
//!
//! This library provides tools for:
//! - Declaring every supported archive layout in one registry
//! - Parsing delimited archives with encoding selection and status-code rules
//! - Resolving calendar and hydrological-year dates
//! - Merging redundant sources and resolving them by a versioned priority table
//! - Attributing stations to counties and aggregating per county and day
//! - Writing CSV or Parquet outputs for every pipeline stage

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod layout;
pub mod merge;
pub mod models;
pub mod parser;
pub mod priority;
pub mod processor;
pub mod stations;
pub mod table;

pub use config::ProcessorConfig;
pub use error::{ImgwError, Result};
pub use layout::{Layout, SourceFormat};
pub use models::{ObservationRecord, ProcessingStats, Station};
pub use processor::DatasetProcessor;
