//! Error handling for IMGW archive processing.
//!
//! File-level failures (`FormatMismatch`, `Parse`) are recoverable by
//! skipping the offending file; `DateResolution` is recoverable per row.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImgwError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Input not found at path: {path}")]
    MissingInput { path: PathBuf },

    #[error("No layout matches {file}: tried {tried}")]
    FormatMismatch { file: String, tried: String },

    #[error("Parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("Date resolution failed: {0}")]
    DateResolution(#[from] DateResolutionError),

    #[error("Station registry error in {path}: {reason}")]
    StationRegistry { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("None of the {failed} discovered input files could be parsed")]
    NoFilesParsed { failed: usize },
}

/// Why a set of date components does not form a calendar date.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateResolutionError {
    #[error("{component} is not numeric: '{value}'")]
    NonNumeric {
        component: &'static str,
        value: String,
    },

    #[error("{component} out of range: {value}")]
    OutOfRange { component: &'static str, value: u32 },

    #[error("date does not exist: {year}-{month:02}-{day:02}")]
    Nonexistent { year: i32, month: u32, day: u32 },
}

pub type Result<T> = std::result::Result<T, ImgwError>;
