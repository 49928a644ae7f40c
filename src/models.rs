//! Core data structures for IMGW processing.
//!
//! Normalized records, station metadata, warning bulletins and the
//! statistics reported at the end of a run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::layout::SourceFormat;

/// One normalized value of a layout output field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(Option<f64>),
    Text(Option<String>),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => *value,
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => value.as_deref(),
            FieldValue::Number(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Number(value) => value.is_none(),
            FieldValue::Text(value) => value.is_none(),
        }
    }
}

/// Normalized output of the record parser.
///
/// `values` holds one entry per output field of the source layout, in
/// layout order (see [`crate::layout::Layout::output_fields`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub station_code: String,
    pub station_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub values: Vec<FieldValue>,
}

/// Station registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    pub name: String,
    pub river: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub region: Option<String>,
}

/// Fields extracted from one hydrological warning bulletin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydroWarning {
    pub file_name: String,
    pub issued_on: Option<NaiveDate>,
    pub issued_at: Option<String>,
    pub office: Option<String>,
    pub bulletin_number: Option<String>,
    pub phenomenon: Option<String>,
    pub warning_level: Option<u8>,
    pub valid_from_date: Option<NaiveDate>,
    pub valid_from_time: Option<String>,
    pub valid_to_date: Option<NaiveDate>,
    pub valid_to_time: Option<String>,
    pub area: Option<String>,
    pub probability_pct: Option<u8>,
    pub hydrologist: Option<String>,
}

/// Row counters collected across the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCounters {
    /// Rows skipped because their field count did not match the layout
    pub malformed_rows: usize,
    /// Rows skipped because the station code was empty
    pub missing_station_code: usize,
    /// Rows retained with a missing date
    pub unresolved_dates: usize,
    /// Rows left out of the merge because they had no date
    pub missing_date_at_merge: usize,
    /// Repeated (date, station) keys within one source; first kept
    pub duplicate_keys: usize,
    /// Rows left out of aggregation for lack of a region
    pub unassigned_region: usize,
    /// Continuous values kept as parsed despite an "absent" status
    pub flagged_for_review: usize,
}

impl RowCounters {
    pub fn absorb(&mut self, other: &RowCounters) {
        self.malformed_rows += other.malformed_rows;
        self.missing_station_code += other.missing_station_code;
        self.unresolved_dates += other.unresolved_dates;
        self.missing_date_at_merge += other.missing_date_at_merge;
        self.duplicate_keys += other.duplicate_keys;
        self.unassigned_region += other.unassigned_region;
        self.flagged_for_review += other.flagged_for_review;
    }

    /// Labelled counts for reporting
    pub fn entries(&self) -> [(&'static str, usize); 7] {
        [
            ("malformed rows", self.malformed_rows),
            ("missing station code", self.missing_station_code),
            ("unresolved dates (kept)", self.unresolved_dates),
            ("missing date at merge", self.missing_date_at_merge),
            ("duplicate keys", self.duplicate_keys),
            ("unassigned region", self.unassigned_region),
            ("flagged for review (kept)", self.flagged_for_review),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FileStatus {
    /// `encoding` is `None` for free-text bulletins
    Parsed { rows: usize, encoding: Option<String> },
    Failed { reason: String },
}

/// Outcome of processing one input file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Parsed { .. })
    }
}

/// Processing statistics
#[derive(Debug, Default, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub file_outcomes: Vec<FileOutcome>,
    /// Rows written per output table
    pub rows_written: BTreeMap<String, usize>,
    /// Stages that could not run, with the reason
    pub stage_failures: Vec<String>,
    pub counters: RowCounters,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}

impl ProcessingStats {
    pub fn total_rows(&self) -> usize {
        self.rows_written.values().sum()
    }
}
