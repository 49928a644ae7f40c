//! Single-owner fold of per-file results.
//!
//! Successful files contribute records grouped by format (in the order the
//! files were folded); failures only contribute an outcome entry.

use crate::error::Result;
use crate::layout::SourceFormat;
use crate::models::{FileOutcome, FileStatus, HydroWarning, ObservationRecord, RowCounters};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::batch::ParsedFile;

#[derive(Debug, Default)]
pub struct Accumulator {
    observations: BTreeMap<SourceFormat, Vec<ObservationRecord>>,
    warnings: Vec<HydroWarning>,
    outcomes: Vec<FileOutcome>,
    counters: RowCounters,
}

/// Everything collected from the parsed files
#[derive(Debug, Default)]
pub struct Accumulated {
    pub observations: BTreeMap<SourceFormat, Vec<ObservationRecord>>,
    pub warnings: Vec<HydroWarning>,
    pub outcomes: Vec<FileOutcome>,
    pub counters: RowCounters,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf, hint: Option<SourceFormat>, result: Result<ParsedFile>) {
        let outcome = match result {
            Ok(ParsedFile::Observations(parsed)) => {
                self.counters.absorb(&parsed.counters);
                let rows = parsed.records.len();
                self.observations
                    .entry(parsed.format)
                    .or_default()
                    .extend(parsed.records);
                FileOutcome {
                    path,
                    format: Some(parsed.format),
                    status: FileStatus::Parsed {
                        rows,
                        encoding: Some(parsed.encoding.name().to_string()),
                    },
                }
            }
            Ok(ParsedFile::Warning(warning)) => {
                self.warnings.push(warning);
                FileOutcome {
                    path,
                    format: Some(SourceFormat::HydroWarning),
                    status: FileStatus::Parsed {
                        rows: 1,
                        encoding: None,
                    },
                }
            }
            Err(e) => FileOutcome {
                path,
                format: hint,
                status: FileStatus::Failed {
                    reason: e.to_string(),
                },
            },
        };
        self.outcomes.push(outcome);
    }

    pub fn files_processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.outcomes.len() - self.files_processed()
    }

    pub fn finish(self) -> Accumulated {
        Accumulated {
            observations: self.observations,
            warnings: self.warnings,
            outcomes: self.outcomes,
            counters: self.counters,
        }
    }
}
