//! Multi-source merge on (date, station_code).
//!
//! A full outer join keeps every key seen in any source. The first source
//! keeps its column names; every other source's non-key columns are
//! suffixed with `_<label>`.

use polars::prelude::*;
use tracing::debug;

use crate::constants::columns::{DATE, KEYS, STATION_CODE};
use crate::error::{ImgwError, Result};

/// A normalized per-source table tagged with its source label
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub label: String,
    pub frame: DataFrame,
}

impl SourceTable {
    pub fn new(label: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            label: label.into(),
            frame,
        }
    }
}

/// The wide merge result and the labels of its sources, in merge order
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub frame: DataFrame,
    pub labels: Vec<String>,
    /// Rows excluded because they had no date to join on
    pub dropped_missing_date: usize,
}

impl MergedTable {
    /// Label of the source whose columns kept their plain names
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }
}

/// Column name a source contributes after merging
pub fn suffixed(column: &str, label: &str) -> String {
    format!("{column}_{label}")
}

fn is_key(column: &str) -> bool {
    KEYS.contains(&column)
}

fn prepare(table: &SourceTable, suffix: bool) -> LazyFrame {
    let selection: Vec<Expr> = table
        .frame
        .get_column_names()
        .iter()
        .map(|name| {
            let name = name.as_str();
            if suffix && !is_key(name) {
                col(name).alias(suffixed(name, &table.label))
            } else {
                col(name)
            }
        })
        .collect();

    table
        .frame
        .clone()
        .lazy()
        .filter(col(DATE).is_not_null())
        .select(selection)
}

/// Full outer join of all tables on (date, station_code).
///
/// Each input must already be unique per key for the "exactly once"
/// guarantee to hold (see [`crate::table::deduplicate`]).
pub fn merge_sources(tables: Vec<SourceTable>) -> Result<MergedTable> {
    if tables.is_empty() {
        return Err(ImgwError::Configuration {
            message: "nothing to merge: no source tables".to_string(),
        });
    }

    for table in &tables {
        for key in KEYS {
            if table.frame.column(key).is_err() {
                return Err(ImgwError::Configuration {
                    message: format!("source {} has no '{}' column", table.label, key),
                });
            }
        }
    }

    let dropped_missing_date = tables
        .iter()
        .map(|table| table.frame.column(DATE).map(|c| c.null_count()).unwrap_or(0))
        .sum();

    let labels: Vec<String> = tables.iter().map(|t| t.label.clone()).collect();
    let mut prepared = tables
        .iter()
        .enumerate()
        .map(|(index, table)| prepare(table, index > 0));

    let Some(mut merged) = prepared.next() else {
        return Err(ImgwError::Configuration {
            message: "nothing to merge: no source tables".to_string(),
        });
    };

    for next in prepared {
        merged = merged.join(
            next,
            [col(DATE), col(STATION_CODE)],
            [col(DATE), col(STATION_CODE)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }

    let frame = merged
        .sort_by_exprs([col(DATE), col(STATION_CODE)], SortMultipleOptions::default())
        .collect()?;

    debug!(
        "Merged {} sources into {} rows x {} columns ({} rows without date left out)",
        labels.len(),
        frame.height(),
        frame.width(),
        dropped_missing_date
    );

    Ok(MergedTable {
        frame,
        labels,
        dropped_missing_date,
    })
}
