//! Region-day aggregation and column completeness.
//!
//! Rows sharing a date and a region collapse into one row. Every aggregation
//! skips missing values, and a group in which a column is entirely missing
//! stays missing for that column instead of becoming zero.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::columns::{DATE, REGION};
use crate::error::Result;
use crate::layout::{QuantityKind, quantity_kind};
use crate::priority::{PriorityTable, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn {
    /// Arithmetic mean of the non-missing values
    Mean,
    /// Occurrence flags: occurred anywhere in the region
    Max,
    /// Region totals; needs at least one non-missing value
    Sum,
}

impl AggregationFn {
    fn expr(&self, column: &str) -> Expr {
        let values = col(column).cast(DataType::Float64);
        let aggregated = match self {
            AggregationFn::Mean => values.mean(),
            AggregationFn::Max => values.max(),
            AggregationFn::Sum => when(values.clone().count().gt(lit(0)))
                .then(values.sum())
                .otherwise(lit(NULL).cast(DataType::Float64)),
        };
        aggregated.alias(column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    pub column: String,
    pub function: AggregationFn,
}

impl AggregationPolicy {
    pub fn new(column: impl Into<String>, function: AggregationFn) -> Self {
        Self {
            column: column.into(),
            function,
        }
    }
}

/// Max for occurrence flags, mean for every other numeric canonical column
pub fn default_policies(table: &PriorityTable) -> Vec<AggregationPolicy> {
    table
        .rules
        .iter()
        .filter(|rule| rule.kind == ValueKind::Number)
        .map(|rule| {
            let function = match quantity_kind(&rule.canonical) {
                Some(QuantityKind::Occurrence) => AggregationFn::Max,
                _ => AggregationFn::Mean,
            };
            AggregationPolicy::new(rule.canonical.clone(), function)
        })
        .collect()
}

#[derive(Debug)]
pub struct RegionAggregate {
    pub frame: DataFrame,
    /// Input rows left out for lack of a region or date
    pub excluded_rows: usize,
}

/// Group by (date, region) and apply each policy to its column.
///
/// Policies naming absent columns are skipped. Output is sorted by date,
/// then region.
pub fn aggregate_by_region(frame: &DataFrame, policies: &[AggregationPolicy]) -> Result<RegionAggregate> {
    let aggregations: Vec<Expr> = policies
        .iter()
        .filter(|policy| {
            let present = frame.column(&policy.column).is_ok();
            if !present {
                debug!("Skipping aggregation of absent column '{}'", policy.column);
            }
            present
        })
        .map(|policy| policy.function.expr(&policy.column))
        .collect();

    let grouped = frame
        .clone()
        .lazy()
        .filter(col(REGION).is_not_null().and(col(DATE).is_not_null()))
        .group_by([col(DATE), col(REGION)])
        .agg(aggregations)
        .sort_by_exprs([col(DATE), col(REGION)], SortMultipleOptions::default())
        .collect()?;

    let included = frame
        .clone()
        .lazy()
        .filter(col(REGION).is_not_null().and(col(DATE).is_not_null()))
        .select([len()])
        .collect()?
        .column("len")?
        .u32()?
        .get(0)
        .unwrap_or(0) as usize;
    let excluded_rows = frame.height().saturating_sub(included);

    debug!(
        "Aggregated {} rows into {} region-days ({} rows without region or date)",
        included,
        grouped.height(),
        excluded_rows
    );

    Ok(RegionAggregate {
        frame: grouped,
        excluded_rows,
    })
}

/// Share of non-missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCompleteness {
    pub column: String,
    pub present: usize,
    pub total: usize,
}

impl ColumnCompleteness {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.present as f64 * 100.0 / self.total as f64
        }
    }
}

pub fn completeness(frame: &DataFrame) -> Vec<ColumnCompleteness> {
    let total = frame.height();
    frame
        .get_columns()
        .iter()
        .map(|column| ColumnCompleteness {
            column: column.name().to_string(),
            present: total - column.null_count(),
            total,
        })
        .collect()
}

/// Drop columns whose missing share exceeds `max_missing_pct`.
///
/// Columns listed in `keep` always survive. Returns the reduced frame and
/// the names of the dropped columns.
pub fn drop_sparse_columns(
    frame: &DataFrame,
    max_missing_pct: f64,
    keep: &[&str],
) -> Result<(DataFrame, Vec<String>)> {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for stats in completeness(frame) {
        let missing_pct = 100.0 - stats.percent();
        if keep.contains(&stats.column.as_str()) || missing_pct <= max_missing_pct {
            kept.push(stats.column);
        } else {
            dropped.push(stats.column);
        }
    }

    if !dropped.is_empty() {
        debug!("Dropping sparse columns: {}", dropped.join(", "));
    }

    Ok((frame.select(kept)?, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::date_column;
    use chrono::NaiveDate;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2020, 5, d)
    }

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            date_column(DATE, [day(1), day(1), day(1), day(1), day(2), day(2)]).unwrap(),
            Column::new("station_code".into(), ["A", "B", "C", "D", "A", "B"]),
            Column::new(
                REGION.into(),
                [Some("krakowski"), Some("krakowski"), Some("krakowski"), None, Some("krakowski"), Some("krakowski")],
            ),
            Column::new("tavg_c".into(), [Some(2.0), None, Some(4.0), Some(100.0), None, None]),
            Column::new("lightning_flag".into(), [Some(0.0), Some(1.0), None, None, None, Some(0.0)]),
            Column::new("precip_sum_mm".into(), [Some(1.5), Some(2.5), None, None, None, None]),
        ])
        .unwrap()
    }

    fn policies() -> Vec<AggregationPolicy> {
        vec![
            AggregationPolicy::new("tavg_c", AggregationFn::Mean),
            AggregationPolicy::new("lightning_flag", AggregationFn::Max),
            AggregationPolicy::new("precip_sum_mm", AggregationFn::Sum),
            AggregationPolicy::new("not_there", AggregationFn::Mean),
        ]
    }

    #[test]
    fn test_mean_skips_missing() {
        let result = aggregate_by_region(&sample(), &policies()).unwrap();
        let df = &result.frame;
        assert_eq!(df.height(), 2);
        assert_eq!(result.excluded_rows, 1);

        // [2.0, missing, 4.0] -> 3.0; the region-less 100.0 is excluded
        let tavg = df.column("tavg_c").unwrap().f64().unwrap();
        assert_eq!(tavg.get(0), Some(3.0));
        // all missing on day 2 stays missing
        assert_eq!(tavg.get(1), None);
    }

    #[test]
    fn test_max_and_sum() {
        let result = aggregate_by_region(&sample(), &policies()).unwrap();
        let df = &result.frame;

        let lightning = df.column("lightning_flag").unwrap().f64().unwrap();
        assert_eq!(lightning.get(0), Some(1.0));
        assert_eq!(lightning.get(1), Some(0.0));

        let precip = df.column("precip_sum_mm").unwrap().f64().unwrap();
        assert_eq!(precip.get(0), Some(4.0));
        assert_eq!(precip.get(1), None);
    }

    #[test]
    fn test_output_sorted_with_keys_first() {
        let result = aggregate_by_region(&sample(), &policies()).unwrap();
        let names: Vec<&str> = result.frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["date", "region", "tavg_c", "lightning_flag", "precip_sum_mm"]);

        let dates = result.frame.column(DATE).unwrap().cast(&DataType::String).unwrap();
        let dates = dates.str().unwrap();
        assert_eq!(dates.get(0), Some("2020-05-01"));
        assert_eq!(dates.get(1), Some("2020-05-02"));
    }

    #[test]
    fn test_default_policies() {
        let policies = default_policies(&PriorityTable::meteo_default());
        let lookup = |name: &str| policies.iter().find(|p| p.column == name).map(|p| p.function);
        assert_eq!(lookup("lightning_flag"), Some(AggregationFn::Max));
        assert_eq!(lookup("snow_cover_flag"), Some(AggregationFn::Max));
        assert_eq!(lookup("tmax_c"), Some(AggregationFn::Mean));
        assert_eq!(lookup("station_name"), None);
    }

    #[test]
    fn test_completeness_and_sparse_columns() {
        let df = sample();
        let report = completeness(&df);
        let precip = report.iter().find(|c| c.column == "precip_sum_mm").unwrap();
        assert_eq!(precip.present, 2);
        assert_eq!(precip.total, 6);

        // precip is 66.7% missing, tavg 50%, lightning 50%
        let (reduced, dropped) = drop_sparse_columns(&df, 60.0, &["date", "region"]).unwrap();
        assert_eq!(dropped, vec!["precip_sum_mm".to_string()]);
        assert!(reduced.column("tavg_c").is_ok());
        assert_eq!(reduced.width(), 5);
    }
}
