//! Priority resolution of redundant measurements.
//!
//! Each canonical quantity is the left-to-right coalesce of an ordered list
//! of candidate columns: the first non-missing value wins and is never
//! overwritten by a lower-priority source. The ordering lives in a
//! versioned [`PriorityTable`] that can be replaced from JSON.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::constants::columns::{DATE, STATION_CODE, STATION_NAME};
use crate::error::{ImgwError, Result};
use crate::layout::SourceFormat;
use crate::merge::{MergedTable, suffixed};

/// Current version of the built-in priority tables
pub const PRIORITY_TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Number,
    Text,
}

impl ValueKind {
    fn dtype(&self) -> DataType {
        match self {
            ValueKind::Number => DataType::Float64,
            ValueKind::Text => DataType::String,
        }
    }
}

/// Candidates for one canonical quantity, most trusted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub canonical: String,
    pub candidates: Vec<String>,
    #[serde(default)]
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityTable {
    pub version: u32,
    pub rules: Vec<PriorityRule>,
}

fn rule(canonical: &str, kind: ValueKind, sources: &[SourceFormat]) -> PriorityRule {
    PriorityRule {
        canonical: canonical.to_string(),
        candidates: sources
            .iter()
            .map(|source| suffixed(canonical, source.label()))
            .collect(),
        kind,
    }
}

impl PriorityTable {
    /// Source precedence for the merged meteorological sources
    pub fn meteo_default() -> Self {
        use SourceFormat::{
            ClimateDaily as KD, ClimateDailyTerm as KDT, PrecipitationDaily as OD,
            SynopDaily as SD, SynopDailyTerm as SDT,
        };
        use ValueKind::{Number, Text};

        let mut rules = vec![
            rule(STATION_NAME, Text, &[SD, KD, OD, KDT, SDT]),
            rule("tmax_c", Number, &[SD, KD]),
            rule("tmin_c", Number, &[SD, KD]),
            rule("tavg_c", Number, &[SD, SDT, KD, KDT]),
            rule("tmin_ground_c", Number, &[SD, KD]),
            rule("precip_sum_mm", Number, &[SD, OD, KD]),
            rule("precip_kind", Text, &[SD, OD, KD]),
            rule("snow_depth_cm", Number, &[SD, OD, KD]),
            rule("fresh_snow_cm", Number, &[OD]),
            rule("humidity_pct", Number, &[SDT, KDT]),
            rule("wind_speed_ms", Number, &[SDT, KDT]),
            rule("cloud_cover_okta", Number, &[SDT, KDT]),
            rule("station_pressure_hpa", Number, &[SDT]),
            rule("sea_pressure_hpa", Number, &[SDT]),
            rule("vapour_pressure_hpa", Number, &[SDT]),
            rule("precip_day_mm", Number, &[SDT]),
            rule("precip_night_mm", Number, &[SDT]),
        ];

        const SYNOP_ONLY: &[&str] = &[
            "snow_water_equiv_mm",
            "sunshine_h",
            "rain_duration_h",
            "snow_duration_h",
            "sleet_duration_h",
            "hail_duration_h",
            "fog_duration_h",
            "mist_duration_h",
            "rime_duration_h",
            "glaze_duration_h",
            "low_drift_duration_h",
            "high_drift_duration_h",
            "haze_duration_h",
            "wind_ge10_duration_h",
            "wind_gt15_duration_h",
            "thunder_duration_h",
            "dew_duration_h",
            "hoarfrost_duration_h",
            "snow_cover_flag",
            "lightning_flag",
            "isotherm_lower_cm",
            "isotherm_upper_cm",
            "actinometry_jcm2",
        ];
        rules.extend(SYNOP_ONLY.iter().map(|name| rule(name, Number, &[SD])));
        rules.push(rule("ground_state", Text, &[SD]));

        Self {
            version: PRIORITY_TABLE_VERSION,
            rules,
        }
    }

    /// Hydrological daily data has a single source; the table only fixes
    /// the output column set and order.
    pub fn hydro_default() -> Self {
        use ValueKind::{Number, Text};
        let hydro = &[SourceFormat::HydroDaily];
        Self {
            version: PRIORITY_TABLE_VERSION,
            rules: vec![
                rule(STATION_NAME, Text, hydro),
                rule("river_name", Text, hydro),
                rule("water_level_cm", Number, hydro),
                rule("flow_m3s", Number, hydro),
                rule("water_temp_c", Number, hydro),
            ],
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImgwError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&contents)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.canonical.trim().is_empty() {
                return Err(ImgwError::Configuration {
                    message: "priority rule with an empty canonical name".to_string(),
                });
            }
            if rule.canonical == DATE || rule.canonical == STATION_CODE {
                return Err(ImgwError::Configuration {
                    message: format!("'{}' is a key column, not a measurement", rule.canonical),
                });
            }
            if !seen.insert(rule.canonical.as_str()) {
                return Err(ImgwError::Configuration {
                    message: format!("duplicate priority rule for '{}'", rule.canonical),
                });
            }
        }
        Ok(())
    }
}

/// Resolve a candidate to a column of the merged frame.
///
/// The first source's columns keep their plain names, so `x_<primary>`
/// falls back to `x` when only the plain column exists.
fn resolve_candidate<'a>(
    candidate: &'a str,
    available: &HashSet<&str>,
    primary_label: Option<&str>,
) -> Option<&'a str> {
    if available.contains(candidate) {
        return Some(candidate);
    }
    let label = primary_label?;
    candidate
        .strip_suffix(label)
        .and_then(|rest| rest.strip_suffix('_'))
        .filter(|plain| available.contains(plain))
}

/// Collapse the merged frame into one column per canonical quantity.
///
/// Output columns: `date, station_code`, then every rule's canonical column
/// in table order. A rule with no available candidate yields an all-missing
/// column.
pub fn resolve_priorities(merged: &MergedTable, table: &PriorityTable) -> Result<DataFrame> {
    let names = merged.frame.get_column_names();
    let available: HashSet<&str> = names.iter().map(|name| name.as_str()).collect();
    let primary = merged.primary_label();

    let mut selection = vec![col(DATE), col(STATION_CODE)];
    for rule in &table.rules {
        let dtype = rule.kind.dtype();
        let present: Vec<Expr> = rule
            .candidates
            .iter()
            .filter_map(|candidate| resolve_candidate(candidate, &available, primary))
            .map(|column| col(column).cast(dtype.clone()))
            .collect();

        let expr = if present.is_empty() {
            debug!("No candidate columns for '{}'", rule.canonical);
            lit(NULL).cast(dtype)
        } else {
            coalesce(&present)
        };
        selection.push(expr.alias(rule.canonical.as_str()));
    }

    Ok(merged.frame.clone().lazy().select(selection).collect()?)
}
