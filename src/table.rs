//! Conversion of normalized records into polars frames.
//!
//! Per-source frames have the columns `date, station_code, station_name`
//! followed by the layout's output fields in declared order. Status and date
//! component columns do not survive normalization.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::HashSet;

use crate::constants::EPOCH_DAYS_FROM_CE;
use crate::constants::columns::{DATE, STATION_CODE, STATION_NAME};
use crate::error::{ImgwError, Result};
use crate::layout::{FieldRole, Layout};
use crate::models::{HydroWarning, ObservationRecord};

/// Days since 1970-01-01, the physical representation of a polars Date
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Build a Date column from optional calendar dates
pub fn date_column(name: &str, dates: impl IntoIterator<Item = Option<NaiveDate>>) -> Result<Column> {
    let days: Vec<Option<i32>> = dates.into_iter().map(|d| d.map(epoch_days)).collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

/// Keep the first record of every (date, station) key.
///
/// Records without a date are kept as they are; they never collide because
/// they cannot be joined. Returns the retained records and the number of
/// duplicates removed.
pub fn deduplicate(records: Vec<ObservationRecord>) -> (Vec<ObservationRecord>, usize) {
    let mut seen = HashSet::new();
    let before = records.len();
    let kept: Vec<ObservationRecord> = records
        .into_iter()
        .filter(|record| match record.date {
            Some(date) => seen.insert((date, record.station_code.clone())),
            None => true,
        })
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Build the per-source frame for a delimited layout.
pub fn observations_to_frame(layout: &Layout, records: &[ObservationRecord]) -> Result<DataFrame> {
    let expected = layout.output_field_count();
    if let Some(bad) = records.iter().find(|r| r.values.len() != expected) {
        return Err(ImgwError::Configuration {
            message: format!(
                "record for station {} has {} values, layout {} declares {}",
                bad.station_code,
                bad.values.len(),
                layout.format,
                expected
            ),
        });
    }

    let mut columns = Vec::with_capacity(expected + 3);
    columns.push(date_column(DATE, records.iter().map(|r| r.date))?);
    columns.push(Column::new(
        STATION_CODE.into(),
        records.iter().map(|r| r.station_code.as_str()).collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        STATION_NAME.into(),
        records
            .iter()
            .map(|r| r.station_name.as_deref())
            .collect::<Vec<_>>(),
    ));

    for (index, field) in layout.output_fields().enumerate() {
        let column = match field.role {
            FieldRole::Measurement { .. } => Column::new(
                field.name.into(),
                records
                    .iter()
                    .map(|r| r.values[index].as_number())
                    .collect::<Vec<_>>(),
            ),
            _ => Column::new(
                field.name.into(),
                records
                    .iter()
                    .map(|r| r.values[index].as_text())
                    .collect::<Vec<_>>(),
            ),
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

/// Build the warning bulletin table, ordered by file name
pub fn warnings_to_frame(warnings: &[HydroWarning]) -> Result<DataFrame> {
    let text = |name: &str, get: fn(&HydroWarning) -> Option<&str>| {
        Column::new(name.into(), warnings.iter().map(get).collect::<Vec<_>>())
    };
    let small = |name: &str, get: fn(&HydroWarning) -> Option<u8>| {
        Column::new(
            name.into(),
            warnings
                .iter()
                .map(|w| get(w).map(u32::from))
                .collect::<Vec<_>>(),
        )
    };

    let columns = vec![
        date_column("issued_on", warnings.iter().map(|w| w.issued_on))?,
        text("issued_at", |w| w.issued_at.as_deref()),
        Column::new(
            "file_name".into(),
            warnings
                .iter()
                .map(|w| w.file_name.as_str())
                .collect::<Vec<_>>(),
        ),
        text("office", |w| w.office.as_deref()),
        text("bulletin_number", |w| w.bulletin_number.as_deref()),
        text("phenomenon", |w| w.phenomenon.as_deref()),
        small("warning_level", |w| w.warning_level),
        date_column("valid_from_date", warnings.iter().map(|w| w.valid_from_date))?,
        text("valid_from_time", |w| w.valid_from_time.as_deref()),
        date_column("valid_to_date", warnings.iter().map(|w| w.valid_to_date))?,
        text("valid_to_time", |w| w.valid_to_time.as_deref()),
        text("area", |w| w.area.as_deref()),
        small("probability_pct", |w| w.probability_pct),
        text("hydrologist", |w| w.hydrologist.as_deref()),
    ];

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SourceFormat;
    use crate::models::FieldValue;

    fn record(code: &str, day: u32, tavg: Option<f64>) -> ObservationRecord {
        ObservationRecord {
            station_code: code.to_string(),
            station_name: Some("ŁEBA".to_string()),
            date: NaiveDate::from_ymd_opt(2020, 1, day),
            values: vec![
                FieldValue::Number(tavg),
                FieldValue::Number(Some(80.0)),
                FieldValue::Number(None),
                FieldValue::Number(Some(8.0)),
            ],
        }
    }

    #[test]
    fn test_epoch_days() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }

    #[test]
    fn test_frame_columns_follow_layout() {
        let layout = SourceFormat::ClimateDailyTerm.layout();
        let df = observations_to_frame(layout, &[record("1", 1, Some(1.5)), record("2", 1, None)]).unwrap();

        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "date",
                "station_code",
                "station_name",
                "tavg_c",
                "humidity_pct",
                "wind_speed_ms",
                "cloud_cover_okta"
            ]
        );
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("tavg_c").unwrap().f64().unwrap().get(0), Some(1.5));
        assert_eq!(df.column("tavg_c").unwrap().f64().unwrap().get(1), None);

        let dates = df.column("date").unwrap().cast(&DataType::String).unwrap();
        assert_eq!(dates.str().unwrap().get(0), Some("2020-01-01"));
    }

    #[test]
    fn test_value_count_mismatch_rejected() {
        let layout = SourceFormat::SynopDaily.layout();
        let result = observations_to_frame(layout, &[record("1", 1, None)]);
        assert!(matches!(result, Err(ImgwError::Configuration { .. })));
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let mut undated = record("1", 1, None);
        undated.date = None;
        let records = vec![
            record("1", 1, Some(1.0)),
            record("1", 1, Some(2.0)),
            record("2", 1, Some(3.0)),
            undated.clone(),
            undated,
        ];
        let (kept, removed) = deduplicate(records);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].values[0].as_number(), Some(1.0));
    }

    #[test]
    fn test_warnings_frame() {
        let warnings = vec![HydroWarning {
            file_name: "a.txt".to_string(),
            issued_on: NaiveDate::from_ymd_opt(2021, 2, 3),
            warning_level: Some(2),
            ..HydroWarning::default()
        }];
        let df = warnings_to_frame(&warnings).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("warning_level").unwrap().u32().unwrap().get(0), Some(2));
        assert_eq!(df.column("office").unwrap().null_count(), 1);
    }
}
