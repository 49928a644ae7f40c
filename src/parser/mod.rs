//! Record parser for delimited IMGW archives.
//!
//! [`parse_source`] is a pure function of the file bytes: it selects a layout
//! and encoding, splits every row and normalizes it into an
//! [`ObservationRecord`]. Malformed rows are skipped and counted; a file
//! without a single usable row fails as a whole.

pub mod bulletin;
pub mod encoding;
pub mod status;

use csv::StringRecord;
use tracing::debug;

use self::encoding::select_encoding;
use self::status::{interpret_code, interpret_measurement};
use crate::dates::{DateComponents, resolve_date};
use crate::error::{ImgwError, Result};
use crate::layout::{DatePart, FieldRole, FieldSpec, Layout, LayoutKind, SourceFormat, StatusAction, TextEncoding};
use crate::models::{FieldValue, ObservationRecord, RowCounters};

/// Result of parsing one delimited file
#[derive(Debug)]
pub struct ParsedSource {
    pub format: SourceFormat,
    pub encoding: TextEncoding,
    pub delimiter: u8,
    pub records: Vec<ObservationRecord>,
    pub rows_read: usize,
    pub counters: RowCounters,
}

/// Parse with the first candidate layout that fits the file.
///
/// `FormatMismatch` from one candidate moves on to the next; any other error
/// is returned immediately.
pub fn parse_source(file: &str, bytes: &[u8], candidates: &[&'static Layout]) -> Result<ParsedSource> {
    let mut tried = Vec::new();

    for layout in candidates
        .iter()
        .filter(|layout| layout.kind == LayoutKind::Delimited)
    {
        match parse_delimited(file, bytes, layout) {
            Err(ImgwError::FormatMismatch { .. }) => tried.push(layout.format.label()),
            other => return other,
        }
    }

    Err(ImgwError::FormatMismatch {
        file: file.to_string(),
        tried: tried.join(", "),
    })
}

/// Parse a file against one delimited layout.
pub fn parse_delimited(file: &str, bytes: &[u8], layout: &'static Layout) -> Result<ParsedSource> {
    let selection = select_encoding(bytes, layout).ok_or_else(|| ImgwError::FormatMismatch {
        file: file.to_string(),
        tried: layout.format.label().to_string(),
    })?;

    debug!(
        "{}: {} layout, {} encoding, {:?} delimiter",
        file,
        layout.format,
        selection.encoding.name(),
        selection.delimiter as char
    );

    let plan = RowPlan::for_layout(layout).ok_or_else(|| ImgwError::Parse {
        file: file.to_string(),
        reason: format!("layout {} has no station code column", layout.format),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(selection.delimiter)
        .flexible(true)
        .from_reader(selection.text.as_bytes());

    let mut records = Vec::new();
    let mut counters = RowCounters::default();
    let mut rows_read = 0usize;

    for row in reader.records() {
        rows_read += 1;
        let row = match row {
            Ok(row) if row.len() == layout.column_count() => row,
            Ok(row) => {
                debug!(
                    "{}: row {} has {} fields, expected {}",
                    file,
                    rows_read,
                    row.len(),
                    layout.column_count()
                );
                counters.malformed_rows += 1;
                continue;
            }
            Err(e) => {
                debug!("{}: row {} unreadable: {}", file, rows_read, e);
                counters.malformed_rows += 1;
                continue;
            }
        };

        if let Some(record) = plan.normalize(&row, &mut counters) {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ImgwError::Parse {
            file: file.to_string(),
            reason: format!(
                "no usable rows ({} read, {} malformed, {} without station code)",
                rows_read, counters.malformed_rows, counters.missing_station_code
            ),
        });
    }

    if counters.flagged_for_review > 0 {
        debug!(
            "{}: {} values kept as parsed despite an 'absent' status",
            file, counters.flagged_for_review
        );
    }

    Ok(ParsedSource {
        format: layout.format,
        encoding: selection.encoding,
        delimiter: selection.delimiter,
        records,
        rows_read,
        counters,
    })
}

#[derive(Debug, Clone, Copy)]
enum DatePlan {
    Calendar {
        year: usize,
        month: usize,
        day: usize,
    },
    Hydrological {
        hydro_year: usize,
        calendar_month: usize,
        day: usize,
    },
    Absent,
}

/// Output field with its own position and its status position
#[derive(Debug)]
struct OutputColumn {
    spec: &'static FieldSpec,
    position: usize,
    status: Option<usize>,
}

/// Field positions resolved once per layout
#[derive(Debug)]
struct RowPlan {
    code: usize,
    name: Option<usize>,
    date: DatePlan,
    outputs: Vec<OutputColumn>,
}

impl RowPlan {
    fn for_layout(layout: &'static Layout) -> Option<Self> {
        let position_of = |wanted: FieldRole| layout.fields.iter().position(|f| f.role == wanted);
        let date_part = |part: DatePart| position_of(FieldRole::Date(part));

        let date = match (
            date_part(DatePart::Year),
            date_part(DatePart::Month),
            date_part(DatePart::HydroYear),
            date_part(DatePart::CalendarMonth),
            date_part(DatePart::Day),
        ) {
            (Some(year), Some(month), _, _, Some(day)) => DatePlan::Calendar { year, month, day },
            (_, _, Some(hydro_year), Some(calendar_month), Some(day)) => DatePlan::Hydrological {
                hydro_year,
                calendar_month,
                day,
            },
            _ => DatePlan::Absent,
        };

        let outputs = layout
            .fields
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.is_output())
            .map(|(position, spec)| OutputColumn {
                spec,
                position,
                status: spec.status.and_then(|name| layout.position(name)),
            })
            .collect();

        Some(Self {
            code: position_of(FieldRole::StationCode)?,
            name: position_of(FieldRole::StationName),
            date,
            outputs,
        })
    }

    fn normalize(&self, row: &StringRecord, counters: &mut RowCounters) -> Option<ObservationRecord> {
        let field = |position: usize| row.get(position).unwrap_or("");

        let station_code = field(self.code).trim();
        if station_code.is_empty() {
            counters.missing_station_code += 1;
            return None;
        }

        let station_name = self
            .name
            .map(|position| field(position).trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let components = match self.date {
            DatePlan::Calendar { year, month, day } => Some(DateComponents::Calendar {
                year: field(year),
                month: field(month),
                day: field(day),
            }),
            DatePlan::Hydrological {
                hydro_year,
                calendar_month,
                day,
            } => Some(DateComponents::Hydrological {
                hydro_year: field(hydro_year),
                calendar_month: field(calendar_month),
                day: field(day),
            }),
            DatePlan::Absent => None,
        };

        let date = match components.map(resolve_date) {
            Some(Ok(date)) => Some(date),
            Some(Err(e)) => {
                debug!("Station {}: {}", station_code, e);
                counters.unresolved_dates += 1;
                None
            }
            None => None,
        };

        let values = self
            .outputs
            .iter()
            .map(|column| {
                let raw = field(column.position);
                let status = column.status.map(field);
                match column.spec.role {
                    FieldRole::Measurement { .. } => {
                        let result = interpret_measurement(&column.spec.role, raw, status);
                        if result.action == Some(StatusAction::KeepAndFlag) {
                            counters.flagged_for_review += 1;
                        }
                        FieldValue::Number(result.value)
                    }
                    _ => FieldValue::Text(interpret_code(&column.spec.role, raw, status).value),
                }
            })
            .collect();

        Some(ObservationRecord {
            station_code: station_code.to_string(),
            station_name,
            date,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn climate_line(code: &str, day: &str, tmax: &str, tmax_status: &str, precip: &str, precip_status: &str) -> String {
        format!(
            "{code},\"WARSZAWA\",2018,01,{day},{tmax},{tmax_status},-2.0,,0.5,,-4.0,,{precip},{precip_status},W,0,9"
        )
    }

    #[test]
    fn test_parse_climate_daily() {
        let text = [
            climate_line("352200375", "1", "3.5", "", "1,2", ""),
            climate_line("352200375", "2", "4.0", "8", "", "9"),
        ]
        .join("\n");

        let parsed = parse_delimited("k_d_01_2018.csv", text.as_bytes(), SourceFormat::ClimateDaily.layout()).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.rows_read, 2);

        let first = &parsed.records[0];
        assert_eq!(first.station_code, "352200375");
        assert_eq!(first.station_name.as_deref(), Some("WARSZAWA"));
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2018, 1, 1));
        // tmax, tmin, tavg, tmin_ground, precip, precip_kind, snow_depth
        assert_eq!(first.values.len(), 7);
        assert_eq!(first.values[0].as_number(), Some(3.5));
        assert_eq!(first.values[4].as_number(), Some(1.2));
        assert_eq!(first.values[5].as_text(), Some("W"));
        // snow depth with status 9 is absent, so zero
        assert_eq!(first.values[6].as_number(), Some(0.0));

        let second = &parsed.records[1];
        assert_eq!(second.values[0].as_number(), None);
        assert_eq!(second.values[4].as_number(), Some(0.0));
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let text = format!(
            "{}\n1,2,3\n{}\n",
            climate_line("100", "1", "1", "", "0", ""),
            climate_line("100", "2", "2", "", "0", "")
        );
        let parsed = parse_delimited("k_d.csv", text.as_bytes(), SourceFormat::ClimateDaily.layout()).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.counters.malformed_rows, 1);
    }

    #[test]
    fn test_bad_date_retained_as_missing() {
        let text = climate_line("100", "31", "1", "", "0", "").replace(",01,", ",02,");
        let parsed = parse_delimited("k_d.csv", text.as_bytes(), SourceFormat::ClimateDaily.layout()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].date, None);
        assert_eq!(parsed.counters.unresolved_dates, 1);
    }

    #[test]
    fn test_missing_station_code_dropped() {
        let text = format!(
            "{}\n{}\n",
            climate_line("  ", "1", "1", "", "0", ""),
            climate_line("100", "2", "2", "", "0", "")
        );
        let parsed = parse_delimited("k_d.csv", text.as_bytes(), SourceFormat::ClimateDaily.layout()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.counters.missing_station_code, 1);
    }

    #[test]
    fn test_flagged_continuous_value() {
        let text = climate_line("100", "1", "-0.4", "9", "0", "");
        let parsed = parse_delimited("k_d.csv", text.as_bytes(), SourceFormat::ClimateDaily.layout()).unwrap();
        assert_eq!(parsed.records[0].values[0].as_number(), Some(-0.4));
        assert_eq!(parsed.counters.flagged_for_review, 1);
    }

    #[test]
    fn test_hydro_daily_sentinels_and_hydro_year() {
        let text = "150160180;KRAKÓW-BIELANY;Wisła;2020;1;15;9999;99999.999;99.9;11\n\
                    150160180;KRAKÓW-BIELANY;Wisła;2020;6;1;240;120,5;8,1;4\n";
        let parsed = parse_delimited("codz_2020_01.csv", text.as_bytes(), SourceFormat::HydroDaily.layout()).unwrap();
        assert_eq!(parsed.delimiter, b';');

        let november = &parsed.records[0];
        assert_eq!(november.date, NaiveDate::from_ymd_opt(2019, 11, 15));
        // river_name, water_level, flow, water_temp
        assert_eq!(november.values[0].as_text(), Some("Wisła"));
        assert!(november.values[1..].iter().all(FieldValue::is_missing));

        let april = &parsed.records[1];
        assert_eq!(april.date, NaiveDate::from_ymd_opt(2020, 4, 1));
        assert_eq!(april.values[2].as_number(), Some(120.5));
    }

    #[test]
    fn test_parse_source_tries_candidates() {
        let text = "249180010,\"ZAKOPANE\",2018,1,1,1.0,,80,,0.5,,3,\n";
        let candidates = [
            SourceFormat::ClimateDaily.layout(),
            SourceFormat::ClimateDailyTerm.layout(),
        ];
        let parsed = parse_source("unknown.csv", text.as_bytes(), &candidates).unwrap();
        assert_eq!(parsed.format, SourceFormat::ClimateDailyTerm);
    }

    #[test]
    fn test_format_mismatch_when_nothing_fits() {
        let result = parse_source("x.csv", b"a,b,c\n", &[SourceFormat::SynopDaily.layout()]);
        match result.unwrap_err() {
            ImgwError::FormatMismatch { file, tried } => {
                assert_eq!(file, "x.csv");
                assert_eq!(tried, "synopSD");
            }
            other => panic!("Expected FormatMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_is_format_mismatch() {
        let result = parse_source("empty.csv", b"", &[SourceFormat::ClimateDaily.layout()]);
        assert!(matches!(result, Err(ImgwError::FormatMismatch { .. })));
    }
}
