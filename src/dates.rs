//! Calendar date resolution for daily records.
//!
//! Hydrological years start on 1 November, so November and December records
//! of hydrological year `N` fall in calendar year `N - 1`.

use chrono::NaiveDate;

use crate::error::DateResolutionError;

/// First calendar month of a hydrological year
pub const HYDRO_YEAR_START_MONTH: u32 = 11;

/// Raw date components as they appear in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComponents<'a> {
    Calendar {
        year: &'a str,
        month: &'a str,
        day: &'a str,
    },
    Hydrological {
        hydro_year: &'a str,
        calendar_month: &'a str,
        day: &'a str,
    },
}

/// Calendar year of a record stamped with a hydrological year
pub fn calendar_year(hydro_year: i32, calendar_month: u32) -> i32 {
    if calendar_month >= HYDRO_YEAR_START_MONTH {
        hydro_year - 1
    } else {
        hydro_year
    }
}

/// Compose a calendar date, rejecting partially valid components.
pub fn resolve_date(components: DateComponents<'_>) -> Result<NaiveDate, DateResolutionError> {
    let (year, month, day) = match components {
        DateComponents::Calendar { year, month, day } => {
            let year = parse_component("year", year, 4, 4)?;
            let month = parse_month(month)?;
            (year as i32, month, parse_component("day", day, 1, 2)?)
        }
        DateComponents::Hydrological {
            hydro_year,
            calendar_month,
            day,
        } => {
            let hydro_year = parse_component("hydrological year", hydro_year, 4, 4)?;
            let month = parse_month(calendar_month)?;
            (
                calendar_year(hydro_year as i32, month),
                month,
                parse_component("day", day, 1, 2)?,
            )
        }
    };

    if !(1..=31).contains(&day) {
        return Err(DateResolutionError::OutOfRange {
            component: "day",
            value: day,
        });
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(DateResolutionError::Nonexistent { year, month, day })
}

fn parse_month(raw: &str) -> Result<u32, DateResolutionError> {
    let month = parse_component("month", raw, 1, 2)?;
    if !(1..=12).contains(&month) {
        return Err(DateResolutionError::OutOfRange {
            component: "month",
            value: month,
        });
    }
    Ok(month)
}

/// Digits only, with a bounded width after trimming
fn parse_component(
    component: &'static str,
    raw: &str,
    min_digits: usize,
    max_digits: usize,
) -> Result<u32, DateResolutionError> {
    let trimmed = raw.trim();
    let width_ok = (min_digits..=max_digits).contains(&trimmed.len());
    if !width_ok || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateResolutionError::NonNumeric {
            component,
            value: raw.to_string(),
        });
    }
    trimmed
        .parse()
        .map_err(|_| DateResolutionError::NonNumeric {
            component,
            value: raw.to_string(),
        })
}
