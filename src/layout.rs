//! Layout registry for IMGW archive formats.
//!
//! Every supported file family is described here as immutable data: the
//! ordered column list, accepted delimiters, the encodings to try and the
//! status-code semantics of each column. Parsing code never branches on a
//! specific format; adding a format means adding a [`Layout`] entry.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::constants::{
    HYDRO_MISSING_FLOW, HYDRO_MISSING_WATER_LEVEL, HYDRO_MISSING_WATER_TEMPERATURE,
    STATUS_NOT_MEASURED, STATUS_PHENOMENON_ABSENT,
};

/// Known IMGW source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceFormat {
    HydroWarning,
    HydroDaily,
    ClimateDaily,
    ClimateDailyTerm,
    PrecipitationDaily,
    SynopDaily,
    SynopDailyTerm,
}

/// Which pipeline a format feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Hydro,
    Meteo,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 7] = [
        SourceFormat::HydroWarning,
        SourceFormat::HydroDaily,
        SourceFormat::ClimateDaily,
        SourceFormat::ClimateDailyTerm,
        SourceFormat::PrecipitationDaily,
        SourceFormat::SynopDaily,
        SourceFormat::SynopDailyTerm,
    ];

    /// Merge order for meteorological sources; the first one keeps its
    /// column names unsuffixed.
    pub const METEO_MERGE_ORDER: [SourceFormat; 5] = [
        SourceFormat::ClimateDaily,
        SourceFormat::ClimateDailyTerm,
        SourceFormat::PrecipitationDaily,
        SourceFormat::SynopDaily,
        SourceFormat::SynopDailyTerm,
    ];

    /// Source label, used as the column suffix after merging
    pub fn label(&self) -> &'static str {
        match self {
            SourceFormat::HydroWarning => "hydroWarning",
            SourceFormat::HydroDaily => "hydroDaily",
            SourceFormat::ClimateDaily => "klimatKD",
            SourceFormat::ClimateDailyTerm => "klimatKDT",
            SourceFormat::PrecipitationDaily => "opadOD",
            SourceFormat::SynopDaily => "synopSD",
            SourceFormat::SynopDailyTerm => "synopSDT",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            SourceFormat::HydroWarning | SourceFormat::HydroDaily => Domain::Hydro,
            _ => Domain::Meteo,
        }
    }

    pub fn layout(&self) -> &'static Layout {
        match self {
            SourceFormat::HydroWarning => &HYDRO_WARNING,
            SourceFormat::HydroDaily => &HYDRO_DAILY,
            SourceFormat::ClimateDaily => &CLIMATE_DAILY,
            SourceFormat::ClimateDailyTerm => &CLIMATE_DAILY_TERM,
            SourceFormat::PrecipitationDaily => &PRECIPITATION_DAILY,
            SourceFormat::SynopDaily => &SYNOP_DAILY,
            SourceFormat::SynopDailyTerm => &SYNOP_DAILY_TERM,
        }
    }

    /// Detect the format from a file name pattern
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|format| format.layout().matches_file_name(name))
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Text encodings seen in IMGW archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Windows1250,
    Iso8859_2,
    Latin1,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1250 => "cp1250",
            TextEncoding::Iso8859_2 => "iso-8859-2",
            TextEncoding::Latin1 => "latin1",
        }
    }
}

/// How a measurement behaves when its status says the phenomenon was absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityKind {
    /// Temperatures, pressures, humidity: absence has no numeric meaning
    Continuous,
    /// Sums, depths, hour counts, cloud eighths: absence is zero
    Additive,
    /// 0/1 occurrence flags
    Occurrence,
}

impl QuantityKind {
    pub fn absence_is_zero(&self) -> bool {
        matches!(self, QuantityKind::Additive | QuantityKind::Occurrence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    HydroYear,
    /// Month index within the hydrological year; superseded by the calendar month
    HydroMonthIndex,
    CalendarMonth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRole {
    StationCode,
    StationName,
    Date(DatePart),
    Measurement {
        kind: QuantityKind,
        literal_missing: Option<f64>,
    },
    /// Textual code; trimmed, never coerced to a number
    Code,
    /// Free text carried through unchanged (river names)
    Text,
    /// Companion status of another field
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    /// Name of the companion status field, if any
    pub status: Option<&'static str>,
}

impl FieldSpec {
    /// Whether the field becomes a column of the per-source table
    pub fn is_output(&self) -> bool {
        matches!(
            self.role,
            FieldRole::Measurement { .. } | FieldRole::Code | FieldRole::Text
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Headerless delimited daily observations
    Delimited,
    /// Free-text warning bulletin, one record per file
    Bulletin,
}

#[derive(Debug)]
pub struct Layout {
    pub format: SourceFormat,
    pub kind: LayoutKind,
    pub file_pattern: &'static str,
    pub delimiters: &'static [u8],
    pub encodings: &'static [TextEncoding],
    pub fields: &'static [FieldSpec],
}

impl Layout {
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Fields that survive into the per-source table, in declared order
    pub fn output_fields(&self) -> impl Iterator<Item = &'static FieldSpec> + use<> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().filter(|field| field.is_output())
    }

    pub fn output_field_count(&self) -> usize {
        self.output_fields().count()
    }

    pub fn matches_file_name(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };
        Pattern::new(self.file_pattern)
            .map(|pattern| pattern.matches_with(name, options))
            .unwrap_or(false)
    }
}

/// Look up the quantity kind of a measurement column in any meteorological layout
pub fn quantity_kind(column: &str) -> Option<QuantityKind> {
    SourceFormat::METEO_MERGE_ORDER
        .iter()
        .flat_map(|format| format.layout().fields.iter())
        .find_map(|field| match field.role {
            FieldRole::Measurement { kind, .. } if field.name == column => Some(kind),
            _ => None,
        })
}

// =============================================================================
// Status Rules
// =============================================================================

/// Which fields a status rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    AnyMeasurement,
    AbsenceIsZero,
    Continuous,
    Code,
}

impl RuleTarget {
    pub fn applies_to(&self, role: &FieldRole) -> bool {
        match (self, role) {
            (RuleTarget::AnyMeasurement, FieldRole::Measurement { .. }) => true,
            (RuleTarget::AbsenceIsZero, FieldRole::Measurement { kind, .. }) => {
                kind.absence_is_zero()
            }
            (RuleTarget::Continuous, FieldRole::Measurement { kind, .. }) => {
                *kind == QuantityKind::Continuous
            }
            (RuleTarget::Code, FieldRole::Code) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    ForceMissing,
    ForceZero,
    /// Keep the parsed value and count it for manual review
    KeepAndFlag,
    ClearCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub sentinel: &'static str,
    pub target: RuleTarget,
    pub action: StatusAction,
}

/// Evaluated in order; the first matching rule wins.
pub const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        sentinel: STATUS_NOT_MEASURED,
        target: RuleTarget::AnyMeasurement,
        action: StatusAction::ForceMissing,
    },
    StatusRule {
        sentinel: STATUS_PHENOMENON_ABSENT,
        target: RuleTarget::AbsenceIsZero,
        action: StatusAction::ForceZero,
    },
    StatusRule {
        sentinel: STATUS_PHENOMENON_ABSENT,
        target: RuleTarget::Continuous,
        action: StatusAction::KeepAndFlag,
    },
    StatusRule {
        sentinel: STATUS_NOT_MEASURED,
        target: RuleTarget::Code,
        action: StatusAction::ClearCode,
    },
    StatusRule {
        sentinel: STATUS_PHENOMENON_ABSENT,
        target: RuleTarget::Code,
        action: StatusAction::ClearCode,
    },
];

/// First status rule matching a field role and a trimmed status value
pub fn rule_for(role: &FieldRole, status: &str) -> Option<&'static StatusRule> {
    STATUS_RULES
        .iter()
        .find(|rule| rule.sentinel == status && rule.target.applies_to(role))
}

// =============================================================================
// Field Constructors
// =============================================================================

const fn key(name: &'static str, role: FieldRole) -> FieldSpec {
    FieldSpec {
        name,
        role,
        status: None,
    }
}

const fn date(name: &'static str, part: DatePart) -> FieldSpec {
    key(name, FieldRole::Date(part))
}

const fn measured(name: &'static str, kind: QuantityKind, status: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        role: FieldRole::Measurement {
            kind,
            literal_missing: None,
        },
        status: Some(status),
    }
}

const fn sentinel_valued(name: &'static str, literal_missing: f64) -> FieldSpec {
    FieldSpec {
        name,
        role: FieldRole::Measurement {
            kind: QuantityKind::Continuous,
            literal_missing: Some(literal_missing),
        },
        status: None,
    }
}

const fn status(name: &'static str) -> FieldSpec {
    key(name, FieldRole::Status)
}

const fn code(name: &'static str, status: Option<&'static str>) -> FieldSpec {
    FieldSpec {
        name,
        role: FieldRole::Code,
        status,
    }
}

const fn text(name: &'static str) -> FieldSpec {
    key(name, FieldRole::Text)
}

use DatePart::{CalendarMonth, Day, HydroMonthIndex, HydroYear, Month, Year};
use QuantityKind::{Additive, Continuous, Occurrence};

const STATION_CODE: FieldSpec = key("station_code", FieldRole::StationCode);
const STATION_NAME: FieldSpec = key("station_name", FieldRole::StationName);
const YEAR: FieldSpec = date("year", Year);
const MONTH: FieldSpec = date("month", Month);
const DAY: FieldSpec = date("day", Day);

const HYDRO_ENCODINGS: &[TextEncoding] = &[
    TextEncoding::Utf8,
    TextEncoding::Windows1250,
    TextEncoding::Iso8859_2,
    TextEncoding::Latin1,
];

const METEO_ENCODINGS: &[TextEncoding] = &[
    TextEncoding::Windows1250,
    TextEncoding::Utf8,
    TextEncoding::Iso8859_2,
    TextEncoding::Latin1,
];

// =============================================================================
// Layouts
// =============================================================================

pub static HYDRO_WARNING: Layout = Layout {
    format: SourceFormat::HydroWarning,
    kind: LayoutKind::Bulletin,
    file_pattern: "*.txt",
    delimiters: &[],
    encodings: &[TextEncoding::Utf8, TextEncoding::Windows1250],
    fields: &[
        text("file_name"),
        text("issued_on"),
        text("issued_at"),
        text("office"),
        text("bulletin_number"),
        text("phenomenon"),
        text("warning_level"),
        text("valid_from_date"),
        text("valid_from_time"),
        text("valid_to_date"),
        text("valid_to_time"),
        text("area"),
        text("probability_pct"),
        text("hydrologist"),
    ],
};

pub static HYDRO_DAILY: Layout = Layout {
    format: SourceFormat::HydroDaily,
    kind: LayoutKind::Delimited,
    file_pattern: "codz_*.csv",
    delimiters: b";,",
    encodings: HYDRO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        text("river_name"),
        date("hydro_year", HydroYear),
        date("hydro_month_index", HydroMonthIndex),
        DAY,
        sentinel_valued("water_level_cm", HYDRO_MISSING_WATER_LEVEL),
        sentinel_valued("flow_m3s", HYDRO_MISSING_FLOW),
        sentinel_valued("water_temp_c", HYDRO_MISSING_WATER_TEMPERATURE),
        date("calendar_month", CalendarMonth),
    ],
};

pub static CLIMATE_DAILY: Layout = Layout {
    format: SourceFormat::ClimateDaily,
    kind: LayoutKind::Delimited,
    file_pattern: "k_d_[0-9]*.csv",
    delimiters: b",",
    encodings: METEO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        YEAR,
        MONTH,
        DAY,
        measured("tmax_c", Continuous, "status_tmax_c"),
        status("status_tmax_c"),
        measured("tmin_c", Continuous, "status_tmin_c"),
        status("status_tmin_c"),
        measured("tavg_c", Continuous, "status_tavg_c"),
        status("status_tavg_c"),
        measured("tmin_ground_c", Continuous, "status_tmin_ground_c"),
        status("status_tmin_ground_c"),
        measured("precip_sum_mm", Additive, "status_precip_sum_mm"),
        status("status_precip_sum_mm"),
        code("precip_kind", None),
        measured("snow_depth_cm", Additive, "status_snow_depth_cm"),
        status("status_snow_depth_cm"),
    ],
};

pub static CLIMATE_DAILY_TERM: Layout = Layout {
    format: SourceFormat::ClimateDailyTerm,
    kind: LayoutKind::Delimited,
    file_pattern: "k_d_t_*.csv",
    delimiters: b",",
    encodings: METEO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        YEAR,
        MONTH,
        DAY,
        measured("tavg_c", Continuous, "status_tavg_c"),
        status("status_tavg_c"),
        measured("humidity_pct", Continuous, "status_humidity_pct"),
        status("status_humidity_pct"),
        measured("wind_speed_ms", Additive, "status_wind_speed_ms"),
        status("status_wind_speed_ms"),
        measured("cloud_cover_okta", Additive, "status_cloud_cover_okta"),
        status("status_cloud_cover_okta"),
    ],
};

pub static PRECIPITATION_DAILY: Layout = Layout {
    format: SourceFormat::PrecipitationDaily,
    kind: LayoutKind::Delimited,
    file_pattern: "o_d_*.csv",
    delimiters: b",",
    encodings: METEO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        YEAR,
        MONTH,
        DAY,
        measured("precip_sum_mm", Additive, "status_precip_sum_mm"),
        status("status_precip_sum_mm"),
        code("precip_kind", None),
        measured("snow_depth_cm", Additive, "status_snow_depth_cm"),
        status("status_snow_depth_cm"),
        measured("fresh_snow_cm", Additive, "status_fresh_snow_cm"),
        status("status_fresh_snow_cm"),
        code("snow_kind_code", Some("status_snow_kind_code")),
        status("status_snow_kind_code"),
        code("snow_cover_kind_code", Some("status_snow_cover_kind_code")),
        status("status_snow_cover_kind_code"),
    ],
};

pub static SYNOP_DAILY: Layout = Layout {
    format: SourceFormat::SynopDaily,
    kind: LayoutKind::Delimited,
    file_pattern: "s_d_[0-9]*.csv",
    delimiters: b",",
    encodings: METEO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        YEAR,
        MONTH,
        DAY,
        measured("tmax_c", Continuous, "status_tmax_c"),
        status("status_tmax_c"),
        measured("tmin_c", Continuous, "status_tmin_c"),
        status("status_tmin_c"),
        measured("tavg_c", Continuous, "status_tavg_c"),
        status("status_tavg_c"),
        measured("tmin_ground_c", Continuous, "status_tmin_ground_c"),
        status("status_tmin_ground_c"),
        measured("precip_sum_mm", Additive, "status_precip_sum_mm"),
        status("status_precip_sum_mm"),
        code("precip_kind", None),
        measured("snow_depth_cm", Additive, "status_snow_depth_cm"),
        status("status_snow_depth_cm"),
        measured("snow_water_equiv_mm", Additive, "status_snow_water_equiv_mm"),
        status("status_snow_water_equiv_mm"),
        measured("sunshine_h", Additive, "status_sunshine_h"),
        status("status_sunshine_h"),
        measured("rain_duration_h", Additive, "status_rain_duration_h"),
        status("status_rain_duration_h"),
        measured("snow_duration_h", Additive, "status_snow_duration_h"),
        status("status_snow_duration_h"),
        measured("sleet_duration_h", Additive, "status_sleet_duration_h"),
        status("status_sleet_duration_h"),
        measured("hail_duration_h", Additive, "status_hail_duration_h"),
        status("status_hail_duration_h"),
        measured("fog_duration_h", Additive, "status_fog_duration_h"),
        status("status_fog_duration_h"),
        measured("mist_duration_h", Additive, "status_mist_duration_h"),
        status("status_mist_duration_h"),
        measured("rime_duration_h", Additive, "status_rime_duration_h"),
        status("status_rime_duration_h"),
        measured("glaze_duration_h", Additive, "status_glaze_duration_h"),
        status("status_glaze_duration_h"),
        measured("low_drift_duration_h", Additive, "status_low_drift_duration_h"),
        status("status_low_drift_duration_h"),
        measured("high_drift_duration_h", Additive, "status_high_drift_duration_h"),
        status("status_high_drift_duration_h"),
        measured("haze_duration_h", Additive, "status_haze_duration_h"),
        status("status_haze_duration_h"),
        measured("wind_ge10_duration_h", Additive, "status_wind_ge10_duration_h"),
        status("status_wind_ge10_duration_h"),
        measured("wind_gt15_duration_h", Additive, "status_wind_gt15_duration_h"),
        status("status_wind_gt15_duration_h"),
        measured("thunder_duration_h", Additive, "status_thunder_duration_h"),
        status("status_thunder_duration_h"),
        measured("dew_duration_h", Additive, "status_dew_duration_h"),
        status("status_dew_duration_h"),
        measured("hoarfrost_duration_h", Additive, "status_hoarfrost_duration_h"),
        status("status_hoarfrost_duration_h"),
        measured("snow_cover_flag", Occurrence, "status_snow_cover_flag"),
        status("status_snow_cover_flag"),
        measured("lightning_flag", Occurrence, "status_lightning_flag"),
        status("status_lightning_flag"),
        code("ground_state", None),
        measured("isotherm_lower_cm", Continuous, "status_isotherm_lower_cm"),
        status("status_isotherm_lower_cm"),
        measured("isotherm_upper_cm", Continuous, "status_isotherm_upper_cm"),
        status("status_isotherm_upper_cm"),
        measured("actinometry_jcm2", Continuous, "status_actinometry_jcm2"),
        status("status_actinometry_jcm2"),
    ],
};

pub static SYNOP_DAILY_TERM: Layout = Layout {
    format: SourceFormat::SynopDailyTerm,
    kind: LayoutKind::Delimited,
    file_pattern: "s_d_t_*.csv",
    delimiters: b",",
    encodings: METEO_ENCODINGS,
    fields: &[
        STATION_CODE,
        STATION_NAME,
        YEAR,
        MONTH,
        DAY,
        measured("cloud_cover_okta", Additive, "status_cloud_cover_okta"),
        status("status_cloud_cover_okta"),
        measured("wind_speed_ms", Additive, "status_wind_speed_ms"),
        status("status_wind_speed_ms"),
        measured("tavg_c", Continuous, "status_tavg_c"),
        status("status_tavg_c"),
        measured("vapour_pressure_hpa", Continuous, "status_vapour_pressure_hpa"),
        status("status_vapour_pressure_hpa"),
        measured("humidity_pct", Continuous, "status_humidity_pct"),
        status("status_humidity_pct"),
        measured("station_pressure_hpa", Continuous, "status_station_pressure_hpa"),
        status("status_station_pressure_hpa"),
        measured("sea_pressure_hpa", Continuous, "status_sea_pressure_hpa"),
        status("status_sea_pressure_hpa"),
        measured("precip_day_mm", Additive, "status_precip_day_mm"),
        status("status_precip_day_mm"),
        measured("precip_night_mm", Additive, "status_precip_night_mm"),
        status("status_precip_night_mm"),
    ],
};
