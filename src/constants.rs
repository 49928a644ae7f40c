//! Application constants for the IMGW processor
//!
//! Status-code sentinels, literal missing-value magnitudes, canonical
//! column names and the region markers that mean "not assigned".

// =============================================================================
// Status Codes
// =============================================================================

/// Status code meaning "no measurement taken"
pub const STATUS_NOT_MEASURED: &str = "8";

/// Status code meaning "phenomenon did not occur"
pub const STATUS_PHENOMENON_ABSENT: &str = "9";

// =============================================================================
// Hydrological Literal Sentinels
// =============================================================================

/// Written in place of a water level when none was recorded (cm)
pub const HYDRO_MISSING_WATER_LEVEL: f64 = 9999.0;

/// Written in place of a flow when none was recorded (m3/s)
pub const HYDRO_MISSING_FLOW: f64 = 99999.999;

/// Written in place of a water temperature when none was recorded (C)
pub const HYDRO_MISSING_WATER_TEMPERATURE: f64 = 99.9;

/// Tolerance for comparing parsed values against literal sentinels
pub const SENTINEL_TOLERANCE: f64 = 1e-6;

// =============================================================================
// Canonical Column Names
// =============================================================================

pub mod columns {
    pub const DATE: &str = "date";
    pub const STATION_CODE: &str = "station_code";
    pub const STATION_NAME: &str = "station_name";
    pub const REGION: &str = "region";
    pub const RIVER_NAME: &str = "river_name";

    /// Join keys shared by every per-source table
    pub const KEYS: [&str; 2] = [DATE, STATION_CODE];
}

/// Days between 0001-01-01 (CE) and 1970-01-01, the polars Date epoch
pub const EPOCH_DAYS_FROM_CE: i32 = 719_163;

// =============================================================================
// Regions
// =============================================================================

/// Region values (lowercased) produced by geocoders when no county was found
pub const UNKNOWN_REGION_MARKERS: &[&str] = &[
    "nieznany",
    "błąd",
    "brak współrzędnych",
    "niezidentyfikowany_powiat",
    "nan",
];

/// Placeholder prefix used for stations that were never geocoded
pub const UNASSIGNED_REGION_PREFIX: &str = "brak_przypisanego_powiatu";

// =============================================================================
// Output
// =============================================================================

/// Missing share (percent) above which a column is considered sparse
pub const DEFAULT_SPARSE_COLUMN_THRESHOLD: f64 = 70.0;

pub mod outputs {
    pub const METEO_STATIONS: &str = "meteo_stations";
    pub const METEO_REGION_DAY: &str = "meteo_region_day";
    pub const HYDRO_STATIONS: &str = "hydro_stations";
    pub const HYDRO_REGION_DAY: &str = "hydro_region_day";
    pub const HYDRO_WARNINGS: &str = "hydro_warnings";
    pub const SOURCE_PREFIX: &str = "source_";
}
