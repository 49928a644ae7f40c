//! Station registry, coordinate conversion and region enrichment.
//!
//! Registries are `;`-delimited files with a header row. Regions come either
//! from the registry's `Powiat` column or from a [`RegionGeocoder`]
//! supplied by the caller; the crate performs no geocoding itself.

use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::columns::{DATE, REGION, RIVER_NAME, STATION_CODE, STATION_NAME};
use crate::constants::{UNASSIGNED_REGION_PREFIX, UNKNOWN_REGION_MARKERS};
use crate::error::{ImgwError, Result};
use crate::layout::TextEncoding;
use crate::models::Station;
use crate::parser::encoding::decode;
use crate::parser::status::parse_decimal;

/// UTF-8 first: Windows-1250 accepts almost any byte sequence and would
/// silently garble a UTF-8 registry.
const REGISTRY_ENCODINGS: &[TextEncoding] = &[
    TextEncoding::Utf8,
    TextEncoding::Windows1250,
    TextEncoding::Iso8859_2,
    TextEncoding::Latin1,
];

const REGISTRY_DELIMITER: u8 = b';';

const ID_HEADERS: &[&str] = &["id", "kodstacji", "kod"];
const NAME_HEADERS: &[&str] = &["nazwa", "nazwastacji"];
const RIVER_HEADERS: &[&str] = &["rzeka"];
const LATITUDE_HEADERS: &[&str] = &["szerokośćgeograficzna", "szerokosc", "latitude"];
const LONGITUDE_HEADERS: &[&str] = &["długośćgeograficzna", "dlugosc", "longitude"];
const ELEVATION_HEADERS: &[&str] = &["wysokośćnpm", "wysokosc", "elevation"];
const REGION_HEADERS: &[&str] = &["powiat", "region"];

/// Reverse geocoding collaborator: coordinates to a county name.
///
/// Returning `None` (or a geocoder sentinel such as "Nieznany") leaves the
/// station unassigned; its rows are then left out of region aggregation.
pub trait RegionGeocoder {
    fn region_for(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// Normalize a county name; `None` for blanks and "unknown" sentinels.
pub fn normalize_region(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let region = lowered
        .strip_prefix("powiat ")
        .unwrap_or(&lowered)
        .trim();

    if region.is_empty()
        || UNKNOWN_REGION_MARKERS.contains(&region)
        || region.starts_with(UNASSIGNED_REGION_PREFIX)
    {
        return None;
    }
    Some(region.to_string())
}

/// Convert coordinate text to decimal degrees.
///
/// One number is taken as decimal degrees; two are degrees and minutes;
/// three are degrees, minutes and seconds (`deg + min/60 + sec/3600`).
/// Separators may be spaces or the usual `° ' "` marks.
pub fn dms_to_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('-');
    let parts: Vec<f64> = trimmed
        .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .filter(|token| !token.is_empty())
        .map(parse_decimal)
        .collect::<Option<Vec<_>>>()?;

    let value = match parts.as_slice() {
        [degrees] => *degrees,
        [degrees, minutes] if *minutes < 60.0 => degrees + minutes / 60.0,
        [degrees, minutes, seconds] if *minutes < 60.0 && *seconds < 60.0 => {
            degrees + minutes / 60.0 + seconds / 3600.0
        }
        _ => return None,
    };

    if value > 180.0 {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn header_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_header(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| aliases.contains(&header.as_str()))
}

/// Stations keyed by code
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: BTreeMap<String, Station>,
}

impl StationRegistry {
    pub fn from_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        let mut registry = Self::default();
        for station in stations {
            registry.stations.entry(station.code.clone()).or_insert(station);
        }
        registry
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImgwError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::parse(path, &bytes)
    }

    /// Parse registry bytes, trying each encoding until the header has the
    /// required `ID` and `Nazwa` columns.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        for &encoding in REGISTRY_ENCODINGS {
            let Some(text) = decode(encoding, bytes) else {
                continue;
            };
            match Self::parse_text(&text) {
                Some(registry) => {
                    debug!(
                        "Loaded {} stations from {} ({})",
                        registry.len(),
                        path.display(),
                        encoding.name()
                    );
                    return Ok(registry);
                }
                None => debug!(
                    "{}: required columns not found with {}",
                    path.display(),
                    encoding.name()
                ),
            }
        }

        Err(ImgwError::StationRegistry {
            path: path.to_path_buf(),
            reason: "no encoding yields the required ID and Nazwa columns".to_string(),
        })
    }

    fn parse_text(text: &str) -> Option<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(REGISTRY_DELIMITER)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers().ok()?.iter().map(header_key).collect();
        let id = find_header(&headers, ID_HEADERS)?;
        let name = find_header(&headers, NAME_HEADERS)?;
        let river = find_header(&headers, RIVER_HEADERS);
        let latitude = find_header(&headers, LATITUDE_HEADERS);
        let longitude = find_header(&headers, LONGITUDE_HEADERS);
        let elevation = find_header(&headers, ELEVATION_HEADERS);
        let region = find_header(&headers, REGION_HEADERS);

        let mut stations = Vec::new();
        for row in reader.records().flatten() {
            let field = |position: Option<usize>| {
                position
                    .and_then(|p| row.get(p))
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
            };

            let Some(code) = field(Some(id)) else {
                continue;
            };

            stations.push(Station {
                code: code.to_string(),
                name: field(Some(name)).unwrap_or_default().to_string(),
                river: field(river).map(str::to_string),
                latitude: field(latitude).and_then(dms_to_decimal),
                longitude: field(longitude).and_then(dms_to_decimal),
                elevation: field(elevation).and_then(parse_decimal),
                region: field(region).and_then(normalize_region),
            });
        }

        Some(Self::from_stations(stations))
    }

    pub fn get(&self, code: &str) -> Option<&Station> {
        self.stations.get(code)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Fill missing regions from coordinates. Returns how many were assigned.
    pub fn assign_regions(&mut self, geocoder: &dyn RegionGeocoder) -> usize {
        let mut assigned = 0;
        for station in self.stations.values_mut() {
            if station.region.is_some() {
                continue;
            }
            let (Some(latitude), Some(longitude)) = (station.latitude, station.longitude) else {
                continue;
            };
            station.region = geocoder
                .region_for(latitude, longitude)
                .as_deref()
                .and_then(normalize_region);
            if station.region.is_some() {
                assigned += 1;
            }
        }
        assigned
    }
}

/// Per-station frame with registry attributes attached
#[derive(Debug)]
pub struct Enriched {
    pub frame: DataFrame,
    /// Distinct station codes absent from the registry
    pub unmatched_stations: usize,
}

fn optional_strings(frame: &DataFrame, name: &str) -> Result<Option<StringChunked>> {
    match frame.column(name) {
        Ok(column) => Ok(Some(column.cast(&DataType::String)?.str()?.clone())),
        Err(_) => Ok(None),
    }
}

/// Attach region, official name and river from the registry.
///
/// The official name replaces the source name when the registry has one.
/// Output columns: `date, station_code, station_name, region`, then
/// `river_name` when present, then the remaining columns in order.
pub fn enrich_with_stations(frame: &DataFrame, registry: &StationRegistry) -> Result<Enriched> {
    let codes = frame.column(STATION_CODE)?.str()?;
    let source_names = optional_strings(frame, STATION_NAME)?;
    let source_rivers = optional_strings(frame, RIVER_NAME)?;

    let mut names = Vec::with_capacity(frame.height());
    let mut regions = Vec::with_capacity(frame.height());
    let mut rivers = Vec::with_capacity(frame.height());
    let mut unmatched = HashSet::new();

    for (index, code) in codes.into_iter().enumerate() {
        let station = code.and_then(|code| registry.get(code));
        if station.is_none() {
            if let Some(code) = code {
                unmatched.insert(code.to_string());
            }
        }

        let source_name = source_names.as_ref().and_then(|names| names.get(index));
        names.push(
            station
                .map(|s| s.name.as_str())
                .filter(|name| !name.is_empty())
                .or(source_name)
                .map(str::to_string),
        );
        regions.push(station.and_then(|s| s.region.clone()));

        let source_river = source_rivers.as_ref().and_then(|rivers| rivers.get(index));
        rivers.push(
            station
                .and_then(|s| s.river.as_deref())
                .or(source_river)
                .map(str::to_string),
        );
    }

    if !unmatched.is_empty() {
        warn!(
            "{} stations are not in the registry and get no region",
            unmatched.len()
        );
    }

    let mut enriched = frame.clone();
    enriched.with_column(Column::new(STATION_NAME.into(), names))?;
    enriched.with_column(Column::new(REGION.into(), regions))?;
    if source_rivers.is_some() {
        enriched.with_column(Column::new(RIVER_NAME.into(), rivers))?;
    }

    let mut order = vec![DATE, STATION_CODE, STATION_NAME, REGION];
    if source_rivers.is_some() {
        order.push(RIVER_NAME);
    }
    let rest: Vec<String> = enriched
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| !order.contains(&name.as_str()))
        .collect();
    let ordered: Vec<String> = order
        .iter()
        .map(|name| name.to_string())
        .chain(rest)
        .collect();

    Ok(Enriched {
        frame: enriched.select(ordered)?,
        unmatched_stations: unmatched.len(),
    })
}
