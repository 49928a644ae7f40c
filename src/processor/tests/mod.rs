//! Integration tests for the processor module
//!
//! Tests the complete processing pipeline on small IMGW-like archive trees.

pub mod basic_processing;

use crate::processor::writer::read_table;
use polars::prelude::{DataFrame, DataType, Field, Schema};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// k_d: two stations in the same county, one of them twice on the same day
pub const CLIMATE_DAILY: &str = "\
\"249180010\",\"PSZCZYNA\",\"2020\",\"01\",\"15\",\"5.0\",\"\",\"-1.3\",\"\",\"2.0\",\"\",\"-3.1\",\"\",\"1.4\",\"\",\"W\",\"\",\"9\"
\"249190020\",\"BIELSKO\",\"2020\",\"01\",\"15\",\"7.0\",\"\",\"0.5\",\"\",\"3.0\",\"\",\"-1.0\",\"\",\"\",\"8\",\"\",\"0\",\"\"
\"249190020\",\"BIELSKO\",\"2020\",\"01\",\"15\",\"9.9\",\"\",\"9.9\",\"\",\"9.9\",\"\",\"9.9\",\"\",\"9.9\",\"\",\"\",\"0\",\"\"
";

/// s_d_t: the same day for the first station only
pub const SYNOP_DAILY_TERM: &str = "\
\"249180010\",\"PSZCZYNA\",\"2020\",\"01\",\"15\",\"6.1\",\"\",\"3.2\",\"\",\"2.4\",\"\",\"6.5\",\"\",\"84.0\",\"\",\"990.1\",\"\",\"1020.3\",\"\",\"0.8\",\"\",\"0.6\",\"\"
";

/// codz: hydrological year 2020, December, with a missing water temperature
pub const HYDRO_DAILY: &str = "\
150190340;GOCZAŁKOWICE;Wisła;2020;2;15;245;12.345;99.9;12
150190340;GOCZAŁKOWICE;Wisła;2020;6;1;251;13.100;8.5;4
";

pub const METEO_REGISTRY: &str = "\
LP.;ID;Nazwa;Rzeka;Szerokość geograficzna;Długość geograficzna;Wysokość npm;Powiat
1;249180010;PSZCZYNA;;49 58 38;18 56 41;253;Powiat Pszczyński
2;249190020;BIELSKO-BIAŁA;;49 48 25;19 0 2;398;pszczyński
";

pub const HYDRO_REGISTRY: &str = "\
LP.;ID;Nazwa;Rzeka;Szerokość geograficzna;Długość geograficzna;Wysokość npm;Powiat
1;150190340;GOCZAŁKOWICE;Wisła;49 56 0;18 58 0;255;pszczyński
";

pub const BULLETIN: &str = "\
Nazwa biura prognoz hydrologicznych: BPH w Krakowie
INFORMACJA O NIEBEZPIECZNYM ZJAWISKU Nr 12/2021
Data i godzina wydania: 03.02.2021 - godz. 14:05
Zjawisko: Wezbranie z przekroczeniem stanów ostrzegawczych
Stopień zagrożenia: 1
";

/// Archive layout under `<tmp>/archive`, registries under `<tmp>/registry`
pub struct Fixture {
    pub archive: PathBuf,
    pub output: PathBuf,
    pub meteo_registry: PathBuf,
    pub hydro_registry: PathBuf,
}

pub fn write_file(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub fn create_archive(temp_dir: &TempDir) -> Fixture {
    let archive = temp_dir.path().join("archive");
    let registry = temp_dir.path().join("registry");

    let (cp1250, _, _) = encoding_rs::WINDOWS_1250.encode(CLIMATE_DAILY);
    write_file(&archive.join("meteo").join("k_d_01_2020.csv"), &cp1250);
    write_file(
        &archive.join("meteo").join("s_d_t_01_2020.csv"),
        SYNOP_DAILY_TERM.as_bytes(),
    );
    write_file(
        &archive.join("hydro").join("codz_2020_02.csv"),
        HYDRO_DAILY.as_bytes(),
    );

    let fixture = Fixture {
        archive,
        output: temp_dir.path().join("output"),
        meteo_registry: registry.join("meteo_stations.csv"),
        hydro_registry: registry.join("hydro_stations.csv"),
    };
    write_file(&fixture.meteo_registry, METEO_REGISTRY.as_bytes());
    write_file(&fixture.hydro_registry, HYDRO_REGISTRY.as_bytes());
    fixture
}

/// Read a written CSV table, typing the listed columns explicitly
pub fn read_csv(path: &Path, typed: &[(&str, DataType)]) -> DataFrame {
    let schema: Schema = typed
        .iter()
        .map(|(name, dtype)| Field::new((*name).into(), dtype.clone()))
        .collect();
    read_table(path, Some(Arc::new(schema))).unwrap()
}
