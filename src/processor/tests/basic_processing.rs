//! Basic processing integration tests

use super::{BULLETIN, create_archive, write_file};
use crate::config::{OutputFormat, ProcessorConfig};
use crate::constants::outputs::{
    HYDRO_REGION_DAY, HYDRO_STATIONS, HYDRO_WARNINGS, METEO_REGION_DAY, METEO_STATIONS,
};
use crate::processor::DatasetProcessor;
use tempfile::TempDir;

fn full_config(fixture: &super::Fixture) -> ProcessorConfig {
    ProcessorConfig::default()
        .with_max_concurrent_files(2)
        .with_meteo_station_registry(fixture.meteo_registry.clone())
        .with_hydro_station_registry(fixture.hydro_registry.clone())
}

#[tokio::test]
async fn test_basic_processing_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_archive(&temp_dir);

    let mut processor = DatasetProcessor::new(fixture.archive.clone(), Some(fixture.output.clone()))
        .unwrap()
        .with_config(full_config(&fixture));

    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.files_failed, 0);
    assert!(stats.stage_failures.is_empty());
    assert_eq!(stats.output_path, fixture.output);

    // two station-days after the merge, one county-day
    assert_eq!(stats.rows_written[METEO_STATIONS], 2);
    assert_eq!(stats.rows_written[METEO_REGION_DAY], 1);
    assert_eq!(stats.rows_written[HYDRO_STATIONS], 2);
    assert_eq!(stats.rows_written[HYDRO_REGION_DAY], 2);
    assert!(!stats.rows_written.contains_key(HYDRO_WARNINGS));

    assert_eq!(stats.counters.duplicate_keys, 1);
    assert_eq!(stats.counters.unassigned_region, 0);

    for name in [METEO_STATIONS, METEO_REGION_DAY, HYDRO_STATIONS, HYDRO_REGION_DAY] {
        let path = fixture.output.join(format!("{}.csv", name));
        assert!(path.exists(), "{} was not written", path.display());
    }
}

#[tokio::test]
async fn test_outcomes_follow_discovery_order() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_archive(&temp_dir);

    let mut processor = DatasetProcessor::new(fixture.archive.clone(), Some(fixture.output.clone()))
        .unwrap()
        .with_config(full_config(&fixture));
    let stats = processor.process().await.unwrap();

    let paths: Vec<_> = stats.file_outcomes.iter().map(|o| o.path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert!(stats.file_outcomes.iter().all(|o| o.is_success()));
}

#[tokio::test]
async fn test_source_tables_as_parquet() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_archive(&temp_dir);

    let config = full_config(&fixture)
        .with_output_format(OutputFormat::Parquet)
        .with_source_tables();
    let mut processor = DatasetProcessor::new(fixture.archive.clone(), Some(fixture.output.clone()))
        .unwrap()
        .with_config(config);
    let stats = processor.process().await.unwrap();

    // the repeated k_d key is already gone from the per-source table
    assert_eq!(stats.rows_written["source_klimatKD"], 2);
    assert_eq!(stats.rows_written["source_synopSDT"], 1);
    assert_eq!(stats.rows_written["source_hydroDaily"], 2);
    assert!(fixture.output.join("source_klimatKD.parquet").exists());
    assert!(fixture.output.join("meteo_stations.parquet").exists());
}

#[tokio::test]
async fn test_warning_bulletins_table() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_archive(&temp_dir);
    write_file(
        &fixture.archive.join("ostrzezenia").join("OSTRZ_12.txt"),
        BULLETIN.as_bytes(),
    );

    let mut processor = DatasetProcessor::new(fixture.archive.clone(), Some(fixture.output.clone()))
        .unwrap()
        .with_config(full_config(&fixture));
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 4);
    assert_eq!(stats.rows_written[HYDRO_WARNINGS], 1);

    let text = std::fs::read_to_string(fixture.output.join("hydro_warnings.csv")).unwrap();
    assert!(text.starts_with("issued_on,issued_at,file_name,"));
    assert!(text.contains("2021-02-03,14:05,OSTRZ_12.txt,BPH w Krakowie,12/2021"));
}

#[tokio::test]
async fn test_empty_directory_returns_zero_stats() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("empty");
    std::fs::create_dir_all(&input).unwrap();

    let mut processor =
        DatasetProcessor::new(input, Some(temp_dir.path().join("output"))).unwrap();
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.total_rows(), 0);
    assert!(!temp_dir.path().join("output").exists());
}

#[tokio::test]
async fn test_sparse_columns_dropped_from_region_tables() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_archive(&temp_dir);

    let config = full_config(&fixture).with_sparse_column_threshold(None);
    let mut processor = DatasetProcessor::new(fixture.archive.clone(), Some(fixture.output.clone()))
        .unwrap()
        .with_config(config);
    processor.process().await.unwrap();

    let text = std::fs::read_to_string(fixture.output.join("meteo_region_day.csv")).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("date,region,"));
    assert!(header.contains("tmax_c"));
    // never reported by any fixture source
    assert!(!header.contains("sunshine_h"));
}
