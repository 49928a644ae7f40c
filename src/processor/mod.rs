//! Main processing engine with modular architecture.
//!
//! Orchestrates the complete IMGW archive workflow: file discovery,
//! concurrent parsing, per-source normalization, multi-source merge,
//! priority resolution, station enrichment and region aggregation. Every
//! stage table is written through one [`TableWriter`].

pub mod accumulator;
pub mod batch;
pub mod discovery;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::accumulator::{Accumulated, Accumulator};
use self::batch::parse_files;
use self::discovery::FileDiscovery;
use self::writer::TableWriter;

use crate::aggregate::{AggregationPolicy, aggregate_by_region, drop_sparse_columns};
use crate::config::ProcessorConfig;
use crate::constants::columns::{DATE, REGION};
use crate::constants::outputs::{
    HYDRO_REGION_DAY, HYDRO_STATIONS, HYDRO_WARNINGS, METEO_REGION_DAY, METEO_STATIONS,
    SOURCE_PREFIX,
};
use crate::error::{ImgwError, Result};
use crate::layout::{Domain, SourceFormat};
use crate::merge::{SourceTable, merge_sources};
use crate::models::{ProcessingStats, RowCounters};
use crate::parser::bulletin::BulletinParser;
use crate::priority::{PriorityTable, resolve_priorities};
use crate::stations::{RegionGeocoder, StationRegistry, enrich_with_stations};
use crate::table::{deduplicate, observations_to_frame, warnings_to_frame};

use colored::*;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, warn};

/// Default output directory name, created next to the input directory
const DEFAULT_OUTPUT_DIR: &str = "imgw_processed";

/// One domain's share of the pipeline: merge, resolve, enrich, aggregate
struct DomainRun<'a> {
    name: &'static str,
    sources: Vec<SourceTable>,
    priorities: &'a PriorityTable,
    policies: &'a [AggregationPolicy],
    registry: Option<&'a Path>,
    stations_table: &'static str,
    region_table: &'static str,
}

/// Main processor for IMGW archive conversion
pub struct DatasetProcessor {
    input_path: PathBuf,
    output_path: PathBuf,
    config: ProcessorConfig,
    geocoder: Option<Box<dyn RegionGeocoder + Send + Sync>>,
}

impl DatasetProcessor {
    /// Create a new processor; output defaults to `imgw_processed` next to
    /// the input directory
    pub fn new(input_path: PathBuf, output_path: Option<PathBuf>) -> Result<Self> {
        if !input_path.exists() {
            return Err(ImgwError::MissingInput { path: input_path });
        }

        let output_path = output_path.unwrap_or_else(|| {
            input_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_DIR)
        });

        Ok(Self {
            input_path,
            output_path,
            config: ProcessorConfig::default(),
            geocoder: None,
        })
    }

    /// Configure the processor
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Fill regions missing from the station registries by coordinates
    pub fn with_geocoder(mut self, geocoder: Box<dyn RegionGeocoder + Send + Sync>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Main processing entry point
    pub async fn process(&mut self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        self.config.validate()?;

        println!("{}", "Starting IMGW archive processing".bright_green().bold());
        println!("  {} {}", "Input:".bright_cyan(), self.input_path.display());
        println!("  {} {}", "Output:".bright_cyan(), self.output_path.display());

        let mut stats = ProcessingStats {
            output_path: self.output_path.clone(),
            ..ProcessingStats::default()
        };

        // Step 1: Discover archive files
        println!("\n{}", "Discovering archive files...".bright_yellow());
        let files = self.discovery().discover_files().await?;
        let unnamed = files.iter().filter(|f| f.format.is_none()).count();
        println!(
            "  {} {} files ({} with unrecognized names)",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold(),
            unnamed
        );

        if files.is_empty() {
            warn!("No archive files found in {}", self.input_path.display());
            stats.processing_time_ms = start_time.elapsed().as_millis();
            return Ok(stats);
        }

        // Step 2: Parse files concurrently, fold in discovery order
        println!("\n{}", "Parsing files...".bright_yellow());
        let bulletins = Arc::new(BulletinParser::new()?);
        let results = parse_files(&files, self.config.max_concurrent_files, bulletins).await;

        let mut accumulator = Accumulator::new();
        for (file, result) in files.iter().zip(results) {
            accumulator.add(file.path.clone(), file.format, result);
        }

        stats.files_processed = accumulator.files_processed();
        stats.files_failed = accumulator.files_failed();
        if stats.files_processed == 0 {
            return Err(ImgwError::NoFilesParsed {
                failed: stats.files_failed,
            });
        }

        let Accumulated {
            observations,
            warnings,
            outcomes,
            mut counters,
        } = accumulator.finish();
        stats.file_outcomes = outcomes;

        fs::create_dir_all(&self.output_path).await?;
        let writer = TableWriter::new(
            self.output_path.clone(),
            self.config.output_format,
            self.config.compression,
        );

        // Step 3: Normalize each source into its own table
        println!("\n{}", "Normalizing sources...".bright_yellow());
        let mut meteo = Vec::new();
        let mut hydro = Vec::new();

        for (source, records) in observations {
            let (records, removed) = deduplicate(records);
            if removed > 0 {
                warn!("{}: dropped {} repeated (date, station) keys", source, removed);
            }
            counters.duplicate_keys += removed;

            let frame = observations_to_frame(source.layout(), &records)?;
            println!(
                "  {} {} rows",
                format!("{}:", source).bright_cyan(),
                frame.height().to_string().bright_white()
            );

            if self.config.write_source_tables {
                let name = format!("{}{}", SOURCE_PREFIX, source.label());
                let rows = writer.write(&name, frame.clone()).await?;
                stats.rows_written.insert(name, rows);
            }

            match source.domain() {
                Domain::Meteo => meteo.push((source, SourceTable::new(source.label(), frame))),
                Domain::Hydro => hydro.push(SourceTable::new(source.label(), frame)),
            }
        }

        meteo.sort_by_key(|(source, _)| {
            SourceFormat::METEO_MERGE_ORDER
                .iter()
                .position(|ordered| ordered == source)
        });

        // Step 4: Merge, resolve, enrich and aggregate per domain
        let runs = [
            DomainRun {
                name: "meteorological",
                sources: meteo.into_iter().map(|(_, table)| table).collect(),
                priorities: &self.config.meteo_priorities,
                policies: &self.config.meteo_aggregation,
                registry: self.config.meteo_station_registry.as_deref(),
                stations_table: METEO_STATIONS,
                region_table: METEO_REGION_DAY,
            },
            DomainRun {
                name: "hydrological",
                sources: hydro,
                priorities: &self.config.hydro_priorities,
                policies: &self.config.hydro_aggregation,
                registry: self.config.hydro_station_registry.as_deref(),
                stations_table: HYDRO_STATIONS,
                region_table: HYDRO_REGION_DAY,
            },
        ];

        for run in runs {
            if run.sources.is_empty() {
                debug!("No {} sources parsed, skipping that domain", run.name);
                continue;
            }
            println!(
                "\n{}",
                format!("Building {} tables...", run.name).bright_yellow()
            );
            self.run_domain(run, &writer, &mut stats, &mut counters)
                .await?;
        }

        // Step 5: Warning bulletins
        if !warnings.is_empty() {
            let mut warnings = warnings;
            warnings.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            let rows = writer
                .write(HYDRO_WARNINGS, warnings_to_frame(&warnings)?)
                .await?;
            stats.rows_written.insert(HYDRO_WARNINGS.to_string(), rows);
        }

        stats.counters = counters;
        stats.processing_time_ms = start_time.elapsed().as_millis();
        self.print_summary(&stats);

        Ok(stats)
    }

    fn discovery(&self) -> FileDiscovery {
        let registries = [
            &self.config.meteo_station_registry,
            &self.config.hydro_station_registry,
        ];
        registries
            .into_iter()
            .flatten()
            .fold(
                FileDiscovery::new(self.input_path.clone()).exclude(self.output_path.clone()),
                |discovery, registry| discovery.exclude(registry.clone()),
            )
    }

    /// Load a registry; a failure disables the dependent stages only
    fn load_registry(&self, run: &DomainRun<'_>, stats: &mut ProcessingStats) -> Option<StationRegistry> {
        let Some(path) = run.registry else {
            stats.stage_failures.push(format!(
                "{}: no station registry configured, enrichment and aggregation skipped",
                run.name
            ));
            return None;
        };

        match StationRegistry::from_path(path) {
            Ok(mut registry) => {
                if let Some(geocoder) = &self.geocoder {
                    let assigned = registry.assign_regions(geocoder.as_ref());
                    debug!("Geocoded regions for {} {} stations", assigned, run.name);
                }
                Some(registry)
            }
            Err(e) => {
                warn!("Station registry {} unusable: {:#}", path.display(), e);
                stats.stage_failures.push(format!(
                    "{}: {}, enrichment and aggregation skipped",
                    run.name, e
                ));
                None
            }
        }
    }

    async fn run_domain(
        &self,
        run: DomainRun<'_>,
        writer: &TableWriter,
        stats: &mut ProcessingStats,
        counters: &mut RowCounters,
    ) -> Result<()> {
        let registry = self.load_registry(&run, stats);

        let merged = merge_sources(run.sources)?;
        counters.missing_date_at_merge += merged.dropped_missing_date;
        let canonical = resolve_priorities(&merged, run.priorities)?;

        let Some(registry) = registry else {
            self.write(writer, run.stations_table, canonical, stats).await?;
            return Ok(());
        };

        let enriched = enrich_with_stations(&canonical, &registry)?;
        if enriched.unmatched_stations > 0 {
            println!(
                "  {} {} stations missing from the registry",
                "Unmatched:".bright_red(),
                enriched.unmatched_stations
            );
        }
        self.write(writer, run.stations_table, enriched.frame.clone(), stats)
            .await?;

        let aggregate = aggregate_by_region(&enriched.frame, run.policies)?;
        counters.unassigned_region += aggregate.excluded_rows;

        let mut frame = aggregate.frame;
        if let Some(threshold) = self.config.sparse_column_threshold {
            let (reduced, dropped) = drop_sparse_columns(&frame, threshold, &[DATE, REGION])?;
            if !dropped.is_empty() {
                println!(
                    "  {} {} sparse columns (> {}% missing)",
                    "Dropped".bright_cyan(),
                    dropped.len(),
                    threshold
                );
            }
            frame = reduced;
        }
        self.write(writer, run.region_table, frame, stats).await
    }

    async fn write(
        &self,
        writer: &TableWriter,
        name: &str,
        frame: DataFrame,
        stats: &mut ProcessingStats,
    ) -> Result<()> {
        let rows = writer.write(name, frame).await?;
        println!(
            "  {} {} ({} rows)",
            "Wrote".bright_green(),
            writer.path_for(name).display(),
            rows
        );
        stats.rows_written.insert(name.to_string(), rows);
        Ok(())
    }

    fn print_summary(&self, stats: &ProcessingStats) {
        println!("\n{}", "Processing Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            stats.processing_time_ms.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files processed:".bright_cyan(),
            stats.files_processed.to_string().bright_white()
        );
        if stats.files_failed > 0 {
            println!(
                "  {} {}",
                "Files failed:".bright_red(),
                stats.files_failed.to_string().bright_red().bold()
            );
        }
        for (table, rows) in &stats.rows_written {
            println!("  {} {} rows", format!("{}:", table).bright_cyan(), rows);
        }
        for (label, count) in stats.counters.entries() {
            if count > 0 {
                println!("  {} {}", format!("{}:", label).bright_yellow(), count);
            }
        }
        for failure in &stats.stage_failures {
            println!("  {} {}", "Skipped:".bright_red(), failure);
        }
    }
}
