//! Concurrent per-file parsing.
//!
//! Each file is read asynchronously and parsed on the blocking pool; at most
//! `max_concurrent_files` files are in flight. Results come back tagged with
//! their discovery index and are returned in discovery order, so nothing
//! downstream depends on completion order.

use crate::error::Result;
use crate::layout::{Layout, LayoutKind, SourceFormat};
use crate::models::HydroWarning;
use crate::parser::bulletin::BulletinParser;
use crate::parser::{ParsedSource, parse_source};

use super::discovery::DiscoveredFile;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::task;
use tracing::{debug, error};

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// What one successfully parsed file contributes
#[derive(Debug)]
pub enum ParsedFile {
    Observations(ParsedSource),
    Warning(HydroWarning),
}

/// Delimited layouts to try, the name-matched one first
pub fn candidate_layouts(hint: Option<SourceFormat>) -> Vec<&'static Layout> {
    let mut layouts: Vec<&'static Layout> = hint.map(|format| format.layout()).into_iter().collect();
    layouts.extend(
        SourceFormat::ALL
            .iter()
            .filter(|&&format| Some(format) != hint)
            .map(|format| format.layout())
            .filter(|layout| layout.kind == LayoutKind::Delimited),
    );
    layouts
}

/// Parse one file's bytes. Pure: no I/O, no shared state.
pub fn parse_file(
    path: &Path,
    hint: Option<SourceFormat>,
    bytes: &[u8],
    bulletins: &BulletinParser,
) -> Result<ParsedFile> {
    if hint == Some(SourceFormat::HydroWarning) {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        return bulletins.parse(&file_name, bytes).map(ParsedFile::Warning);
    }

    let file = path.display().to_string();
    parse_source(&file, bytes, &candidate_layouts(hint)).map(ParsedFile::Observations)
}

async fn read_and_parse(
    path: PathBuf,
    hint: Option<SourceFormat>,
    bulletins: Arc<BulletinParser>,
) -> Result<ParsedFile> {
    let bytes = fs::read(&path).await?;
    task::spawn_blocking(move || parse_file(&path, hint, &bytes, &bulletins)).await?
}

/// Parse every discovered file; results are in discovery order.
pub async fn parse_files(
    files: &[DiscoveredFile],
    max_concurrent_files: usize,
    bulletins: Arc<BulletinParser>,
) -> Vec<Result<ParsedFile>> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message("Parsing files");

    let concurrent_limit = max_concurrent_files.min(files.len()).max(1);
    debug!(
        "Parsing {} files with concurrency {}",
        files.len(),
        concurrent_limit
    );

    let mut results: Vec<(usize, Result<ParsedFile>)> = stream::iter(files.iter().enumerate())
        .map(|(index, file)| {
            let pb = pb.clone();
            let bulletins = Arc::clone(&bulletins);
            let path = file.path.clone();
            let hint = file.format;
            async move {
                if let Some(file_name) = path.file_name() {
                    pb.set_message(format!("Parsing: {}", file_name.to_string_lossy()));
                }

                let result = read_and_parse(path.clone(), hint, bulletins).await;
                pb.inc(1);

                match &result {
                    Ok(_) => debug!("Successfully parsed: {}", path.display()),
                    Err(e) => error!("Failed to process {}: {:#}", path.display(), e),
                }
                (index, result)
            }
        })
        .buffer_unordered(concurrent_limit)
        .collect()
        .await;

    pb.finish_with_message("Parsing complete");

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
