//! File discovery module for IMGW archives
//!
//! Walks the input directory for archive files and tags each one with the
//! format its name suggests. Files with unfamiliar names are kept untagged
//! and later trial-parsed against every delimited layout.

use crate::error::{ImgwError, Result};
use crate::layout::SourceFormat;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;
use walkdir::WalkDir;

/// Archive file extensions, compared case-insensitively
const ARCHIVE_EXTENSIONS: [&str; 2] = ["csv", "txt"];

/// One archive file and the format its name matched, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
}

/// File discovery component for IMGW archives
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    input_path: PathBuf,
    excluded: Vec<PathBuf>,
}

impl FileDiscovery {
    pub fn new(input_path: PathBuf) -> Self {
        Self {
            input_path,
            excluded: Vec::new(),
        }
    }

    /// Skip a file, or every file below a directory
    pub fn exclude(mut self, path: PathBuf) -> Self {
        self.excluded.push(path);
        self
    }

    /// Discover archive files below the input path, sorted by path.
    ///
    /// A single file given as the input path is returned on its own.
    pub async fn discover_files(&self) -> Result<Vec<DiscoveredFile>> {
        if !self.input_path.exists() {
            return Err(ImgwError::MissingInput {
                path: self.input_path.clone(),
            });
        }

        let discovery = self.clone();
        let files = task::spawn_blocking(move || discovery.walk()).await??;

        let tagged = files.iter().filter(|f| f.format.is_some()).count();
        debug!(
            "Found {} archive files in {} ({} matched by name)",
            files.len(),
            self.input_path.display(),
            tagged
        );

        Ok(files)
    }

    fn walk(&self) -> Result<Vec<DiscoveredFile>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.input_path).follow_links(true) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_archive_file(path) || self.is_excluded(path) {
                continue;
            }
            files.push(DiscoveredFile {
                format: SourceFormat::from_path(path),
                path: path.to_path_buf(),
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|excluded| path.starts_with(excluded))
    }
}

/// Check if a path has an archive extension
fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Helper to create an IMGW-like archive tree
    fn create_test_archive(temp_dir: &TempDir) -> PathBuf {
        let root = temp_dir.path().join("imgw");
        let meteo = root.join("dane_meteorologiczne").join("2020");
        let hydro = root.join("dane_hydrologiczne").join("2020");
        fs::create_dir_all(&meteo).unwrap();
        fs::create_dir_all(&hydro).unwrap();

        fs::write(meteo.join("k_d_01_2020.csv"), "data").unwrap();
        fs::write(meteo.join("s_d_t_01_2020.CSV"), "data").unwrap();
        fs::write(meteo.join("renamed.csv"), "data").unwrap();
        fs::write(hydro.join("codz_2020_01.csv"), "data").unwrap();
        fs::write(hydro.join("ostrzezenie_1.txt"), "data").unwrap();
        fs::write(hydro.join("archive.zip"), "zip").unwrap();

        root
    }

    #[tokio::test]
    async fn test_discover_archive_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_archive(&temp_dir);

        let files = FileDiscovery::new(root).discover_files().await.unwrap();
        assert_eq!(files.len(), 5);

        let format_of = |name: &str| {
            files
                .iter()
                .find(|f| f.path.file_name().unwrap() == name)
                .map(|f| f.format)
        };
        assert_eq!(format_of("k_d_01_2020.csv"), Some(Some(SourceFormat::ClimateDaily)));
        assert_eq!(format_of("s_d_t_01_2020.CSV"), Some(Some(SourceFormat::SynopDailyTerm)));
        assert_eq!(format_of("codz_2020_01.csv"), Some(Some(SourceFormat::HydroDaily)));
        assert_eq!(format_of("ostrzezenie_1.txt"), Some(Some(SourceFormat::HydroWarning)));
        assert_eq!(format_of("renamed.csv"), Some(None));
        assert_eq!(format_of("archive.zip"), None);
    }

    #[tokio::test]
    async fn test_discovery_is_sorted_and_honours_exclusions() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_archive(&temp_dir);
        let hydro = root.join("dane_hydrologiczne");

        let files = FileDiscovery::new(root).exclude(hydro.clone()).discover_files().await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| !f.path.starts_with(&hydro)));

        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn test_discover_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = FileDiscovery::new(temp_dir.path().to_path_buf())
            .discover_files()
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_path() {
        let result = FileDiscovery::new(PathBuf::from("/nonexistent/imgw"))
            .discover_files()
            .await;
        assert!(matches!(result, Err(ImgwError::MissingInput { .. })));
    }
}
