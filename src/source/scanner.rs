// file: src/source/scanner.rs
// description: directory walking and markdown note discovery with filtering
// reference: https://docs.rs/walkdir

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::utils::Validator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct FileScanner {
    config: PipelineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path below the source root with forward slashes.
    pub relative_path: String,
    /// Parent folder of `relative_path`, empty for notes at the root.
    pub folder_path: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl FileScanner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Lists markdown notes below `root`, sorted by relative path.
    pub fn scan_directory(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        if !root.is_dir() {
            return Err(PipelineError::Config(format!(
                "Source directory does not exist: {}",
                root.display()
            )));
        }

        info!("Scanning directory: {}", root.display());
        let max_size = (self.config.max_file_size_mb as u64) * 1024 * 1024;
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Unreadable directory entry: {}", err);
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            if self.should_skip(&relative_path) {
                debug!("Skipping file: {}", relative_path);
                continue;
            }

            if !Validator::is_markdown_file(path) {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                warn!("Could not read metadata: {}", path.display());
                continue;
            };

            let size = metadata.len();
            if size > max_size {
                warn!(
                    "Skipping large file ({} MB): {}",
                    size / 1024 / 1024,
                    path.display()
                );
                continue;
            }

            let folder_path = relative_path
                .rsplit_once('/')
                .map(|(folder, _)| folder.to_string())
                .unwrap_or_default();

            files.push(ScannedFile {
                path: path.to_path_buf(),
                relative_path,
                folder_path,
                size,
                created: metadata.created().ok().map(to_utc),
                modified: metadata.modified().ok().map(to_utc),
            });
        }

        info!("Found {} markdown files", files.len());
        Ok(files)
    }

    /// `*.ext` matches a suffix, `dir/*` a directory prefix anywhere in the
    /// path, anything else a substring.
    fn should_skip(&self, relative_path: &str) -> bool {
        let path = format!("/{}", relative_path);

        self.config.skip_patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                path.ends_with(suffix)
            } else if let Some(dir) = pattern.strip_suffix('*') {
                path.contains(&format!("/{}", dir.trim_start_matches('/')))
            } else {
                path.contains(pattern.as_str())
            }
        })
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(skip_patterns: &[&str]) -> PipelineConfig {
        PipelineConfig {
            parallel_workers: 1,
            skip_patterns: skip_patterns.iter().map(|s| s.to_string()).collect(),
            max_file_size_mb: 10,
        }
    }

    #[test]
    fn test_scan_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("work/projects")).unwrap();
        fs::write(temp.path().join("b.md"), "# B").unwrap();
        fs::write(temp.path().join("work/projects/a.markdown"), "# A").unwrap();
        fs::write(temp.path().join("image.png"), [0u8; 4]).unwrap();

        let files = FileScanner::new(config(&[])).scan_directory(temp.path()).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["b.md", "work/projects/a.markdown"]);
        assert_eq!(files[0].folder_path, "");
        assert_eq!(files[1].folder_path, "work/projects");
        assert!(files[0].modified.is_some());
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = FileScanner::new(config(&["*.tmp.md", ".obsidian/*", ".git/"]));

        assert!(scanner.should_skip("notes/draft.tmp.md"));
        assert!(scanner.should_skip(".obsidian/workspace.md"));
        assert!(scanner.should_skip("vault/.git/HEAD.md"));
        assert!(!scanner.should_skip("notes/ideas.md"));
    }

    #[test]
    fn test_skips_oversized_notes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.md"), vec![b'a'; 2 * 1024 * 1024]).unwrap();
        let mut small = config(&[]);
        small.max_file_size_mb = 1;

        let files = FileScanner::new(small).scan_directory(temp.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = FileScanner::new(config(&[]))
            .scan_directory(&temp.path().join("absent"))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
