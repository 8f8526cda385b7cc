// file: src/exporter/json.rs
// description: json export of scan manifests and conversion reports
// reference: https://docs.rs/serde_json

use crate::error::{PipelineError, Result};
use crate::source::ScannedFile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MANIFEST_FILE: &str = "scan_manifest.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ScanManifest {
    pub scanned_at: DateTime<Utc>,
    pub source_directory: PathBuf,
    pub total_notes: usize,
    pub total_bytes: u64,
    pub notes: Vec<ScannedFile>,
}

impl ScanManifest {
    pub fn new(source_directory: &Path, notes: Vec<ScannedFile>) -> Self {
        Self {
            scanned_at: Utc::now(),
            source_directory: source_directory.to_path_buf(),
            total_notes: notes.len(),
            total_bytes: notes.iter().map(|n| n.size).sum(),
            notes,
        }
    }
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| PipelineError::FileOperation {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_manifest(
        &self,
        files: Vec<ScannedFile>,
        source_directory: &Path,
        pretty: bool,
    ) -> Result<PathBuf> {
        let manifest = ScanManifest::new(source_directory, files);
        let path = self.write_json(MANIFEST_FILE, &manifest, pretty)?;

        info!(
            "Scan manifest: {} notes, {} bytes",
            manifest.total_notes, manifest.total_bytes
        );
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T, pretty: bool) -> Result<PathBuf> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        let path = self.output_dir.join(name);
        fs::write(&path, json).map_err(|source| PipelineError::FileOperation {
            path: path.clone(),
            source,
        })?;

        info!("Wrote {}", path.display());
        Ok(path)
    }
}
