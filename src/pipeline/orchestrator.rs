// file: src/pipeline/orchestrator.rs
// description: coordinates scanning, per-note conversion, resource resolution and enex output
// reference: orchestrates the asynchronous conversion workflow

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::exporter::{EnexWriter, JsonExporter};
use crate::models::{Note, ResourceRecord, ResourceSet};
use crate::pipeline::processor::{ConvertedNote, NoteProcessor, PreparedNote};
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::resources::ResourceResolver;
use crate::source::{FileScanner, ScannedFile};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub const REPORT_FILE: &str = "conversion_report.json";

#[derive(Debug, Clone, Serialize)]
pub struct NoteSummary {
    pub relative_path: String,
    pub title: String,
    pub resources: usize,
    pub missing_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteFailure {
    pub relative_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub generated_at: DateTime<Utc>,
    pub source_directory: PathBuf,
    pub output_file: Option<PathBuf>,
    pub stats: PipelineStats,
    pub notes: Vec<NoteSummary>,
    pub failures: Vec<NoteFailure>,
}

pub struct ConversionOrchestrator {
    config: Config,
    processor: Arc<NoteProcessor>,
    resolver: Arc<ResourceResolver>,
    max_concurrent_tasks: usize,
    show_progress: bool,
    colored: bool,
}

impl ConversionOrchestrator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let processor = Arc::new(NoteProcessor::new(&config));
        let resolver = Arc::new(ResourceResolver::from_config(&config));
        let max_concurrent_tasks = config.pipeline.parallel_workers.max(1);

        Ok(Self {
            config,
            processor,
            resolver,
            max_concurrent_tasks,
            show_progress: true,
            colored: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool, colored: bool) -> Self {
        self.show_progress = show_progress;
        self.colored = colored;
        self
    }

    /// Converts every note under the source directory into one ENEX file.
    /// Per-note failures are reported; configuration and oversized-resource
    /// failures abort the run.
    pub async fn run(&self, output_file: &Path) -> Result<ConversionReport> {
        info!("Starting markdown to ENEX conversion");
        self.config.validate_directories()?;

        info!("Scanning {}...", self.config.source_directory.display());
        let files = self.scan_files().await?;
        info!("Found {} notes to convert", files.len());

        let mut report = ConversionReport {
            generated_at: Utc::now(),
            source_directory: self.config.source_directory.clone(),
            output_file: None,
            stats: PipelineStats::new(),
            notes: Vec::new(),
            failures: Vec::new(),
        };

        if files.is_empty() {
            warn!("No notes found to convert");
            return Ok(report);
        }

        let progress = Arc::new(if self.show_progress {
            ProgressTracker::with_color(files.len(), self.colored)
        } else {
            ProgressTracker::hidden()
        });

        info!(
            "Preparing notes with {} concurrent tasks...",
            self.max_concurrent_tasks
        );
        let prepared = self
            .prepare_notes(files, progress.clone(), &mut report.failures)
            .await;

        let keys: BTreeSet<String> = prepared
            .iter()
            .flat_map(|note| note.resource_refs().iter().cloned())
            .collect();
        info!("Resolving {} distinct resources...", keys.len());
        let resources = Arc::new(self.resolve_resources(keys).await?);

        let converted = self
            .finish_notes(prepared, resources, progress.clone(), &mut report.failures)
            .await;

        let notes: Vec<Note> = converted.iter().map(|c| c.note.clone()).collect();
        progress.set_message(format!("Writing {}", output_file.display()));
        let writer = EnexWriter::from_config(&self.config);
        let output_path = output_file.to_path_buf();
        tokio::task::spawn_blocking(move || writer.write_file(&notes, &output_path))
            .await
            .map_err(|e| PipelineError::Validation(format!("ENEX writing task failed: {}", e)))??;

        report.output_file = Some(output_file.to_path_buf());
        report.notes = converted
            .iter()
            .map(|c| NoteSummary {
                relative_path: c.relative_path.clone(),
                title: c.note.title.clone(),
                resources: c.note.resources.len(),
                missing_images: c.missing_images.clone(),
            })
            .collect();
        for failure in &report.failures {
            error!("{}: {}", failure.relative_path, failure.error);
        }

        report.stats = progress.get_stats();
        progress.finish();

        self.log_final_stats(&report.stats);

        Ok(report)
    }

    /// Writes the report next to the export.
    pub fn write_report(&self, report: &ConversionReport) -> Result<PathBuf> {
        let exporter = JsonExporter::new(&self.config.output_directory)?;
        exporter.write_json(REPORT_FILE, report, true)
    }

    async fn scan_files(&self) -> Result<Vec<ScannedFile>> {
        let source = self.config.source_directory.clone();
        let pipeline_config = self.config.pipeline.clone();

        tokio::task::spawn_blocking(move || {
            let scanner = FileScanner::new(pipeline_config);
            scanner.scan_directory(&source)
        })
        .await
        .map_err(|e| PipelineError::Validation(format!("File scanning task failed: {}", e)))?
    }

    async fn prepare_notes(
        &self,
        files: Vec<ScannedFile>,
        progress: Arc<ProgressTracker>,
        failures: &mut Vec<NoteFailure>,
    ) -> Vec<PreparedNote> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_tasks));

        let tasks = files.into_iter().enumerate().map(|(index, file)| {
            let semaphore = semaphore.clone();
            let processor = self.processor.clone();
            let progress = progress.clone();

            async move {
                let permit = semaphore.acquire_owned().await;

                let relative_path = file.relative_path.clone();
                let file_size = file.size;
                let prepared =
                    tokio::task::spawn_blocking(move || processor.prepare_file(&file)).await;

                drop(permit);

                let outcome = match prepared {
                    Ok(Ok(note)) => {
                        progress.add_bytes_processed(file_size);
                        Ok(note)
                    }
                    Ok(Err(e)) => {
                        progress.inc_notes_failed();
                        warn!("Failed to read note {}: {}", relative_path, e);
                        Err(NoteFailure {
                            relative_path,
                            error: e.to_string(),
                        })
                    }
                    Err(e) => {
                        progress.inc_notes_failed();
                        error!("Preparation task panicked: {}", e);
                        Err(NoteFailure {
                            relative_path,
                            error: e.to_string(),
                        })
                    }
                };
                (index, outcome)
            }
        });

        let mut results: Vec<(usize, std::result::Result<PreparedNote, NoteFailure>)> =
            stream::iter(tasks)
                .buffer_unordered(self.max_concurrent_tasks)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut prepared = Vec::with_capacity(results.len());
        for (_, outcome) in results {
            match outcome {
                Ok(note) => prepared.push(note),
                Err(failure) => failures.push(failure),
            }
        }
        prepared
    }

    /// Resolves each distinct key once; the set is shared by every note.
    async fn resolve_resources(&self, keys: BTreeSet<String>) -> Result<ResourceSet> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_tasks));

        let tasks = keys.into_iter().map(|key| {
            let semaphore = semaphore.clone();
            let resolver = self.resolver.clone();

            async move {
                let permit = semaphore.acquire_owned().await;
                let task_key = key.clone();
                let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&task_key))
                    .await
                    .map_err(|e| PipelineError::Resource {
                        key: key.clone(),
                        message: format!("resolution task failed: {}", e),
                    })
                    .and_then(|result| result);
                drop(permit);
                resolved
            }
        });

        let results: Vec<Result<Option<ResourceRecord>>> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent_tasks)
            .collect()
            .await;

        let mut resources = ResourceSet::new();
        for result in results {
            match result {
                Ok(Some(record)) => resources.insert(record),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("{}", e),
            }
        }

        info!(
            "Resolved {} resources, {} embedded as placeholders",
            resources.len(),
            resources.placeholder_count()
        );
        Ok(resources)
    }

    async fn finish_notes(
        &self,
        prepared: Vec<PreparedNote>,
        resources: Arc<ResourceSet>,
        progress: Arc<ProgressTracker>,
        failures: &mut Vec<NoteFailure>,
    ) -> Vec<ConvertedNote> {
        let tasks = prepared.into_iter().enumerate().map(|(index, note)| {
            let processor = self.processor.clone();
            let resources = resources.clone();
            let progress = progress.clone();

            async move {
                let relative_path = note.raw.relative_path.clone();
                let finished =
                    tokio::task::spawn_blocking(move || processor.finish(&note, &resources)).await;

                let outcome = match finished {
                    Ok(converted) => {
                        let placeholders = converted
                            .note
                            .resources
                            .iter()
                            .filter(|r| r.placeholder)
                            .count();
                        progress.add_resources(converted.note.resources.len(), placeholders);
                        progress.add_missing_images(converted.missing_images.len());
                        progress.inc_notes_converted();
                        Ok(converted)
                    }
                    Err(e) => {
                        progress.inc_notes_failed();
                        error!("Conversion task panicked: {}", e);
                        Err(NoteFailure {
                            relative_path,
                            error: e.to_string(),
                        })
                    }
                };
                (index, outcome)
            }
        });

        let mut results: Vec<(usize, std::result::Result<ConvertedNote, NoteFailure>)> =
            stream::iter(tasks)
                .buffer_unordered(self.max_concurrent_tasks)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut converted = Vec::with_capacity(results.len());
        for (_, outcome) in results {
            match outcome {
                Ok(note) => converted.push(note),
                Err(failure) => failures.push(failure),
            }
        }
        converted
    }

    fn log_final_stats(&self, stats: &PipelineStats) {
        info!("=== Conversion Summary ===");
        info!("Duration: {} seconds", stats.duration_secs);
        info!("Notes converted: {}", stats.notes_converted);
        info!("Notes failed: {}", stats.notes_failed);
        info!("Success rate: {:.2}%", stats.success_rate());
        info!("Resources embedded: {}", stats.resources_embedded);
        info!("Placeholders: {}", stats.placeholders);
        info!("Missing images: {}", stats.missing_images);
        info!(
            "Processing speed: {:.2} notes/sec",
            stats.notes_per_second()
        );
        info!(
            "Throughput: {:.2} MB/sec",
            stats.bytes_per_second() / 1_048_576.0
        );
        info!("==========================");
    }
}
