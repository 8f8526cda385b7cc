// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for conversion runs
// reference: uses indicatif for progress bars and tracks conversion metrics

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub notes_converted: usize,
    pub notes_failed: usize,
    pub resources_embedded: usize,
    pub placeholders: usize,
    pub missing_images: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.notes_converted as f64 / self.duration_secs as f64
    }

    pub fn bytes_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.total_bytes_processed as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.notes_converted + self.notes_failed;
        if total == 0 {
            return 0.0;
        }
        (self.notes_converted as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    notes_converted: Arc<AtomicUsize>,
    notes_failed: Arc<AtomicUsize>,
    resources_embedded: Arc<AtomicUsize>,
    placeholders: Arc<AtomicUsize>,
    missing_images: Arc<AtomicUsize>,
    bytes_processed: Arc<AtomicU64>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_notes: usize) -> Self {
        Self::with_color(total_notes, true)
    }

    pub fn with_color(total_notes: usize, colored: bool) -> Self {
        Self::build(MultiProgress::new(), total_notes, colored)
    }

    /// A tracker that draws nothing, for tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self::build(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            0,
            false,
        )
    }

    fn build(multi_progress: MultiProgress, total_notes: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_notes as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            notes_converted: Arc::new(AtomicUsize::new(0)),
            notes_failed: Arc::new(AtomicUsize::new(0)),
            resources_embedded: Arc::new(AtomicUsize::new(0)),
            placeholders: Arc::new(AtomicUsize::new(0)),
            missing_images: Arc::new(AtomicUsize::new(0)),
            bytes_processed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn set_length(&self, total_notes: usize) {
        self.main_bar.set_length(total_notes as u64);
    }

    pub fn inc_notes_converted(&self) {
        self.notes_converted.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_notes_failed(&self) {
        self.notes_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn add_resources(&self, embedded: usize, placeholders: usize) {
        self.resources_embedded.fetch_add(embedded, Ordering::SeqCst);
        self.placeholders.fetch_add(placeholders, Ordering::SeqCst);
    }

    pub fn add_missing_images(&self, count: usize) {
        self.missing_images.fetch_add(count, Ordering::SeqCst);
    }

    pub fn add_bytes_processed(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Conversion complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            notes_converted: self.notes_converted.load(Ordering::SeqCst),
            notes_failed: self.notes_failed.load(Ordering::SeqCst),
            resources_embedded: self.resources_embedded.load(Ordering::SeqCst),
            placeholders: self.placeholders.load(Ordering::SeqCst),
            missing_images: self.missing_images.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let resources = self.resources_embedded.load(Ordering::SeqCst);
        let failed = self.notes_failed.load(Ordering::SeqCst);

        let message = format!("Resources: {} | Failed: {}", resources, failed);

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => style,
        Err(e) => {
            warn!("Invalid progress template: {}", e);
            ProgressStyle::default_bar()
        }
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(
            bar_style("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            bar_style("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}")
                .progress_chars("=>-"),
        );
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    bar.set_style(bar_style("{msg}"));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_calculations() {
        let mut stats = PipelineStats::new();
        stats.notes_converted = 100;
        stats.notes_failed = 10;
        stats.duration_secs = 10;
        stats.total_bytes_processed = 1000;

        assert_eq!(stats.notes_per_second(), 10.0);
        assert_eq!(stats.bytes_per_second(), 100.0);
        assert!((stats.success_rate() - 90.909).abs() < 0.01);
    }

    #[test]
    fn test_pipeline_stats_zero_duration() {
        let stats = PipelineStats::new();
        assert_eq!(stats.notes_per_second(), 0.0);
        assert_eq!(stats.bytes_per_second(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::hidden();
        tracker.set_length(3);

        tracker.inc_notes_converted();
        tracker.inc_notes_converted();
        tracker.inc_notes_failed();
        tracker.add_resources(4, 1);
        tracker.add_missing_images(2);
        tracker.add_bytes_processed(1024);

        let stats = tracker.get_stats();
        assert_eq!(stats.notes_converted, 2);
        assert_eq!(stats.notes_failed, 1);
        assert_eq!(stats.resources_embedded, 4);
        assert_eq!(stats.placeholders, 1);
        assert_eq!(stats.missing_images, 2);
        assert_eq!(stats.total_bytes_processed, 1024);
    }
}
