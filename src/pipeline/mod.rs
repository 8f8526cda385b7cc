// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod assembler;
mod orchestrator;
pub mod processor;
mod progress;

pub use assembler::NoteAssembler;
pub use orchestrator::{ConversionOrchestrator, ConversionReport, NoteFailure, NoteSummary, REPORT_FILE};
pub use processor::{ConvertedNote, NoteProcessor, PreparedNote};
pub use progress::{PipelineStats, ProgressTracker};
