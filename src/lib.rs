// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod enml;
pub mod error;
pub mod exporter;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod resources;
pub mod source;
pub mod utils;

pub use config::{
    Config, EnexOptions, EnmlOptions, HtmlOptions, MarkdownEngineKind, PipelineConfig,
    ProcessingOptions, ResourceOptions,
};
pub use enml::{EnmlDocument, EnmlSanitizer};
pub use error::{PipelineError, Result};
pub use exporter::{EnexWriter, JsonExporter, ScanManifest};
pub use models::{ImageReference, Note, RawNote, ResourceFallback, ResourceRecord, ResourceSet};
pub use parser::{
    ExtractedMarkdown, Frontmatter, FrontmatterParser, MarkdownNormalizer, StructureExtractor,
};
pub use pipeline::{
    ConversionOrchestrator, ConversionReport, ConvertedNote, NoteAssembler, NoteProcessor,
    PipelineStats, PreparedNote, ProgressTracker,
};
pub use render::HtmlRenderer;
pub use resources::ResourceResolver;
pub use source::{FileScanner, ScannedFile};
pub use utils::Validator;
