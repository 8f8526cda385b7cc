// file: src/pipeline/processor.rs
// description: runs one note through frontmatter, normalization, extraction, html and enml
// reference: per-note pipeline with no state shared between notes

use crate::config::{Config, ProcessingOptions};
use crate::enml::{EnmlDocument, EnmlSanitizer};
use crate::error::Result;
use crate::models::{Note, RawNote, ResourceSet};
use crate::parser::{ExtractedMarkdown, Frontmatter, FrontmatterParser, MarkdownNormalizer, StructureExtractor};
use crate::pipeline::assembler::NoteAssembler;
use crate::render::HtmlRenderer;
use crate::resources::ResourceResolver;
use crate::source::ScannedFile;
use crate::utils::Validator;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// A note taken as far as it can go before its resources are resolved.
#[derive(Debug, Clone)]
pub struct PreparedNote {
    pub raw: RawNote,
    pub file: Option<ScannedFile>,
    pub frontmatter: Frontmatter,
    /// Body after frontmatter removal and normalization.
    pub markdown: String,
    pub extracted: ExtractedMarkdown,
    pub html: String,
}

impl PreparedNote {
    pub fn resource_refs(&self) -> &BTreeSet<String> {
        &self.extracted.resource_refs
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedNote {
    pub note: Note,
    pub relative_path: String,
    pub missing_images: Vec<String>,
}

pub struct NoteProcessor {
    options: ProcessingOptions,
    frontmatter: FrontmatterParser,
    normalizer: MarkdownNormalizer,
    extractor: StructureExtractor,
    renderer: HtmlRenderer,
    sanitizer: EnmlSanitizer,
    assembler: NoteAssembler,
}

impl NoteProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            options: config.processing_options.clone(),
            frontmatter: FrontmatterParser::new(),
            normalizer: MarkdownNormalizer::new(),
            extractor: StructureExtractor::new(config.processing_options.clone()),
            renderer: HtmlRenderer::new(config.html_options.clone()),
            sanitizer: EnmlSanitizer::new(config.enml_options.clone()),
            assembler: NoteAssembler::new(config.enex_options.clone()),
        }
    }

    /// Reads a scanned file; read and decode failures fail this note only.
    pub fn prepare_file(&self, file: &ScannedFile) -> Result<PreparedNote> {
        info!("Processing note: {}", file.relative_path);
        let raw = RawNote::read(&file.path, &file.relative_path)?;

        if let Err(e) = Validator::validate_content_not_empty(&raw.text) {
            warn!("{}: {}", file.relative_path, e);
        }

        Ok(self.prepare(raw, Some(file.clone())))
    }

    pub fn prepare(&self, raw: RawNote, file: Option<ScannedFile>) -> PreparedNote {
        let (frontmatter, body) = if self.options.extract_frontmatter {
            self.frontmatter.extract(&raw.text)
        } else {
            (Frontmatter::new(), raw.text.clone())
        };

        let markdown = if self.options.normalize_markdown {
            self.normalizer.normalize(&body)
        } else {
            body
        };

        let extracted = self.extractor.extract(&markdown);
        let html = self.renderer.render(&extracted);

        debug!(
            "Prepared {}: {} frontmatter keys, {} resource references",
            raw.relative_path,
            frontmatter.len(),
            extracted.resource_refs.len()
        );

        PreparedNote {
            raw,
            file,
            frontmatter,
            markdown,
            extracted,
            html,
        }
    }

    pub fn to_enml(&self, prepared: &PreparedNote, resources: &ResourceSet) -> EnmlDocument {
        self.sanitizer
            .sanitize(&prepared.html, &prepared.extracted.images, resources)
    }

    pub fn finish(&self, prepared: &PreparedNote, resources: &ResourceSet) -> ConvertedNote {
        let document = self.to_enml(prepared, resources);
        let note = self.assembler.assemble(prepared, &document, resources);

        ConvertedNote {
            note,
            relative_path: prepared.raw.relative_path.clone(),
            missing_images: document.missing_images,
        }
    }

    /// Converts one note end to end, resolving only its own references.
    pub fn convert(&self, raw: RawNote, file: Option<ScannedFile>, resolver: &ResourceResolver) -> Result<ConvertedNote> {
        let prepared = self.prepare(raw, file);
        let resources = resolver.resolve_all(prepared.resource_refs())?;
        Ok(self.finish(&prepared, &resources))
    }
}
