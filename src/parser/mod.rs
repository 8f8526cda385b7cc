// file: src/parser/mod.rs
// description: markdown parsing module exports
// reference: internal module structure

pub mod fences;
pub mod frontmatter;
pub mod normalizer;
pub mod structure;

pub use frontmatter::{Frontmatter, FrontmatterParser, FrontmatterValue, first_heading};
pub use normalizer::MarkdownNormalizer;
pub use structure::{
    CodeBlock, ExtractedMarkdown, ResourcePath, StructureExtractor, normalize_resource_path,
};
