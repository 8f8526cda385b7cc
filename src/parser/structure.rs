// file: src/parser/structure.rs
// description: replaces code, headings, images and links with opaque markers
// reference: ordered text passes with per-note side tables

use crate::config::ProcessingOptions;
use crate::models::ImageReference;
use crate::parser::fences::{find_fenced_blocks, find_inline_spans};
use crate::utils::Validator;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

pub const CODE_BLOCK_PREFIX: &str = "CODEBLOCK";
pub const INLINE_CODE_PREFIX: &str = "INLINECODE";
pub const IMAGE_MARKER_PREFIX: &str = "IMAGE";

lazy_static! {
    static ref HEADING_MARKER: Regex = Regex::new(r"(?m)^#{1,6}[ \t]+").unwrap();
    static ref IMAGE_SYNTAX: Regex =
        Regex::new(r"!\[\[([^\]\n]+)\]\]|!\[([^\]\n]*)\]\(([^)\n]*)\)").unwrap();
    static ref LINK_SYNTAX: Regex = Regex::new(r"\[([^\]\n]*)\]\(([^)\n]*)\)").unwrap();
    pub static ref IMAGE_MARKER: Regex =
        Regex::new(r#"<en-media-marker id="([A-Za-z0-9]+)"\s*/>"#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub content: String,
}

/// Marker-bearing text plus the side tables needed to restore it.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMarkdown {
    pub text: String,
    pub code_blocks: BTreeMap<String, CodeBlock>,
    pub inline_code: BTreeMap<String, String>,
    pub images: Vec<ImageReference>,
    pub resource_refs: BTreeSet<String>,
}

/// Outcome of turning an author-written image target into a resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePath {
    Local(String),
    Remote(String),
    Empty,
}

/// Strips brackets, titles and `|size` suffixes, decodes `%XX` (keeping the
/// raw text when the escapes are not UTF-8), unifies
/// separators and drops leading `./` and `../` segments. The remaining
/// subpath is kept so identically named files in different folders differ.
pub fn normalize_resource_path(raw: &str) -> ResourcePath {
    let mut path = raw.trim();

    if let Some(inner) = path.strip_prefix('<') {
        path = inner.split('>').next().unwrap_or(inner);
    }

    if path.is_empty() {
        return ResourcePath::Empty;
    }

    if Validator::is_remote_url(path) {
        return ResourcePath::Remote(path.to_string());
    }

    let without_size = path.split('|').next().unwrap_or(path);
    let decoded = urlencoding::decode(without_size)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| without_size.to_string());
    let mut key = Validator::sanitize_file_path(&decoded);

    if !key.starts_with('/') {
        loop {
            if let Some(rest) = key.strip_prefix("./") {
                key = rest.to_string();
            } else if let Some(rest) = key.strip_prefix("../") {
                key = rest.to_string();
            } else {
                break;
            }
        }
    }

    let key = key.trim().to_string();
    if key.is_empty() || key == "." || key == ".." {
        ResourcePath::Empty
    } else {
        ResourcePath::Local(key)
    }
}

pub struct StructureExtractor {
    options: ProcessingOptions,
}

impl StructureExtractor {
    pub fn new(options: ProcessingOptions) -> Self {
        Self { options }
    }

    /// Runs the enabled passes in their fixed order. Each call owns its own
    /// tables, so one extractor can serve concurrent notes.
    pub fn extract(&self, body: &str) -> ExtractedMarkdown {
        let mut ctx = ExtractedMarkdown {
            text: body.to_string(),
            ..Default::default()
        };

        if self.options.remove_code_block_markers {
            ctx.text = extract_code_blocks(&ctx.text, &mut ctx.code_blocks);
        }
        if self.options.convert_inline_code {
            ctx.text = extract_inline_code(&ctx.text, &mut ctx.inline_code);
        }
        if self.options.remove_heading_markers {
            ctx.text = HEADING_MARKER.replace_all(&ctx.text, "").to_string();
        }
        if self.options.handle_image_references {
            ctx.text = self.extract_images(&mut ctx);
        }
        if self.options.process_links {
            ctx.text = self.extract_links(&ctx.text);
        }
        if self.options.handle_special_chars {
            ctx.text = self.handle_special_chars(&ctx.text);
        }

        debug!(
            "Extracted {} code blocks, {} inline spans, {} images",
            ctx.code_blocks.len(),
            ctx.inline_code.len(),
            ctx.images.len()
        );

        ctx
    }

    fn extract_images(&self, ctx: &mut ExtractedMarkdown) -> String {
        let source = std::mem::take(&mut ctx.text);
        let preserve = self.options.preserve_image_markdown;

        IMAGE_SYNTAX
            .replace_all(&source, |caps: &Captures| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let offset = caps.get(0).map(|m| m.start()).unwrap_or_default();

                let (target, alt, width) = if let Some(embed) = caps.get(1) {
                    let (path, size) = split_size(embed.as_str());
                    let alt = path.rsplit('/').next().unwrap_or(path).trim().to_string();
                    (strip_link_title(path), alt, size)
                } else {
                    let (alt, size) = split_size(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
                    let target = strip_link_title(caps.get(3).map(|m| m.as_str()).unwrap_or_default());
                    (target, alt.trim().to_string(), size)
                };

                match normalize_resource_path(&target) {
                    ResourcePath::Local(key) => {
                        let marker_id = new_id(IMAGE_MARKER_PREFIX);
                        ctx.resource_refs.insert(key.clone());
                        ctx.images.push(ImageReference {
                            path: key,
                            alt,
                            marker_id: marker_id.clone(),
                            offset,
                            width,
                        });

                        if preserve {
                            whole.to_string()
                        } else {
                            format!("<en-media-marker id=\"{}\"/>", marker_id)
                        }
                    }
                    ResourcePath::Remote(url) => {
                        debug!("Remote image kept as link: {}", url);
                        let label = if alt.is_empty() { url.clone() } else { alt };
                        format!("[[link:{}|{}]]", url, label)
                    }
                    ResourcePath::Empty => {
                        warn!("Image reference with an empty path: {}", whole);
                        format!("[[link:#|Image not found: {}]]", alt)
                    }
                }
            })
            .to_string()
    }

    fn extract_links(&self, text: &str) -> String {
        LINK_SYNTAX
            .replace_all(text, |caps: &Captures| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let start = caps.get(0).map(|m| m.start()).unwrap_or_default();

                if text[..start].ends_with('!') || self.options.preserve_link_markdown {
                    return whole.to_string();
                }

                let label = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let url = strip_link_title(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
                let url = url.trim_start_matches('<').trim_end_matches('>');
                let label = if label.trim().is_empty() { url } else { label };

                format!("[[link:{}|{}]]", url, label)
            })
            .to_string()
    }

    /// Custom substitutions, then HTML escaping. Image marker tags are
    /// copied through untouched.
    fn handle_special_chars(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for marker in IMAGE_MARKER.find_iter(text) {
            out.push_str(&self.escape_segment(&text[cursor..marker.start()]));
            out.push_str(marker.as_str());
            cursor = marker.end();
        }
        out.push_str(&self.escape_segment(&text[cursor..]));

        out
    }

    fn escape_segment(&self, segment: &str) -> String {
        let mut result = segment.to_string();

        for (from, to) in &self.options.special_char_replacements {
            if !from.is_empty() {
                result = result.replace(from.as_str(), to);
            }
        }

        if self.options.escape_html_chars {
            result = result
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;");

            if self.options.escape_single_quotes {
                result = result.replace('\'', "&#39;");
            }
        }

        result
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

fn extract_code_blocks(text: &str, table: &mut BTreeMap<String, CodeBlock>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for block in find_fenced_blocks(text) {
        let id = new_id(CODE_BLOCK_PREFIX);
        out.push_str(&text[cursor..block.range.start]);
        out.push_str(&id);
        cursor = block.range.end;
        table.insert(
            id,
            CodeBlock {
                language: block.language,
                content: block.content,
            },
        );
    }
    out.push_str(&text[cursor..]);

    out
}

fn extract_inline_code(text: &str, table: &mut BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for span in find_inline_spans(text) {
        let id = new_id(INLINE_CODE_PREFIX);
        out.push_str(&text[cursor..span.range.start]);
        out.push_str(&id);
        cursor = span.range.end;
        table.insert(id, span.content);
    }
    out.push_str(&text[cursor..]);

    out
}

/// Splits an Obsidian `name|300` or `name|300x200` suffix off.
fn split_size(value: &str) -> (&str, Option<u32>) {
    match value.rsplit_once('|') {
        Some((head, size)) => {
            let width = size.trim().split('x').next().and_then(|w| w.trim().parse().ok());
            if width.is_some() {
                (head, width)
            } else {
                (value, None)
            }
        }
        None => (value, None),
    }
}

/// Drops a trailing `"title"` from a link or image target.
fn strip_link_title(target: &str) -> String {
    let target = target.trim();
    if target.starts_with('<') {
        return target.to_string();
    }

    for quote in [" \"", " '", " ("] {
        if let Some(idx) = target.find(quote) {
            return target[..idx].trim().to_string();
        }
    }

    target.to_string()
}
