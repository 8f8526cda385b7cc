// file: src/render/engine.rs
// description: pluggable markdown to html engines
// reference: https://docs.rs/pulldown-cmark

use crate::config::{HtmlOptions, MarkdownEngineKind};
use pulldown_cmark::{Options, Parser, html};

pub const EMPTY_LINE_PLACEHOLDER: &str = "<!-- empty-line-placeholder -->";

pub trait MarkdownEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn render(&self, markdown: &str) -> String;
}

pub struct PulldownEngine {
    options: Options,
}

impl PulldownEngine {
    pub fn new(enable_tables: bool) -> Self {
        let mut options = Options::empty();
        if enable_tables {
            options.insert(Options::ENABLE_TABLES);
        }
        Self { options }
    }
}

impl MarkdownEngine for PulldownEngine {
    fn name(&self) -> &'static str {
        "pulldown-cmark"
    }

    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Paragraph wrapping only: blank and placeholder lines split paragraphs,
/// newlines inside a paragraph become `<br>`.
pub struct BasicEngine;

impl MarkdownEngine for BasicEngine {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn render(&self, markdown: &str) -> String {
        let mut parts = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();

        for line in markdown.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                flush_paragraph(&mut paragraph, &mut parts);
            } else if trimmed == EMPTY_LINE_PLACEHOLDER {
                flush_paragraph(&mut paragraph, &mut parts);
                parts.push(EMPTY_LINE_PLACEHOLDER.to_string());
            } else {
                paragraph.push(line);
            }
        }
        flush_paragraph(&mut paragraph, &mut parts);

        parts.join("\n")
    }
}

fn flush_paragraph(paragraph: &mut Vec<&str>, parts: &mut Vec<String>) {
    if !paragraph.is_empty() {
        parts.push(format!("<p>{}</p>", paragraph.join("<br>\n")));
        paragraph.clear();
    }
}

pub fn engine_for(options: &HtmlOptions) -> Box<dyn MarkdownEngine> {
    match options.markdown_engine {
        MarkdownEngineKind::Auto | MarkdownEngineKind::PulldownCmark => {
            Box::new(PulldownEngine::new(options.enable_tables))
        }
        MarkdownEngineKind::Basic => Box::new(BasicEngine),
    }
}
