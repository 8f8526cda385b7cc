// file: src/render/html.rs
// description: markdown engine wrapper that restores extracted markers as html
// reference: ordered post-render passes over the engine output

use crate::config::HtmlOptions;
use crate::parser::ExtractedMarkdown;
use crate::parser::structure::CodeBlock;
use crate::render::engine::{EMPTY_LINE_PLACEHOLDER, MarkdownEngine, engine_for};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

pub const EMPTY_BLOCK: &str = "<div><br/></div>";

const CODE_CONTAINER_STYLE: &str = "box-sizing: border-box; padding: 8px; \
font-family: Monaco, Menlo, Consolas, monospace; font-size: 12px; \
color: rgb(51, 51, 51); border-radius: 4px; background-color: rgb(251, 250, 248); \
border: 1px solid rgba(0, 0, 0, 0.15); -en-codeblock: true;";

/// Collapses an entity that was escaped a second time.
const ENTITY_FIXES: &[(&str, &str)] = &[
    ("&amp;amp;", "&amp;"),
    ("&amp;lt;", "&lt;"),
    ("&amp;gt;", "&gt;"),
    ("&amp;quot;", "&quot;"),
    ("&amp;apos;", "&apos;"),
];

lazy_static! {
    static ref LINK_PLACEHOLDER: Regex = Regex::new(r"\[\[link:(.*?)\|(.*?)\]\]").unwrap();
    static ref IMAGE_PLACEHOLDER: Regex = Regex::new(r"\[\[image:(.*?)\|(.*?)\]\]").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*(.*?)\*\*").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\*([^*\n<>]+)\*").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s").unwrap();
    static ref FENCE_OPEN: Regex = Regex::new(r"(?m)^([ \t]{0,3})```").unwrap();
}

pub struct HtmlRenderer {
    options: HtmlOptions,
    engine: Box<dyn MarkdownEngine>,
}

impl HtmlRenderer {
    pub fn new(options: HtmlOptions) -> Self {
        let engine = engine_for(&options);
        Self { options, engine }
    }

    pub fn with_engine(options: HtmlOptions, engine: Box<dyn MarkdownEngine>) -> Self {
        Self { options, engine }
    }

    /// Renders the marker-bearing text, then restores code last so it is
    /// escaped exactly once and never touched by the emphasis pass.
    pub fn render(&self, extracted: &ExtractedMarkdown) -> String {
        let mut html = self.render_markdown(&extracted.text);

        for (id, content) in &extracted.inline_code {
            html = html.replace(id.as_str(), &format!("<code>{}</code>", escape_code(content)));
        }

        for (id, block) in &extracted.code_blocks {
            let rendered = render_code_block(block);
            html = html.replace(&format!("<p>{}</p>", id), &rendered);
            html = html.replace(id.as_str(), &rendered);
        }

        if self.options.create_full_document {
            html = self.wrap_document(&html);
        }

        html
    }

    /// Engine output plus every post-render pass except code restoration.
    pub fn render_markdown(&self, markdown: &str) -> String {
        let mut text = mark_empty_lines(markdown);
        text = separate_lists(&text);
        if !self.options.enable_fenced_code {
            text = FENCE_OPEN.replace_all(&text, r"$1\`\`\`").to_string();
        }

        debug!("Rendering markdown with {} engine", self.engine.name());
        let mut html = self.engine.render(&text);

        html = html.replace(EMPTY_LINE_PLACEHOLDER, EMPTY_BLOCK);
        html = LINK_PLACEHOLDER
            .replace_all(&html, r#"<a href="$1">$2</a>"#)
            .to_string();
        html = IMAGE_PLACEHOLDER
            .replace_all(&html, "<div>[Image: $2 ($1)]</div>")
            .to_string();

        for (from, to) in ENTITY_FIXES {
            html = html.replace(from, to);
        }

        html = BOLD.replace_all(&html, "<strong>$1</strong>").to_string();
        html = ITALIC.replace_all(&html, "<em>$1</em>").to_string();

        if !html.contains("<table") && html.contains('|') {
            html = promote_pipe_tables(&html);
        }

        html
    }

    fn wrap_document(&self, body: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"UTF-8\">\n    <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>",
            html_escape::encode_text(&self.options.document_title),
            body
        )
    }
}

/// Each blank line becomes a placeholder comment framed by real blank lines,
/// so raw HTML blocks such as a lone image marker still end where the
/// author ended them.
fn mark_empty_lines(markdown: &str) -> String {
    let marked = format!("\n{}\n", EMPTY_LINE_PLACEHOLDER);
    markdown
        .trim_end_matches(['\n', '\r'])
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                marked.as_str()
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inserts a blank line before a list that directly follows a text line so
/// engines start a new list instead of continuing the paragraph.
fn separate_lists(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let mut out = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        if i > 0 && LIST_ITEM.is_match(line) {
            let previous = lines[i - 1];
            if !previous.trim().is_empty() && !LIST_ITEM.is_match(previous) {
                out.push("");
            }
        }
        out.push(line);
    }

    out.join("\n")
}

/// Escapes `& < > * _` so restored code is inert to later passes.
pub fn escape_code(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '*' => out.push_str("&#42;"),
            '_' => out.push_str("&#95;"),
            other => out.push(other),
        }
    }
    out
}

fn render_code_block(block: &CodeBlock) -> String {
    let mut out = format!("<div style=\"{}\">", CODE_CONTAINER_STYLE);

    for line in block.content.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            out.push_str(EMPTY_BLOCK);
            continue;
        }

        let body = line.trim_start_matches([' ', '\t']);
        let indent: usize = line[..line.len() - body.len()]
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum();

        out.push_str("<div>");
        out.push_str(&"&#160;".repeat(indent));
        out.push_str(&escape_code(body));
        out.push_str("</div>");
    }

    out.push_str("</div>");
    out
}

/// Turns runs of `|`-delimited lines into a table. The second line of a run
/// is taken as the header separator and discarded without inspection.
fn promote_pipe_tables(html: &str) -> String {
    let lines: Vec<&str> = html.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let mut end = i;
        while end < lines.len() && pipe_row(lines[end]).is_some() {
            end += 1;
        }

        if end - i >= 2 {
            let (prefix, _) = split_block_tags(lines[i]);
            let (_, suffix) = split_block_tags(lines[end - 1]);

            let mut table = String::from("<table><thead>");
            table.push_str(&table_row(lines[i], "th"));
            table.push_str("</thead><tbody>");
            for line in &lines[i + 2..end] {
                table.push_str(&table_row(line, "td"));
            }
            table.push_str("</tbody></table>");

            out.push(format!("{}{}{}", prefix, table, suffix));
            i = end;
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }

    out.join("\n")
}

fn split_block_tags(line: &str) -> (&'static str, &'static str) {
    let trimmed = line.trim();
    let prefix = if trimmed.starts_with("<p>") { "<p>" } else { "" };
    let suffix = if trimmed.ends_with("</p>") { "</p>" } else { "" };
    (prefix, suffix)
}

fn pipe_row(line: &str) -> Option<&str> {
    let mut row = line.trim();
    row = row.strip_prefix("<p>").unwrap_or(row);
    row = row.strip_suffix("</p>").unwrap_or(row);
    row = row.strip_suffix("<br />").unwrap_or(row);
    row = row.strip_suffix("<br>").unwrap_or(row);
    let row = row.trim();

    if row.len() >= 2 && row.starts_with('|') && row.ends_with('|') {
        Some(row)
    } else {
        None
    }
}

fn table_row(line: &str, cell: &str) -> String {
    let Some(row) = pipe_row(line) else {
        return String::new();
    };

    let cells = &row[1..row.len() - 1];
    let mut out = String::from("<tr>");
    for value in cells.split('|') {
        out.push_str(&format!("<{cell}>{}</{cell}>", value.trim()));
    }
    out.push_str("</tr>");
    out
}
