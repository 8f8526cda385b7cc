// file: src/parser/normalizer.rs
// description: Markdown cleanup run before structural extraction
// reference: https://commonmark.org

use crate::parser::fences::code_ranges;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HIGHLIGHT: Regex = Regex::new(r"==([^=\n]+)==").unwrap();
    static ref STRIKETHROUGH: Regex = Regex::new(r"~~([^~\n]+)~~").unwrap();
    static ref SAVED_CODE: Regex = Regex::new("\u{E000}(\\d+)\u{E001}").unwrap();
}

pub struct MarkdownNormalizer;

impl MarkdownNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Unicode cleanup applies to the whole text; bullet, wiki-link and
    /// decoration rewrites skip fenced and inline code.
    pub fn normalize(&self, content: &str) -> String {
        let cleaned = clean_unicode(content);
        let (mut text, saved) = set_code_aside(&cleaned);

        text = self.normalize_bullets(&text);
        text = self.collapse_wiki_links(&text);
        text = self.strip_decorations(&text);

        restore_code(&text, &saved)
    }

    fn normalize_bullets(&self, content: &str) -> String {
        content
            .split('\n')
            .map(|line| {
                let trimmed = line.trim_start();
                let indent = &line[..line.len() - trimmed.len()];

                match trimmed.strip_prefix("* ") {
                    Some(rest) if !is_star_rule(trimmed) => format!("{}- {}", indent, rest),
                    _ => line.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `[[target|label]]` becomes `label`, `[[target]]` becomes `target`.
    /// Embeds written as `![[...]]` are left for image extraction.
    fn collapse_wiki_links(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(pos) = rest.find("[[") {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 2..];
            let embedded = out.ends_with('!');

            if !embedded
                && let Some(end) = after.find("]]")
                && !after[..end].contains('\n')
                && !after[..end].contains("[[")
            {
                let inner = &after[..end];
                let label = match inner.split_once('|') {
                    Some((target, label)) if label.trim().is_empty() => target,
                    Some((_, label)) => label,
                    None => inner,
                };
                out.push_str(label.trim());
                rest = &after[end + 2..];
                continue;
            }

            out.push_str("[[");
            rest = after;
        }

        out.push_str(rest);
        out
    }

    fn strip_decorations(&self, content: &str) -> String {
        let without_highlight = HIGHLIGHT.replace_all(content, "$1");
        STRIKETHROUGH.replace_all(&without_highlight, "$1").to_string()
    }
}

impl Default for MarkdownNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_space_variant(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}' | '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

fn is_invisible_control(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
    )
}

fn clean_unicode(content: &str) -> String {
    content
        .chars()
        .filter(|&c| !is_invisible_control(c))
        .map(|c| if is_space_variant(c) { ' ' } else { c })
        .collect()
}

fn is_star_rule(line: &str) -> bool {
    line.chars().all(|c| c == '*' || c == ' ' || c == '\t')
        && line.chars().filter(|&c| c == '*').count() >= 3
}

fn set_code_aside(content: &str) -> (String, Vec<String>) {
    let mut text = String::with_capacity(content.len());
    let mut saved = Vec::new();
    let mut cursor = 0;

    for range in code_ranges(content) {
        text.push_str(&content[cursor..range.start]);
        text.push_str(&format!("\u{E000}{}\u{E001}", saved.len()));
        saved.push(content[range.clone()].to_string());
        cursor = range.end;
    }
    text.push_str(&content[cursor..]);

    (text, saved)
}

fn restore_code(text: &str, saved: &[String]) -> String {
    if saved.is_empty() {
        return text.to_string();
    }

    SAVED_CODE
        .replace_all(text, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| saved.get(idx))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalize(content: &str) -> String {
        MarkdownNormalizer::new().normalize(content)
    }

    #[test]
    fn test_unicode_spaces_and_controls() {
        assert_eq!(normalize("a\u{00A0}b\u{3000}c"), "a b c");
        assert_eq!(normalize("zero\u{200B}width\u{FEFF}\u{202E}"), "zerowidth");
        assert_eq!(normalize("soft\u{00AD}hyphen"), "softhyphen");
    }

    #[test]
    fn test_star_bullets() {
        assert_eq!(normalize("* one\n  * two"), "- one\n  - two");
        assert_eq!(normalize("* * *"), "* * *");
        assert_eq!(normalize("\\* literal"), "\\* literal");
        assert_eq!(normalize("a * b"), "a * b");
    }

    #[test]
    fn test_wiki_links() {
        assert_eq!(normalize("see [[Other Note|that note]]"), "see that note");
        assert_eq!(normalize("see [[Other Note]]"), "see Other Note");
        assert_eq!(normalize("![[photo.png]]"), "![[photo.png]]");
        assert_eq!(normalize("broken [[link"), "broken [[link");
    }

    #[test]
    fn test_decorations() {
        assert_eq!(normalize("==marked== and ~~gone~~"), "marked and gone");
        assert_eq!(normalize("====="), "=====");
    }

    #[test]
    fn test_code_is_left_verbatim() {
        let content = "```\n* keep\n[[keep]]\n==keep==\n```\nand `~~keep~~` but ~~drop~~";
        let expected = "```\n* keep\n[[keep]]\n==keep==\n```\nand `~~keep~~` but drop";
        assert_eq!(normalize(content), expected);
    }

    #[test]
    fn test_trailing_newline_preserved() {
        assert_eq!(normalize("* item\n"), "- item\n");
    }
}
