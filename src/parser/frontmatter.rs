// file: src/parser/frontmatter.rs
// description: leading yaml metadata block extraction with typed coercion
// reference: https://docs.rs/yaml-rust

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;
use yaml_rust::{Yaml, YamlLoader};

const DELIMITER: &str = "---";
const DATE_KEYS: &[&str] = &["created", "updated", "date"];
const LIST_KEYS: &[&str] = &["tags", "keywords", "categories"];

/// Tried in order; the first format that parses wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y%m%dT%H%M%SZ",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%Y/%m/%d",
];

#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterValue {
    Text(String),
    Date(NaiveDateTime),
    List(Vec<String>),
}

impl FrontmatterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FrontmatterValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            FrontmatterValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FrontmatterValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Insertion-ordered metadata with lowercase keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Vec<(String, FrontmatterValue)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated key keeps its first position and takes the new value.
    pub fn insert(&mut self, key: &str, value: FrontmatterValue) {
        let key = key.to_lowercase();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        let key = key.to_lowercase();
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FrontmatterValue::as_text)
    }

    pub fn get_date(&self, key: &str) -> Option<NaiveDateTime> {
        self.get(key).and_then(FrontmatterValue::as_date)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(FrontmatterValue::as_list)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrontmatterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct FrontmatterParser;

impl FrontmatterParser {
    pub fn new() -> Self {
        Self
    }

    /// Splits `content` into metadata and body. Anything other than a
    /// well-formed leading block yields an empty map and the text unchanged.
    pub fn extract(&self, content: &str) -> (Frontmatter, String) {
        let unchanged = || (Frontmatter::new(), content.to_string());
        let text = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut lines = text.split_inclusive('\n');
        match lines.next() {
            Some(first) if first.trim_end() == DELIMITER => {}
            _ => return unchanged(),
        }

        let mut offset = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
        let mut block = Vec::new();
        let mut closed = false;

        for line in lines {
            offset += line.len();
            if line.trim_end() == DELIMITER {
                closed = true;
                break;
            }
            block.push(line.trim_end_matches(['\r', '\n']));
        }

        if !closed {
            return unchanged();
        }

        let Some(frontmatter) = parse_yaml(&block.join("\n")).or_else(|| parse_block(&block)) else {
            debug!("Malformed frontmatter block, treating note as plain markdown");
            return unchanged();
        };

        let rest = &text[offset..];
        let body = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);

        (frontmatter, body.to_string())
    }
}

impl Default for FrontmatterParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strict YAML mapping; `None` when the block is not one.
fn parse_yaml(block: &str) -> Option<Frontmatter> {
    let docs = YamlLoader::load_from_str(block).ok()?;
    let Some(Yaml::Hash(hash)) = docs.into_iter().next() else {
        return None;
    };

    let mut frontmatter = Frontmatter::new();
    for (key, value) in hash {
        let Some(key) = yaml_scalar(&key) else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }

        match value {
            Yaml::Array(items) => {
                let items = items
                    .iter()
                    .filter_map(yaml_scalar)
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect();
                frontmatter.insert(&key, FrontmatterValue::List(items));
            }
            Yaml::Null => frontmatter.insert(&key, FrontmatterValue::Text(String::new())),
            other => match yaml_scalar(&other) {
                Some(text) => frontmatter.insert(&key, coerce(&key, &text)),
                None => debug!("Skipping nested frontmatter value for '{}'", key),
            },
        }
    }
    Some(frontmatter)
}

fn yaml_scalar(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(text) => Some(text.clone()),
        Yaml::Integer(number) => Some(number.to_string()),
        Yaml::Real(number) => Some(number.clone()),
        Yaml::Boolean(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Loose `key: value` lines, for blocks YAML rejects (unquoted colons,
/// Windows paths).
fn parse_block(lines: &[&str]) -> Option<Frontmatter> {
    let mut frontmatter = Frontmatter::new();
    let mut pending: Option<(String, Vec<String>)> = None;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or(if trimmed == "-" { Some("") } else { None }) {
            let (_, items) = pending.as_mut()?;
            let item = unquote(item.trim());
            if !item.is_empty() {
                items.push(item.to_string());
            }
            continue;
        }

        flush_pending(&mut frontmatter, pending.take());

        let (key, value) = trimmed.split_once(':')?;
        let key = key.trim().to_lowercase();
        if key.is_empty() || key.starts_with('-') {
            return None;
        }

        let value = value.trim();
        if value.is_empty() {
            pending = Some((key, Vec::new()));
        } else {
            frontmatter.insert(&key, coerce(&key, value));
        }
    }

    flush_pending(&mut frontmatter, pending);
    Some(frontmatter)
}

fn flush_pending(frontmatter: &mut Frontmatter, pending: Option<(String, Vec<String>)>) {
    if let Some((key, items)) = pending {
        if items.is_empty() {
            frontmatter.insert(&key, FrontmatterValue::Text(String::new()));
        } else {
            frontmatter.insert(&key, FrontmatterValue::List(items));
        }
    }
}

fn coerce(key: &str, raw: &str) -> FrontmatterValue {
    let value = unquote(raw);

    if DATE_KEYS.contains(&key) {
        return match parse_date(value) {
            Some(date) => FrontmatterValue::Date(date),
            None => {
                debug!("Unparsed date for '{}': {}", key, value);
                FrontmatterValue::Text(value.to_string())
            }
        };
    }

    if LIST_KEYS.contains(&key) {
        return FrontmatterValue::List(split_list(value));
    }

    FrontmatterValue::Text(value.to_string())
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn split_list(value: &str) -> Vec<String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(|item| unquote(item.trim()).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    for format in DATE_FORMATS {
        if format.contains("%H") {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
                return Some(parsed);
            }
        } else if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.naive_utc())
}

/// Text of the first ATX heading outside fenced code, used as a title fallback.
pub fn first_heading(body: &str) -> Option<String> {
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&level) {
            let rest = &trimmed[level..];
            if rest.starts_with(' ') || rest.starts_with('\t') {
                let text = rest.trim().trim_end_matches('#').trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_title_and_tags() {
        let parser = FrontmatterParser::new();
        let (fm, body) = parser.extract("---\ntitle: X\ntags: a, b\n---\nBody text\n");

        assert_eq!(fm.get_text("title"), Some("X"));
        assert_eq!(
            fm.get_list("tags"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert_eq!(body, "Body text\n");
        assert!(!body.contains("title"));
    }

    #[test]
    fn test_no_frontmatter() {
        let parser = FrontmatterParser::new();
        let content = "# Just a heading\n---\n";
        let (fm, body) = parser.extract(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_unclosed_block_is_plain_text() {
        let parser = FrontmatterParser::new();
        let content = "---\ntitle: X\nno closing line";
        let (fm, body) = parser.extract(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_malformed_line_is_plain_text() {
        let parser = FrontmatterParser::new();
        let content = "---\ntitle: X\nthis line has no separator\n---\nBody";
        let (fm, body) = parser.extract(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_keys_are_lowercased_and_ordered() {
        let parser = FrontmatterParser::new();
        let (fm, _) = parser.extract("---\nTitle: \"Quoted\"\nAuthor: Someone\nZeta: 1\n---\n");
        assert_eq!(fm.keys().collect::<Vec<_>>(), vec!["title", "author", "zeta"]);
        assert_eq!(fm.get_text("TITLE"), Some("Quoted"));
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("2024-01-05"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("05/01/2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("Jan 05, 2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("5 January 2024"), Some(date(2024, 1, 5)));
        assert_eq!(
            parse_date("20240105T101500Z"),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(10, 15, 0)
        );
        assert_eq!(
            parse_date("2024-01-05T10:15:00+02:00"),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(8, 15, 0)
        );
        assert_eq!(parse_date("sometime last week"), None);
    }

    #[test]
    fn test_unparsed_date_keeps_raw_string() {
        let parser = FrontmatterParser::new();
        let (fm, _) = parser.extract("---\ncreated: yesterday-ish\nupdated: 2023-12-31\n---\n");
        assert_eq!(fm.get_text("created"), Some("yesterday-ish"));
        assert_eq!(fm.get_date("updated"), Some(date(2023, 12, 31)));
    }

    #[test]
    fn test_yaml_list_continuation() {
        let parser = FrontmatterParser::new();
        let (fm, body) =
            parser.extract("---\ntags:\n  - alpha\n  - \"beta\"\ncategories: [one, two]\n---\nBody");
        assert_eq!(
            fm.get_list("tags"),
            Some(&["alpha".to_string(), "beta".to_string()][..])
        );
        assert_eq!(
            fm.get_list("categories"),
            Some(&["one".to_string(), "two".to_string()][..])
        );
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_single_tag_is_a_list() {
        let parser = FrontmatterParser::new();
        let (fm, _) = parser.extract("---\nkeywords: solo\n---\n");
        assert_eq!(fm.get_list("keywords"), Some(&["solo".to_string()][..]));
    }

    #[test]
    fn test_loose_block_falls_back_to_lines() {
        let parser = FrontmatterParser::new();
        let (fm, body) = parser.extract("---\ntitle: Tom: the story\nsource: C:\\notes\\a.md\n---\nBody");
        assert_eq!(fm.get_text("title"), Some("Tom: the story"));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_yaml_scalars_and_nested_values() {
        let parser = FrontmatterParser::new();
        let (fm, _) = parser.extract("---\ndraft: true\nrating: 4.5\nmeta:\n  inner: x\nsummary:\n---\n");
        assert_eq!(fm.get_text("draft"), Some("true"));
        assert_eq!(fm.get_text("rating"), Some("4.5"));
        assert_eq!(fm.get_text("summary"), Some(""));
        assert!(fm.get("meta").is_none());
    }

    #[test]
    fn test_bom_is_ignored() {
        let parser = FrontmatterParser::new();
        let (fm, body) = parser.extract("\u{feff}---\ntitle: X\n---\nBody");
        assert_eq!(fm.get_text("title"), Some("X"));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_first_heading() {
        assert_eq!(
            first_heading("intro\n```\n# not this\n```\n## Real Title ##\n"),
            Some("Real Title".to_string())
        );
        assert_eq!(first_heading("#hashtag only"), None);
    }
}
