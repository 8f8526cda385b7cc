// file: src/enml/sanitizer.rs
// description: turns rendered html into a cdata wrapped en-note document
// reference: http://xml.evernote.com/pub/enml2.dtd

use crate::config::EnmlOptions;
use crate::enml::markup::{self, Tag, Token};
use crate::models::{ImageReference, ResourceRecord, ResourceSet};
use crate::parser::structure::IMAGE_MARKER;
use crate::parser::{ResourcePath, normalize_resource_path};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#;
pub const ENML_DOCTYPE: &str = r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#;

const PERMITTED_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "bdo", "big", "blockquote", "br", "caption",
    "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em",
    "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "map", "ol",
    "p", "pre", "q", "s", "samp", "small", "span", "strike", "strong", "sub", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "title", "tr", "tt", "u", "ul", "var", "xmp",
];

const ENML_ELEMENTS: &[&str] = &["en-media", "en-todo", "en-crypt"];

/// Removed together with everything between their open and close tags.
const PROHIBITED_ELEMENTS: &[&str] = &[
    "applet", "base", "basefont", "bgsound", "blink", "button", "dir", "embed", "fieldset", "form",
    "frame", "frameset", "head", "iframe", "ilayer", "input", "isindex", "label", "layer",
    "legend", "link", "marquee", "menu", "meta", "noframes", "noscript", "object", "optgroup",
    "option", "param", "plaintext", "script", "select", "style", "textarea", "xml",
];

const PROHIBITED_ATTRIBUTES: &[&str] = &["id", "class", "accesskey", "data", "dynsrc", "tabindex"];

const VOID_ELEMENTS: &[&str] = &["img", "br", "hr"];

const WRAPPER_ELEMENTS: &[&str] = &["en-note", "html", "body"];

const RULE_DIV: &str = "<div>---</div>";

lazy_static! {
    static ref IMG_TAG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
    static ref WIKI_EMBED: Regex = Regex::new(r"!\[\[([^\]\n]+)\]\]").unwrap();
    static ref BARE_URL: Regex = Regex::new(r#"https?://[^\s<>"']+"#).unwrap();
    static ref EMPTY_DIV: Regex = Regex::new(r"<div>\s*</div>").unwrap();
    static ref INTER_TAG_SPACE: Regex = Regex::new(r">\s+<").unwrap();
}

/// Sanitized note body plus what image resolution found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnmlDocument {
    /// `<![CDATA[...]]>` wrapped ENML.
    pub content: String,
    /// Keys of the resource records referenced by `<en-media>` tags.
    pub used_resources: BTreeSet<String>,
    /// Image keys that had no resource record.
    pub missing_images: Vec<String>,
}

pub struct EnmlSanitizer {
    options: EnmlOptions,
}

impl EnmlSanitizer {
    pub fn new(options: EnmlOptions) -> Self {
        Self { options }
    }

    /// Never fails: anything that cannot be represented is dropped or
    /// replaced by a visible marker. Feeding the returned content back in
    /// yields the same content.
    pub fn sanitize(
        &self,
        html: &str,
        images: &[ImageReference],
        resources: &ResourceSet,
    ) -> EnmlDocument {
        let mut document = EnmlDocument::default();

        let html = resolve_images(html, images, resources, &mut document);

        let mut tokens = strip_wrappers(&html);
        tokens = remove_disallowed_elements(tokens);
        tokens = self_close_void_elements(tokens);
        escape_text_tokens(&mut tokens);
        strip_prohibited_attributes(&mut tokens);
        rename_paragraphs(&mut tokens);
        if self.options.autolink_urls {
            tokens = autolink(tokens);
        }
        if self.options.preserve_block_spacing {
            tokens = insert_block_spacing(tokens);
        }

        let body = strip_metadata_block(&markup::render(&tokens));
        let body = tidy(&body);

        debug!(
            "Sanitized note body: {} bytes, {} resources, {} missing images",
            body.len(),
            document.used_resources.len(),
            document.missing_images.len()
        );

        document.content = wrap(&body);
        document
    }
}

fn resolve_images(
    html: &str,
    images: &[ImageReference],
    resources: &ResourceSet,
    document: &mut EnmlDocument,
) -> String {
    let html = IMAGE_MARKER
        .replace_all(html, |caps: &Captures| {
            match images.iter().find(|image| image.marker_id == caps[1]) {
                Some(image) => embed(&image.path, image.width, &image.alt, resources, document),
                None => {
                    warn!("Image marker without a registered image: {}", &caps[1]);
                    not_found(&caps[1], document)
                }
            }
        })
        .into_owned();

    let html = IMG_TAG
        .replace_all(&html, |caps: &Captures| {
            let raw = &caps[0];
            let Some((tag, _)) = markup::parse_tag(raw) else {
                return raw.to_string();
            };
            let src = tag.attr("src").unwrap_or_default();
            let alt = tag.attr("alt").unwrap_or_default();
            let width = tag.attr("width").and_then(|w| w.trim().parse().ok());

            match normalize_resource_path(src) {
                ResourcePath::Remote(_) => raw.to_string(),
                ResourcePath::Local(key) => embed(&key, width, alt, resources, document),
                ResourcePath::Empty => not_found(alt, document),
            }
        })
        .into_owned();

    WIKI_EMBED
        .replace_all(&html, |caps: &Captures| {
            let inner = &caps[1];
            let width = inner
                .split_once('|')
                .and_then(|(_, size)| size.trim().split('x').next())
                .and_then(|w| w.trim().parse().ok());

            match normalize_resource_path(inner) {
                ResourcePath::Local(key) => embed(&key, width, "", resources, document),
                ResourcePath::Remote(url) => Tag::open("a").with_attr("href", &url).render()
                    + &markup::escape_text(&url)
                    + "</a>",
                ResourcePath::Empty => not_found(inner, document),
            }
        })
        .into_owned()
}

fn embed(
    key: &str,
    width: Option<u32>,
    alt: &str,
    resources: &ResourceSet,
    document: &mut EnmlDocument,
) -> String {
    match resources.lookup(key) {
        Some(record) => {
            document.used_resources.insert(record.key.clone());
            en_media(record, width, alt)
        }
        None => {
            warn!("Image not resolved: {}", key);
            not_found(key, document)
        }
    }
}

fn en_media(record: &ResourceRecord, width: Option<u32>, alt: &str) -> String {
    let mut tag = Tag::empty("en-media")
        .with_attr("type", &record.mime)
        .with_attr("hash", &record.hash);

    let (width, height) = display_size(record, width);
    if let Some(width) = width {
        tag = tag.with_attr("width", &width.to_string());
    }
    if let Some(height) = height {
        tag = tag.with_attr("height", &height.to_string());
    }
    if !alt.is_empty() {
        tag = tag.with_attr("alt", alt);
    }

    tag.render()
}

/// A requested width scales the stored height; otherwise the stored size is used.
fn display_size(record: &ResourceRecord, width: Option<u32>) -> (Option<u32>, Option<u32>) {
    match (width, record.width, record.height) {
        (Some(w), Some(rw), Some(rh)) if rw > 0 => {
            let scaled = (u64::from(rh) * u64::from(w) + u64::from(rw) / 2) / u64::from(rw);
            (Some(w), u32::try_from(scaled).ok())
        }
        (Some(w), _, _) => (Some(w), None),
        (None, rw, rh) => (rw, rh),
    }
}

fn not_found(key: &str, document: &mut EnmlDocument) -> String {
    document.missing_images.push(key.to_string());
    format!(
        "<span style=\"color:red;\">[Image not found: {}]</span>",
        markup::escape_text(key)
    )
}

/// Drops an existing CDATA/en-note wrapper, declarations, comments and
/// html/body tags.
fn strip_wrappers(html: &str) -> Vec<Token> {
    let trimmed = html.trim();
    let body = match trimmed.strip_prefix("<![CDATA[") {
        Some(inner) => inner
            .strip_suffix("]]>")
            .unwrap_or(inner)
            .replace("]]]]><![CDATA[>", "]]>"),
        None => trimmed.to_string(),
    };

    markup::tokenize(&body)
        .into_iter()
        .filter_map(|token| match token {
            Token::Comment(_) | Token::Declaration(_) => None,
            Token::CData(text) => Some(Token::Text(text)),
            Token::Tag(tag) if WRAPPER_ELEMENTS.contains(&tag.name.as_str()) => None,
            other => Some(other),
        })
        .collect()
}

fn is_allowed(name: &str) -> bool {
    PERMITTED_ELEMENTS.contains(&name) || ENML_ELEMENTS.contains(&name)
}

/// Prohibited elements go with their content; other unknown tags are
/// unwrapped and their content kept.
fn remove_disallowed_elements(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if let Token::Tag(tag) = &tokens[i] {
            if PROHIBITED_ELEMENTS.contains(&tag.name.as_str()) {
                i = match matching_close(&tokens, i) {
                    Some(end) if !tag.closing && !tag.self_closing => end + 1,
                    _ => i + 1,
                };
                continue;
            }
            if !is_allowed(&tag.name) {
                i += 1;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

fn matching_close(tokens: &[Token], start: usize) -> Option<usize> {
    let name = &tokens[start].as_tag()?.name;
    let mut depth = 0usize;

    for (offset, token) in tokens[start + 1..].iter().enumerate() {
        let Some(tag) = token.as_tag() else { continue };
        if tag.name != *name || tag.self_closing {
            continue;
        }
        if tag.closing {
            if depth == 0 {
                return Some(start + 1 + offset);
            }
            depth -= 1;
        } else {
            depth += 1;
        }
    }

    None
}

fn self_close_void_elements(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Tag(tag) if VOID_ELEMENTS.contains(&tag.name.as_str()) => {
                if tag.closing {
                    None
                } else {
                    Some(Token::Tag(Tag {
                        self_closing: true,
                        ..tag
                    }))
                }
            }
            other => Some(other),
        })
        .collect()
}

fn escape_text_tokens(tokens: &mut [Token]) {
    for token in tokens.iter_mut() {
        if let Token::Text(text) = token {
            *text = markup::escape_text(text);
        }
    }
}

fn is_prohibited_attribute(name: &str) -> bool {
    name.starts_with("on") || PROHIBITED_ATTRIBUTES.contains(&name)
}

fn strip_prohibited_attributes(tokens: &mut [Token]) {
    for token in tokens.iter_mut() {
        let Token::Tag(tag) = token else { continue };
        if tag.closing {
            tag.attrs.clear();
            continue;
        }
        tag.attrs.retain(|(name, _)| !is_prohibited_attribute(name));
        for (name, _) in tag.attrs.iter_mut() {
            if name == "lang" {
                *name = "xml:lang".to_string();
            }
        }
    }
}

fn rename_paragraphs(tokens: &mut [Token]) {
    for token in tokens.iter_mut() {
        if let Token::Tag(tag) = token
            && tag.name == "p"
        {
            tag.name = "div".to_string();
        }
    }
}

fn autolink(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut anchor_depth = 0usize;

    for token in tokens {
        if let Some(tag) = token.as_tag()
            && tag.name == "a"
            && !tag.self_closing
        {
            if tag.closing {
                anchor_depth = anchor_depth.saturating_sub(1);
            } else {
                anchor_depth += 1;
            }
        }

        match token {
            Token::Text(text) if anchor_depth == 0 && BARE_URL.is_match(&text) => {
                out.extend(link_urls(&text));
            }
            other => out.push(other),
        }
    }

    out
}

fn link_urls(text: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut cursor = 0;
    let mut search = 0;

    while let Some(found) = BARE_URL.find_at(text, search) {
        search = found.end();
        let url = trim_url(found.as_str());
        if url.split_once("://").is_none_or(|(_, rest)| rest.is_empty()) {
            continue;
        }

        if cursor < found.start() {
            out.push(Token::Text(text[cursor..found.start()].to_string()));
        }
        out.push(Token::Tag(
            Tag::open("a")
                .with_attr("href", url)
                .with_attr("rev", "en_rl_none"),
        ));
        out.push(Token::Text(url.to_string()));
        out.push(Token::Tag(Tag::close("a")));
        cursor = found.start() + url.len();
    }

    if cursor < text.len() {
        out.push(Token::Text(text[cursor..].to_string()));
    }

    out
}

/// Cuts a matched URL at the first escaped quote or bracket and drops
/// trailing sentence punctuation.
fn trim_url(candidate: &str) -> &str {
    let mut end = candidate.len();
    for stop in ["&quot;", "&lt;", "&gt;", "&#39;", "&apos;"] {
        if let Some(pos) = candidate.find(stop) {
            end = end.min(pos);
        }
    }
    candidate[..end].trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
}

/// Adds an empty line after a block that is directly followed by text.
fn insert_block_spacing(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        out.push(token.clone());

        let closes_div = token.as_tag().is_some_and(|tag| tag.is_close("div"));
        if closes_div && !ends_with_spacer(&out) && next_is_text(&tokens[i + 1..]) {
            out.push(Token::Tag(Tag::open("div")));
            out.push(Token::Tag(Tag::empty("br")));
            out.push(Token::Tag(Tag::close("div")));
        }
    }

    out
}

fn ends_with_spacer(tokens: &[Token]) -> bool {
    let [.., open, br, _close] = tokens else {
        return false;
    };
    let opens_bare_div = open
        .as_tag()
        .is_some_and(|tag| tag.is_open("div") && tag.attrs.is_empty());
    let is_br = br.as_tag().is_some_and(|tag| tag.is_open("br"));
    opens_bare_div && is_br
}

fn next_is_text(rest: &[Token]) -> bool {
    matches!(
        rest.iter().find(|token| !token.is_blank_text()),
        Some(Token::Text(_))
    )
}

/// Removes leading `<div>---</div> ... <div>---</div>` blocks left by an
/// unparsed metadata header.
fn strip_metadata_block(body: &str) -> String {
    let mut current = body.trim_start().to_string();

    loop {
        let Some(rest) = current.strip_prefix(RULE_DIV) else {
            break;
        };
        let Some(end) = rest.find(RULE_DIV) else {
            break;
        };
        current = rest[end + RULE_DIV.len()..].trim_start().to_string();
    }

    current
}

fn tidy(body: &str) -> String {
    let mut out = body.to_string();
    loop {
        let next = EMPTY_DIV.replace_all(&out, "").into_owned();
        if next == out {
            break;
        }
        out = next;
    }

    INTER_TAG_SPACE.replace_all(&out, "><").trim().to_string()
}

fn wrap(body: &str) -> String {
    format!(
        "<![CDATA[{}{}<en-note>{}</en-note>]]>",
        XML_DECLARATION,
        ENML_DOCTYPE,
        body.replace("]]>", "]]]]><![CDATA[>")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceRecord;
    use pretty_assertions::assert_eq;

    fn sanitizer() -> EnmlSanitizer {
        EnmlSanitizer::new(EnmlOptions::default())
    }

    fn body(document: &EnmlDocument) -> &str {
        let start = document.content.find("<en-note>").unwrap() + "<en-note>".len();
        let end = document.content.rfind("</en-note>").unwrap();
        &document.content[start..end]
    }

    fn png(key: &str, hash: &str) -> ResourceRecord {
        ResourceRecord {
            key: key.to_string(),
            hash: hash.to_string(),
            mime: "image/png".to_string(),
            data_base64: String::new(),
            file_name: crate::models::image::file_name_of(key).to_string(),
            size: 4,
            width: Some(200),
            height: Some(100),
            placeholder: false,
            fallback: None,
        }
    }

    fn image(path: &str, marker: &str, width: Option<u32>) -> ImageReference {
        ImageReference {
            path: path.to_string(),
            alt: "Alt".to_string(),
            marker_id: marker.to_string(),
            offset: 0,
            width,
        }
    }

    #[test]
    fn test_wrapper_shape() {
        let document = sanitizer().sanitize("<p>Hello</p>", &[], &ResourceSet::new());
        assert_eq!(
            document.content,
            format!(
                "<![CDATA[{}{}<en-note><div>Hello</div></en-note>]]>",
                XML_DECLARATION, ENML_DOCTYPE
            )
        );
    }

    #[test]
    fn test_script_removed_with_content() {
        let html = "<p>before</p><script type=\"text/javascript\">alert('owned')</script><p>after</p>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert!(!document.content.contains("<script"));
        assert!(!document.content.contains("owned"));
        assert_eq!(body(&document), "<div>before</div><div>after</div>");
    }

    #[test]
    fn test_unknown_elements_unwrapped() {
        let html = "<section><p>kept <custom>inner</custom></p></section>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(body(&document), "<div>kept inner</div>");
    }

    #[test]
    fn test_attributes_and_void_elements() {
        let html = "<p id=\"x\" class='c' onclick=\"go()\" style=\"color:red\" lang=en>a<br>b<hr></hr></p>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(
            body(&document),
            "<div style=\"color:red\" xml:lang=\"en\">a<br/>b<hr/></div>"
        );
    }

    #[test]
    fn test_text_entities() {
        let html = "<p>Q&A &nbsp; &amp; 1 < 2</p>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(body(&document), "<div>Q&amp;A &#160; &amp; 1 &lt; 2</div>");
    }

    #[test]
    fn test_autolink_outside_anchors() {
        let html = "<p>see https://example.com/a?b=1&c=2. or <a href=\"https://x.org\">https://x.org</a></p>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(
            body(&document),
            "<div>see <a href=\"https://example.com/a?b=1&amp;c=2\" rev=\"en_rl_none\">https://example.com/a?b=1&amp;c=2</a>. or <a href=\"https://x.org\">https://x.org</a></div>"
        );
    }

    #[test]
    fn test_autolink_toggle() {
        let options = EnmlOptions {
            autolink_urls: false,
            ..EnmlOptions::default()
        };
        let document =
            EnmlSanitizer::new(options).sanitize("<p>https://example.com</p>", &[], &ResourceSet::new());
        assert_eq!(body(&document), "<div>https://example.com</div>");
    }

    #[test]
    fn test_block_spacing() {
        let html = "<div>block</div>\ntrailing text";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(body(&document), "<div>block</div><div><br/></div>\ntrailing text");
    }

    #[test]
    fn test_metadata_block_and_empty_divs() {
        let html = "<p>---</p>\n<p>title: x</p>\n<p>---</p>\n<p></p><p>Body</p>";
        let document = sanitizer().sanitize(html, &[], &ResourceSet::new());
        assert_eq!(body(&document), "<div>Body</div>");
    }

    #[test]
    fn test_marker_resolves_to_en_media() {
        let resources: ResourceSet = vec![png("img/photo.png", "abc123")].into_iter().collect();
        let images = vec![image("img/photo.png", "IMAGE1", Some(100))];
        let html = "<p>x <en-media-marker id=\"IMAGE1\"/></p>";

        let document = sanitizer().sanitize(html, &images, &resources);
        assert_eq!(
            body(&document),
            "<div>x <en-media type=\"image/png\" hash=\"abc123\" width=\"100\" height=\"50\" alt=\"Alt\"/></div>"
        );
        assert!(document.used_resources.contains("img/photo.png"));
        assert!(document.missing_images.is_empty());
    }

    #[test]
    fn test_img_tag_resolved_by_file_name() {
        let resources: ResourceSet = vec![png("assets/cat.png", "feed")].into_iter().collect();
        let html = "<p><img src=\"./other/cat.png\" alt=\"cat\"></p><p><img src=\"https://example.com/x.png\"></p>";

        let document = sanitizer().sanitize(html, &[], &resources);
        assert_eq!(
            body(&document),
            "<div><en-media type=\"image/png\" hash=\"feed\" width=\"200\" height=\"100\" alt=\"cat\"/></div><div><img src=\"https://example.com/x.png\"/></div>"
        );
    }

    #[test]
    fn test_unresolved_image_is_visible() {
        let images = vec![image("missing.png", "IMAGE2", None)];
        let document = sanitizer().sanitize(
            "<p><en-media-marker id=\"IMAGE2\"/> ![[gone.png|300]]</p>",
            &images,
            &ResourceSet::new(),
        );
        assert_eq!(
            body(&document),
            "<div><span style=\"color:red;\">[Image not found: missing.png]</span> <span style=\"color:red;\">[Image not found: gone.png]</span></div>"
        );
        assert_eq!(document.missing_images, vec!["missing.png", "gone.png"]);
        assert!(document.used_resources.is_empty());
    }

    #[test]
    fn test_sanitize_is_a_fixed_point() {
        let resources: ResourceSet = vec![png("a.png", "h1")].into_iter().collect();
        let images = vec![image("a.png", "IMAGE3", None)];
        let html = "<!DOCTYPE html><html><body><h1 class=\"t\">Title</h1>\
            <p>text https://example.com/p and <b>bold</b> ]]> end</p>\
            <div>block</div>tail<en-media-marker id=\"IMAGE3\"/>\
            <ul><li><p>item</p></li></ul><table><tr><td>1</td></tr></table>\
            <style>p{}</style><iframe src=\"x\"></iframe><p></p></body></html>";

        let first = sanitizer().sanitize(html, &images, &resources);
        let second = sanitizer().sanitize(&first.content, &images, &resources);
        assert_eq!(second.content, first.content);
        assert!(first.content.contains("<en-media type=\"image/png\" hash=\"h1\""));
        assert!(!first.content.contains("iframe"));
    }
}
