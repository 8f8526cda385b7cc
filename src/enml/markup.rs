// file: src/enml/markup.rs
// description: restricted html tokenizer used by the enml passes
// reference: https://www.w3.org/TR/xml/#sec-starttags

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENTITY: Regex =
        Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]{0,31}|#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6});").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Lowercased element name.
    pub name: String,
    /// Lowercased attribute names in source order; `None` for bare attributes.
    pub attrs: Vec<(String, Option<String>)>,
    pub closing: bool,
    pub self_closing: bool,
}

impl Tag {
    pub fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            closing: false,
            self_closing: false,
        }
    }

    pub fn close(name: &str) -> Self {
        Self {
            closing: true,
            ..Self::open(name)
        }
    }

    pub fn empty(name: &str) -> Self {
        Self {
            self_closing: true,
            ..Self::open(name)
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), Some(value.to_string())));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    pub fn is_open(&self, name: &str) -> bool {
        !self.closing && self.name == name
    }

    pub fn is_close(&self, name: &str) -> bool {
        self.closing && self.name == name
    }

    /// Canonical form: double-quoted values, bare attributes repeat their name.
    pub fn render(&self) -> String {
        if self.closing {
            return format!("</{}>", self.name);
        }

        let mut out = format!("<{}", self.name);
        for (name, value) in &self.attrs {
            let value = value.as_deref().unwrap_or(name);
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        out.push_str(if self.self_closing { "/>" } else { ">" });
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Tag(Tag),
    Comment(String),
    /// `<!DOCTYPE ...>` or `<?xml ...?>`, kept verbatim.
    Declaration(String),
    CData(String),
}

impl Token {
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Token::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, Token::Text(text) if text.trim().is_empty())
    }
}

/// Splits markup into tokens. A `<` that does not start a well-formed tag
/// stays in the surrounding text.
pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let rest = &input[i..];
        let parsed = if let Some(after) = rest.strip_prefix("<!--") {
            after
                .find("-->")
                .map(|end| (Token::Comment(after[..end].to_string()), 4 + end + 3))
        } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
            after
                .find("]]>")
                .map(|end| (Token::CData(after[..end].to_string()), 9 + end + 3))
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            rest.find('>')
                .map(|end| (Token::Declaration(rest[..=end].to_string()), end + 1))
        } else {
            parse_tag(rest).map(|(tag, len)| (Token::Tag(tag), len))
        };

        match parsed {
            Some((token, len)) => {
                if text_start < i {
                    tokens.push(Token::Text(input[text_start..i].to_string()));
                }
                tokens.push(token);
                i += len;
                text_start = i;
            }
            None => i += 1,
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(input[text_start..].to_string()));
    }

    tokens
}

pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Tag(tag) => out.push_str(&tag.render()),
            Token::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Token::Declaration(text) => out.push_str(text),
            Token::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
        }
    }
    out
}

/// Parses one tag at the start of `input` and returns it with the number of
/// bytes consumed. Unterminated tags and unterminated quoted values yield `None`.
pub fn parse_tag(input: &str) -> Option<(Tag, usize)> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }

    let mut i = 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    if !bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = input[name_start..i].to_ascii_lowercase();

    let mut attrs: Vec<(String, Option<String>)> = Vec::new();
    let mut self_closing = false;

    loop {
        i = skip_whitespace(bytes, i);
        match *bytes.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    self_closing = true;
                    i += 2;
                    break;
                }
                i += 1;
                continue;
            }
            b'=' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let attr_name = input[attr_start..i].to_ascii_lowercase();

        let mut j = skip_whitespace(bytes, i);
        let value = if bytes.get(j) == Some(&b'=') {
            j = skip_whitespace(bytes, j + 1);
            match *bytes.get(j)? {
                quote @ (b'"' | b'\'') => {
                    let close = input[j + 1..].find(quote as char)?;
                    let value = input[j + 1..j + 1 + close].to_string();
                    i = j + 1 + close + 1;
                    Some(value)
                }
                _ => {
                    let start = j;
                    while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    i = j;
                    Some(input[start..j].to_string())
                }
            }
        } else {
            None
        };

        let valid_name = attr_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
        if valid_name && !attrs.iter().any(|(existing, _)| *existing == attr_name) {
            attrs.push((attr_name, value));
        }
    }

    Some((
        Tag {
            name,
            attrs,
            closing,
            self_closing,
        },
        i,
    ))
}

/// Escapes bare `&`, `<` and `>` in text. Existing entities are kept and
/// `&nbsp;` becomes its numeric form.
pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

pub fn escape_attribute(value: &str) -> String {
    escape(value, true)
}

fn escape(value: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(c) = rest.chars().next() {
        match c {
            '&' => {
                if rest.starts_with("&nbsp;") {
                    out.push_str("&#160;");
                    rest = &rest["&nbsp;".len()..];
                    continue;
                }
                if let Some(entity) = ENTITY.find(rest) {
                    out.push_str(entity.as_str());
                    rest = &rest[entity.end()..];
                    continue;
                }
                out.push_str("&amp;");
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_')
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_mixed_markup() {
        let tokens = tokenize("<!-- c --><p class=x>a < b</p><br>");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::Comment(" c ".to_string()));
        assert_eq!(tokens[1].as_tag().unwrap().attr("class"), Some("x"));
        assert_eq!(tokens[2], Token::Text("a < b".to_string()));
        assert!(tokens[3].as_tag().unwrap().is_close("p"));
        assert!(tokens[4].as_tag().unwrap().is_open("br"));
    }

    #[test]
    fn test_parse_tag_quoting() {
        let (tag, len) = parse_tag(r#"<A HREF='say "hi"' checked data-x=1 />tail"#).unwrap();
        assert_eq!(len, r#"<A HREF='say "hi"' checked data-x=1 />"#.len());
        assert_eq!(tag.name, "a");
        assert!(tag.self_closing);
        assert_eq!(
            tag.render(),
            r#"<a href="say &quot;hi&quot;" checked="checked" data-x="1"/>"#
        );
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        assert!(parse_tag("<b and more").is_none());
        assert_eq!(tokenize("x <3 y"), vec![Token::Text("x <3 y".to_string())]);
    }

    #[test]
    fn test_declarations_and_cdata() {
        let tokens = tokenize(r#"<?xml version="1.0"?><!DOCTYPE en-note><![CDATA[raw <b>]]>"#);
        assert_eq!(
            tokens,
            vec![
                Token::Declaration(r#"<?xml version="1.0"?>"#.to_string()),
                Token::Declaration("<!DOCTYPE en-note>".to_string()),
                Token::CData("raw <b>".to_string()),
            ]
        );
    }

    #[test]
    fn test_escape_keeps_entities() {
        assert_eq!(escape_text("a & b &amp; c &#160; &nbsp; <x>"), "a &amp; b &amp; c &#160; &#160; &lt;x&gt;");
        assert_eq!(escape_text(&escape_text("Q&A <ok>")), escape_text("Q&A <ok>"));
        assert_eq!(escape_attribute(r#"a"b"#), "a&quot;b");
    }
}
