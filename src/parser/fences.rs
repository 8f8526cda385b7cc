// file: src/parser/fences.rs
// description: line-anchored fenced code and backtick span detection
// reference: https://spec.commonmark.org/0.31.2/#fenced-code-blocks

use std::ops::Range;

/// A closed triple-backtick block. `range` covers the opening fence line
/// through the closing fence, excluding the closing line's newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub range: Range<usize>,
    pub language: Option<String>,
    pub content: String,
}

/// A single or double backtick span; `range` includes the backticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub range: Range<usize>,
    pub content: String,
}

pub fn find_fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }

    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let (start, line) = lines[idx];

        if let Some((ticks, language)) = opening_fence(line)
            && let Some(close) = (idx + 1..lines.len()).find(|&k| is_closing_fence(lines[k].1, ticks))
        {
            let content = lines[idx + 1..close]
                .iter()
                .map(|(_, l)| l.trim_end_matches('\r'))
                .collect::<Vec<_>>()
                .join("\n");
            let (close_start, close_line) = lines[close];

            blocks.push(FencedBlock {
                range: start..close_start + close_line.len(),
                language,
                content,
            });
            idx = close + 1;
            continue;
        }

        idx += 1;
    }

    blocks
}

fn opening_fence(line: &str) -> Option<(usize, Option<String>)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }

    let rest = &line[indent..];
    let ticks = rest.bytes().take_while(|&b| b == b'`').count();
    if ticks < 3 {
        return None;
    }

    let info = rest[ticks..].trim();
    if info.contains('`') {
        return None;
    }

    let language = info
        .split_whitespace()
        .next()
        .map(|lang| lang.to_string());
    Some((ticks, language))
}

fn is_closing_fence(line: &str, ticks: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= ticks && trimmed.bytes().all(|b| b == b'`')
}

/// Backtick spans of one or two backticks, matched against a closing run of
/// the same length. Spans never cross a blank line.
pub fn find_inline_spans(text: &str) -> Vec<InlineSpan> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {}
            _ => {
                i += 1;
                continue;
            }
        }

        let run_start = i;
        while i < len && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - run_start;
        if run > 2 {
            continue;
        }

        if let Some(close) = find_closing_run(bytes, i, run) {
            let raw = &text[i..close];
            spans.push(InlineSpan {
                range: run_start..close + run,
                content: strip_single_padding(raw).to_string(),
            });
            i = close + run;
        }
    }

    spans
}

fn find_closing_run(bytes: &[u8], from: usize, run: usize) -> Option<usize> {
    let len = bytes.len();
    let mut j = from;

    while j < len {
        if bytes[j] == b'`' {
            let start = j;
            while j < len && bytes[j] == b'`' {
                j += 1;
            }
            if j - start == run {
                return Some(start);
            }
            continue;
        }
        if bytes[j] == b'\n' && bytes.get(j + 1) == Some(&b'\n') {
            return None;
        }
        j += 1;
    }

    None
}

fn strip_single_padding(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with(' ') && raw.ends_with(' ') && !raw.trim().is_empty() {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// Byte ranges holding code: closed fenced blocks plus backtick spans found
/// between them, in ascending order.
pub fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut cursor = 0;

    for block in find_fenced_blocks(text) {
        for span in find_inline_spans(&text[cursor..block.range.start]) {
            ranges.push(span.range.start + cursor..span.range.end + cursor);
        }
        cursor = block.range.end;
        ranges.push(block.range);
    }

    for span in find_inline_spans(&text[cursor..]) {
        ranges.push(span.range.start + cursor..span.range.end + cursor);
    }

    ranges
}
