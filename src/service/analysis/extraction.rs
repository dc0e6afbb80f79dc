//! Recover a JSON object from free-form model output
//!
//! Candidates are tried in priority order: fenced code blocks, balanced
//! top-level objects found by a string-aware scanner, then the naive span from
//! the first `{` to the last `}`. Within each source the largest object that
//! has the schema marker as a top-level key is preferred. Each candidate is
//! parsed strictly first and again after light textual repair. The first
//! candidate that yields an object wins; if none does, the error of the
//! highest-priority candidate is reported.

use std::cmp::Reverse;

use serde_json::{Map, Value};

use super::error::ParseError;

/// Characters of context shown on each side of a parse failure
const SNIPPET_RADIUS: usize = 40;

/// Extract the object produced for a schema identified by `marker`
pub fn extract_object(text: &str, marker: &str) -> Result<Map<String, Value>, ParseError> {
    if !text.contains('{') {
        return Err(ParseError::NoJsonFound);
    }

    let candidates = candidates(text, marker);
    let mut first_error = None;

    for candidate in &candidates {
        match parse_candidate(candidate) {
            Ok(object) => return Ok(object),
            Err(e) => {
                tracing::debug!(
                    candidate_length = candidate.len(),
                    error = %e,
                    "JSON candidate rejected"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or(ParseError::NoJsonFound))
}

/// Candidate substrings in priority order, without duplicates
fn candidates<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    let mut found: Vec<&str> = Vec::new();
    let mut push = |candidate: &'a str| {
        if !found.contains(&candidate) {
            found.push(candidate);
        }
    };

    let (mut marked, unmarked): (Vec<&str>, Vec<&str>) = fenced_blocks(text)
        .into_iter()
        .filter_map(|block| select_object(&balanced_objects(block), marker))
        .partition(|c| contains_marker(c, marker));
    // blocks carrying the marker come first, largest first
    marked.sort_by_key(|c| Reverse(c.len()));
    for candidate in marked.into_iter().chain(unmarked) {
        push(candidate);
    }

    if let Some(candidate) = select_object(&balanced_objects(text), marker) {
        push(candidate);
    }

    if let Some(candidate) = naive_span(text) {
        push(candidate);
    }

    found
}

/// Contents of ``` fenced blocks; an unterminated fence runs to the end of the text
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // skip the info string (e.g. `json`) up to the end of the line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let info = &after_fence[..body_start];
        let body = if info.contains('{') {
            // fence and object on one line: ```{"a": 1}```
            after_fence
        } else {
            &after_fence[body_start..]
        };

        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }

    blocks
}

/// Balanced top-level `{...}` spans; braces inside string literals do not count
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    objects
}

/// Longest object with the marker as a top-level key, else the longest object
fn select_object<'a>(objects: &[&'a str], marker: &str) -> Option<&'a str> {
    longest(objects.iter().copied().filter(|o| contains_marker(o, marker)))
        .or_else(|| longest(objects.iter().copied()))
}

fn longest<'a>(objects: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    objects.max_by_key(|o| o.len())
}

/// Marker must be a key of the outermost object; nested keys and string values do not count
fn contains_marker(candidate: &str, marker: &str) -> bool {
    parse_candidate(candidate).is_ok_and(|object| object.contains_key(marker))
}

/// First `{` to last `}`, or to the end of the text when no `}` follows
fn naive_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    match text.rfind('}') {
        Some(end) if end > start => Some(&text[start..=end]),
        _ => Some(&text[start..]),
    }
}

fn parse_candidate(candidate: &str) -> Result<Map<String, Value>, ParseError> {
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return into_object(value);
    }

    let repaired = repair(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => into_object(value),
        Err(e) => Err(invalid_json(&repaired, &e)),
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, ParseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::NotAnObject(json_type_name(&other))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_json(text: &str, err: &serde_json::Error) -> ParseError {
    let offset = byte_offset(text, err.line(), err.column());
    ParseError::InvalidJson {
        offset,
        message: err.to_string(),
        snippet: snippet_around(text, offset, SNIPPET_RADIUS),
    }
}

/// Convert serde_json's 1-based line/column into a byte offset
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    floor_char_boundary(text, line_start + column.saturating_sub(1))
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn snippet_around(text: &str, offset: usize, radius: usize) -> String {
    let offset = floor_char_boundary(text, offset);
    let start = text[..offset]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[offset..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| offset + i)
        .unwrap_or(text.len());
    text[start..end].to_string()
}

// ============================================================================
// Repair
// ============================================================================

/// Best-effort textual fixes for near-JSON; every pass skips string literals
pub fn repair(text: &str) -> String {
    let text = normalize_smart_quotes(text);
    let text = strip_comments(&text);
    let text = strip_trailing_commas(&text);
    quote_bare_keys(&text)
}

/// Curly double quotes used as delimiters become straight quotes.
/// Curly quotes inside a straight-quoted string are content and stay.
fn normalize_smart_quotes(text: &str) -> String {
    enum Delimiter {
        Straight,
        Curly,
    }

    let mut out = String::with_capacity(text.len());
    let mut delimiter: Option<Delimiter> = None;
    let mut escaped = false;

    for ch in text.chars() {
        match delimiter {
            Some(Delimiter::Straight) => {
                out.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    delimiter = None;
                }
            }
            Some(Delimiter::Curly) => match ch {
                '\u{201C}' | '\u{201D}' => {
                    out.push('"');
                    delimiter = None;
                }
                '"' => out.push_str("\\\""),
                '\u{2018}' | '\u{2019}' => out.push('\''),
                _ => out.push(ch),
            },
            None => match ch {
                '"' => {
                    out.push('"');
                    delimiter = Some(Delimiter::Straight);
                }
                '\u{201C}' | '\u{201D}' => {
                    out.push('"');
                    delimiter = Some(Delimiter::Curly);
                }
                '\u{2018}' | '\u{2019}' => out.push('\''),
                _ => out.push(ch),
            },
        }
    }

    out
}

/// Walks text tracking straight-quoted string literals
struct Scanner {
    chars: Vec<char>,
    pos: usize,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            in_string: false,
            escaped: false,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    /// Next non-whitespace character at or after `from`
    fn next_significant(&self, from: usize) -> Option<(usize, char)> {
        self.chars[from.min(self.chars.len())..]
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(i, c)| (from + i, *c))
    }

    /// Advance one char, updating string state; returns the char consumed
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.pos += 1;
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.in_string = false;
            }
        } else if ch == '"' {
            self.in_string = true;
        }
        Some(ch)
    }
}

fn strip_comments(text: &str) -> String {
    let mut scanner = Scanner::new(text);
    let mut out = String::with_capacity(text.len());

    while let Some(ch) = scanner.peek(0) {
        if !scanner.in_string && ch == '/' {
            match scanner.peek(1) {
                Some('/') => {
                    while let Some(c) = scanner.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        scanner.pos += 1;
                    }
                    continue;
                }
                Some('*') => {
                    scanner.pos += 2;
                    while scanner.peek(0).is_some()
                        && !(scanner.peek(0) == Some('*') && scanner.peek(1) == Some('/'))
                    {
                        scanner.pos += 1;
                    }
                    scanner.pos = (scanner.pos + 2).min(scanner.chars.len());
                    continue;
                }
                _ => {}
            }
        }
        if let Some(c) = scanner.bump() {
            out.push(c);
        }
    }

    out
}

fn strip_trailing_commas(text: &str) -> String {
    let mut scanner = Scanner::new(text);
    let mut out = String::with_capacity(text.len());

    while let Some(ch) = scanner.peek(0) {
        if !scanner.in_string
            && ch == ','
            && matches!(scanner.next_significant(scanner.pos + 1), Some((_, '}' | ']')))
        {
            scanner.pos += 1;
            continue;
        }
        if let Some(c) = scanner.bump() {
            out.push(c);
        }
    }

    out
}

fn is_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '-')
}

/// Quote identifier keys following `{` or `,` when a `:` comes next
fn quote_bare_keys(text: &str) -> String {
    let mut scanner = Scanner::new(text);
    let mut out = String::with_capacity(text.len() + 16);
    let mut expect_key = false;

    while let Some(ch) = scanner.peek(0) {
        if scanner.in_string {
            if let Some(c) = scanner.bump() {
                out.push(c);
            }
            continue;
        }

        if expect_key && is_key_start(ch) {
            let start = scanner.pos;
            let mut end = start;
            while scanner.chars.get(end).is_some_and(|c| is_key_char(*c)) {
                end += 1;
            }
            let key: String = scanner.chars[start..end].iter().collect();
            if matches!(scanner.next_significant(end), Some((_, ':'))) {
                out.push('"');
                out.push_str(&key);
                out.push('"');
            } else {
                out.push_str(&key);
            }
            scanner.pos = end;
            expect_key = false;
            continue;
        }

        if !ch.is_whitespace() {
            expect_key = matches!(ch, '{' | ',');
        }
        if let Some(c) = scanner.bump() {
            out.push(c);
        }
    }

    out
}
