//! In-process YAML field editor.
//!
//! Documents are selected by evaluating a key path with `serde_yaml`, but the
//! edit itself is applied to the raw text line by line so that comments,
//! blank lines, key order and quoting elsewhere in the file survive untouched.
//! Only block-style mappings along the field path are supported.

use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde_yaml::Value;

use crate::config::PatchConfig;
use crate::error::{Result, WatchError};
use crate::patch::{ConfigPatcher, PatchOutcome};

/// `indent`, `key` (plain or quoted) and optional `rest` after `key:`.
const KEY_LINE_PATTERN: &str = r##"^( *)("(?:[^"\\]|\\.)*"|'(?:[^']|'')*'|[^\s'"#\-\[\]{}&*!|>%@`?,:][^:#]*?)[ \t]*:(?:[ \t]+(.*))?$"##;

/// Result of patching a YAML stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPatch {
    pub text: String,
    /// Number of documents whose selector matched and were edited
    pub documents: usize,
}

/// Set `field` to `value` in every document of `text` whose `selector` path
/// holds the string `name`.
///
/// # Arguments
/// * `text` - Multi-document YAML stream
/// * `selector` - Key path compared against `name`, e.g. `["metadata", "name"]`
/// * `field` - Key path assigned `value`, created when missing
///
/// # Returns
/// * `Ok(StreamPatch)` - The new text; unchanged when no document matched
/// * `Err` - If a document cannot be parsed or the field path crosses a
///   non-mapping value
pub fn patch_stream(
    text: &str,
    selector: &[String],
    field: &[String],
    name: &str,
    value: &str,
) -> Result<StreamPatch> {
    if field.is_empty() {
        return Err(WatchError::patch("field path is empty"));
    }

    let key_re = Regex::new(KEY_LINE_PATTERN)
        .map_err(|e| WatchError::patch(format!("invalid key pattern: {}", e)))?;

    let mut segments = split_documents(text);
    let mut documents = 0;

    for (index, segment) in segments.iter_mut().enumerate() {
        let body = segment.lines.concat();
        if !segment.lines.iter().any(|l| is_significant(split_eol(l).0)) {
            continue;
        }

        let parsed: Value = serde_yaml::from_str(&body).map_err(|e| {
            WatchError::patch(format!("document {} is not valid YAML: {}", index + 1, e))
        })?;
        if lookup(&parsed, selector).and_then(Value::as_str) != Some(name) {
            continue;
        }

        let mut editor = DocumentEditor {
            lines: std::mem::take(&mut segment.lines),
            key_re: &key_re,
        };
        editor.set(field, value).map_err(|e| match e {
            WatchError::Patch(msg) => {
                WatchError::patch(format!("document {} ({}): {}", index + 1, name, msg))
            }
            other => other,
        })?;

        let edited = editor.lines.concat();
        let reparsed: Value = serde_yaml::from_str(&edited).map_err(|e| {
            WatchError::patch(format!("edit left document {} invalid: {}", index + 1, e))
        })?;
        if lookup(&reparsed, field).and_then(Value::as_str) != Some(value) {
            return Err(WatchError::patch(format!(
                "edit of document {} did not set {}",
                index + 1,
                field.join(".")
            )));
        }

        segment.lines = editor.lines;
        documents += 1;
    }

    let text = segments
        .iter()
        .map(|s| format!("{}{}", s.separator.as_deref().unwrap_or(""), s.lines.concat()))
        .collect();

    Ok(StreamPatch { text, documents })
}

fn lookup<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key.as_str()))
}

/// One document of a stream plus the `---` line that opened it.
struct Segment {
    separator: Option<String>,
    lines: Vec<String>,
}

fn split_documents(text: &str) -> Vec<Segment> {
    let mut segments = vec![Segment {
        separator: None,
        lines: Vec::new(),
    }];

    for line in text.split_inclusive('\n') {
        let content = split_eol(line).0;
        if is_document_marker(content) {
            segments.push(Segment {
                separator: Some(line.to_string()),
                lines: Vec::new(),
            });
        } else if let Some(current) = segments.last_mut() {
            current.lines.push(line.to_string());
        }
    }

    segments
}

fn is_document_marker(content: &str) -> bool {
    let trimmed = content.trim_end();
    trimmed == "---" || trimmed == "..." || trimmed.starts_with("--- ")
}

fn split_eol(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn indent_of(content: &str) -> usize {
    content.len() - content.trim_start_matches(' ').len()
}

/// Lines that carry YAML content: not blank, not comments, not directives.
fn is_significant(content: &str) -> bool {
    let trimmed = content.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#') && !content.starts_with('%')
}

fn is_sequence_item(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed == "-" || trimmed.starts_with("- ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Plain,
    Double,
    Single,
}

/// Scalar style of the current value (`None` when empty) and whatever
/// follows it on the line.
fn split_scalar(rest: &str) -> Result<(Option<Quote>, String)> {
    if rest.trim().is_empty() {
        return Ok((None, String::new()));
    }
    if rest.starts_with('#') {
        return Ok((None, format!(" {}", rest)));
    }

    let end = match rest.chars().next() {
        Some('"') => {
            let mut escaped = false;
            let close = rest.char_indices().skip(1).find(|&(_, c)| {
                if escaped {
                    escaped = false;
                    false
                } else if c == '\\' {
                    escaped = true;
                    false
                } else {
                    c == '"'
                }
            });
            match close {
                Some((i, _)) => return Ok((Some(Quote::Double), rest[i + 1..].to_string())),
                None => return Err(WatchError::patch("multi-line quoted scalars are not supported")),
            }
        }
        Some('\'') => {
            let bytes = rest.as_bytes();
            let mut i = 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    return Ok((Some(Quote::Single), rest[i + 1..].to_string()));
                }
                i += 1;
            }
            return Err(WatchError::patch("multi-line quoted scalars are not supported"));
        }
        Some('{') | Some('[') => {
            return Err(WatchError::patch("flow-style collections are not supported"))
        }
        Some('|') | Some('>') => return Err(WatchError::patch("block scalars are not supported")),
        Some('&') | Some('*') | Some('!') => {
            return Err(WatchError::patch("anchors, aliases and tags are not supported"))
        }
        _ => [" #", "\t#"]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min()
            .unwrap_or(rest.len()),
    };

    let value_len = rest[..end].trim_end().len();
    Ok((Some(Quote::Plain), rest[value_len..].to_string()))
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Whether `value` written unquoted reads back as the same string.
fn reads_back_as_plain(value: &str) -> bool {
    if value.is_empty() || value.contains('\n') || value.trim() != value {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(s)) if s == value)
}

fn render_scalar(value: &str, quote: Option<Quote>) -> String {
    match quote {
        Some(Quote::Double) => double_quote(value),
        Some(Quote::Single) if !value.contains('\n') => format!("'{}'", value.replace('\'', "''")),
        _ if reads_back_as_plain(value) => value.to_string(),
        _ => double_quote(value),
    }
}

fn unquote_key(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    } else if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        inner.replace("''", "'")
    } else {
        raw.trim_end().to_string()
    }
}

/// A `key:` line: its key and the byte offset where the value starts.
struct KeyLine {
    key: String,
    value_start: Option<usize>,
}

struct DocumentEditor<'r> {
    lines: Vec<String>,
    key_re: &'r Regex,
}

impl DocumentEditor<'_> {
    fn content(&self, i: usize) -> &str {
        split_eol(&self.lines[i]).0
    }

    fn significant(&self, i: usize) -> bool {
        is_significant(self.content(i))
    }

    fn indent(&self, i: usize) -> usize {
        indent_of(self.content(i))
    }

    fn key_line(&self, i: usize) -> Option<KeyLine> {
        let caps = self.key_re.captures(self.content(i))?;
        Some(KeyLine {
            key: unquote_key(caps.get(2)?.as_str()),
            value_start: caps.get(3).map(|m| m.start()),
        })
    }

    fn rest(&self, i: usize, line: &KeyLine) -> String {
        line.value_start
            .map(|start| self.content(i)[start..].to_string())
            .unwrap_or_default()
    }

    fn first_significant(&self, start: usize, end: usize) -> Option<usize> {
        (start..end).find(|&i| self.significant(i))
    }

    fn last_significant(&self, start: usize, end: usize) -> Option<usize> {
        (start..end).rev().find(|&i| self.significant(i))
    }

    /// End (exclusive) of the block owned by the key on line `i`.
    fn block_end(&self, i: usize) -> usize {
        let indent = self.indent(i);
        (i + 1..self.lines.len())
            .find(|&j| {
                self.significant(j)
                    && (self.indent(j) < indent
                        || (self.indent(j) == indent && !is_sequence_item(self.content(j))))
            })
            .unwrap_or(self.lines.len())
    }

    fn find_child(&self, start: usize, end: usize, key: &str) -> Option<usize> {
        let child_indent = self.indent(self.first_significant(start, end)?);
        (start..end).find(|&i| {
            self.significant(i)
                && self.indent(i) == child_indent
                && self.key_line(i).is_some_and(|line| line.key == key)
        })
    }

    fn eol(&self) -> &'static str {
        if self.lines.iter().any(|l| l.ends_with("\r\n")) {
            "\r\n"
        } else {
            "\n"
        }
    }

    fn set(&mut self, field: &[String], value: &str) -> Result<()> {
        let mut start = 0;
        let mut end = self.lines.len();
        let mut parent = None;

        for (depth, key) in field.iter().enumerate() {
            let Some(i) = self.find_child(start, end, key) else {
                return self.insert_path(parent, start, end, &field[depth..], value);
            };
            let line = self
                .key_line(i)
                .ok_or_else(|| WatchError::patch(format!("cannot read key '{}'", key)))?;
            let child_end = self.block_end(i);
            let (quote, _) = split_scalar(&self.rest(i, &line))?;

            if depth + 1 == field.len() {
                if quote.is_none() && self.first_significant(i + 1, child_end).is_some() {
                    return Err(WatchError::patch(format!("'{}' is not a scalar", key)));
                }
                return self.replace_value(i, &line, value);
            }

            if quote.is_some() {
                return Err(WatchError::patch(format!("'{}' is not a mapping", key)));
            }
            parent = Some(i);
            start = i + 1;
            end = child_end;
        }

        Ok(())
    }

    fn replace_value(&mut self, i: usize, line: &KeyLine, value: &str) -> Result<()> {
        let (content, eol) = split_eol(&self.lines[i]);
        let (prefix, rest) = match line.value_start {
            Some(start) => (content[..start].to_string(), &content[start..]),
            None => (format!("{} ", content.trim_end()), ""),
        };
        let (quote, trailing) = split_scalar(rest)?;
        let updated = format!("{}{}{}{}", prefix, render_scalar(value, quote), trailing, eol);
        self.lines[i] = updated;
        Ok(())
    }

    /// Create the missing `keys` below `parent` (or at top level).
    fn insert_path(
        &mut self,
        parent: Option<usize>,
        start: usize,
        end: usize,
        keys: &[String],
        value: &str,
    ) -> Result<()> {
        let first_child = self.first_significant(start, end);
        if let Some(first) = first_child {
            if is_sequence_item(self.content(first)) {
                return Err(WatchError::patch(format!(
                    "cannot add '{}' to a sequence",
                    keys[0]
                )));
            }
        }

        let indent = match (first_child, parent) {
            (Some(first), _) => self.indent(first),
            (None, Some(p)) => self.indent(p) + 2,
            (None, None) => 0,
        };
        let at = match (self.last_significant(start, end), parent) {
            (Some(last), _) => last + 1,
            (None, Some(p)) => p + 1,
            (None, None) => self.lines.len(),
        };

        let eol = self.eol();
        let mut last_eol = eol;
        if at > 0 && split_eol(&self.lines[at - 1]).1.is_empty() {
            self.lines[at - 1].push_str(eol);
            last_eol = "";
        }

        let new_lines: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(depth, key)| {
                let pad = " ".repeat(indent + 2 * depth);
                let key = render_scalar(key, None);
                if depth + 1 == keys.len() {
                    format!("{}{}: {}{}", pad, key, render_scalar(value, None), last_eol)
                } else {
                    format!("{}{}:{}", pad, key, eol)
                }
            })
            .collect();

        self.lines.splice(at..at, new_lines);
        Ok(())
    }
}

/// Config patcher that edits a YAML file in place.
pub struct YamlFieldPatcher {
    file: PathBuf,
    selector: Vec<String>,
    field: Vec<String>,
}

impl YamlFieldPatcher {
    pub fn new(file: impl Into<PathBuf>, selector: Vec<String>, field: Vec<String>) -> Self {
        YamlFieldPatcher {
            file: file.into(),
            selector,
            field,
        }
    }

    pub fn from_config(config: &PatchConfig) -> Self {
        Self::new(&config.file, config.selector.clone(), config.field.clone())
    }
}

impl ConfigPatcher for YamlFieldPatcher {
    fn apply(&self, service: &str, tag: &str) -> Result<PatchOutcome> {
        let text = fs::read_to_string(&self.file).map_err(|e| {
            WatchError::patch(format!("cannot read {}: {}", self.file.display(), e))
        })?;

        let patched = patch_stream(&text, &self.selector, &self.field, service, tag)?;
        if patched.documents == 0 {
            return Ok(PatchOutcome::NoMatchingDocument);
        }

        fs::write(&self.file, patched.text).map_err(|e| {
            WatchError::patch(format!("cannot write {}: {}", self.file.display(), e))
        })?;
        Ok(PatchOutcome::Updated(patched.documents))
    }
}
