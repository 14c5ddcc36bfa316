//! Line-oriented parser for override files.
//!
//! # Format
//! ```text
//! ; comment
//! [Section]
//! Key=Value ; disabled, source:ops
//! ```
//!
//! Parsing is best effort: lines that cannot be understood are skipped and
//! never abort the whole file.

use crate::hotfix::record::OverrideRecord;

/// Comment marker; everything after it on a line is metadata.
pub const COMMENT: char = ';';

const ESCAPED_COMMENT: &str = "\\;";
const DISABLED_TOKEN: &str = "disabled";
const SOURCE_PREFIXES: [&str; 2] = ["source:", "account:"];

/// Parse override file content into records tagged with `file_id`.
pub fn parse(content: &str, file_id: &str) -> Vec<OverrideRecord> {
    let mut records = Vec::new();
    let mut section: Option<String> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
            continue;
        }

        let (body, metadata) = split_comment(trimmed);
        let body = body.trim();

        if body.starts_with('[') && body.ends_with(']') && body.len() >= 2 {
            let name = body[1..body.len() - 1].trim();
            // `[]` closes the current section without opening a new one.
            section = (!name.is_empty()).then(|| unescape(name));
            continue;
        }

        let Some(section) = section.as_deref() else {
            continue;
        };

        if let Some(record) = parse_entry(body, metadata, file_id, section) {
            records.push(record);
        }
    }

    records
}

/// Parse one `key=value` body with its optional trailing metadata.
///
/// Returns `None` when the body has no `=`.
pub fn parse_entry(
    body: &str,
    metadata: Option<&str>,
    file_id: &str,
    section: &str,
) -> Option<OverrideRecord> {
    let (key, value) = body.split_once('=')?;
    let mut record = OverrideRecord::new(
        file_id,
        section,
        unescape(key.trim()),
        unescape(value.trim()),
    );

    if let Some(metadata) = metadata {
        apply_metadata(&mut record, metadata);
    }

    Some(record)
}

/// Split a line at its first unescaped comment marker.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut escaped = false;
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            b'\\' => escaped = !escaped,
            b';' if !escaped => return (&line[..idx], Some(&line[idx + 1..])),
            _ => escaped = false,
        }
    }
    (line, None)
}

fn apply_metadata(record: &mut OverrideRecord, metadata: &str) {
    for token in metadata.split(',').map(str::trim) {
        if token == DISABLED_TOKEN {
            record.enabled = false;
            continue;
        }
        for prefix in SOURCE_PREFIXES {
            if let Some(id) = token.strip_prefix(prefix) {
                let id = id.trim();
                if !id.is_empty() {
                    record.source_id = Some(id.to_string());
                }
            }
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace(ESCAPED_COMMENT, ";")
}

/// Escape literal comment markers so the text survives a parse.
pub(crate) fn escape(text: &str) -> String {
    text.replace(COMMENT, ESCAPED_COMMENT)
}
