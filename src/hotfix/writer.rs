//! Serialization of override records back into file content.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::hotfix::parser::{escape, COMMENT};
use crate::hotfix::record::OverrideRecord;

const GENERATED_HEADER: &str = "; Generated ini file";

/// Render every file represented in `records`.
///
/// Sections are sorted by name; records keep their input order inside a
/// section. Disabled records are dropped unless `include_disabled` is set, in
/// which case they carry a `; disabled` marker.
pub fn serialize(
    records: &[OverrideRecord],
    include_disabled: bool,
    include_timestamp: bool,
) -> BTreeMap<String, String> {
    let timestamp = include_timestamp.then(Utc::now);
    serialize_at(records, include_disabled, timestamp)
}

/// Same as [`serialize`] with an explicit generation timestamp.
pub fn serialize_at(
    records: &[OverrideRecord],
    include_disabled: bool,
    timestamp: Option<DateTime<Utc>>,
) -> BTreeMap<String, String> {
    let mut files: BTreeMap<&str, BTreeMap<&str, Vec<&OverrideRecord>>> = BTreeMap::new();
    for record in records.iter().filter(|r| include_disabled || r.enabled) {
        files
            .entry(record.file.as_str())
            .or_default()
            .entry(record.section.as_str())
            .or_default()
            .push(record);
    }

    files
        .into_iter()
        .map(|(file, sections)| {
            let mut lines = vec![GENERATED_HEADER.to_string()];
            if let Some(ts) = timestamp {
                lines.push(format!(
                    "; Auto-generated on {}",
                    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
                ));
            }
            lines.push(String::new());
            push_sections(&mut lines, sections, |record| {
                let metadata: &[&str] = if record.enabled { &[] } else { &["disabled"] };
                entry_line(record, metadata)
            });
            (file.to_string(), finish(lines))
        })
        .collect()
}

/// Render a single file, or `None` when it has no (visible) records.
pub fn serialize_file(
    records: &[OverrideRecord],
    file: &str,
    include_disabled: bool,
    include_timestamp: bool,
) -> Option<String> {
    serialize(records, include_disabled, include_timestamp).remove(file)
}

/// Sorted, de-duplicated file names.
pub fn file_ids(records: &[OverrideRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.file.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, de-duplicated section names of one file.
pub fn sections_for_file(records: &[OverrideRecord], file: &str) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.file == file)
        .map(|r| r.section.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Append `[section]` blocks, separated by one blank line. Empty sections are
/// skipped.
pub(crate) fn push_sections<'a, S, I, F>(lines: &mut Vec<String>, sections: I, render: F)
where
    S: AsRef<str>,
    I: IntoIterator<Item = (S, Vec<&'a OverrideRecord>)>,
    F: Fn(&OverrideRecord) -> String,
{
    for (name, records) in sections {
        if records.is_empty() {
            continue;
        }
        lines.push(format!("[{}]", escape(name.as_ref())));
        lines.extend(records.into_iter().map(&render));
        lines.push(String::new());
    }
}

/// `key=value`, followed by ` ; meta, meta` when there is metadata.
pub(crate) fn entry_line(record: &OverrideRecord, metadata: &[&str]) -> String {
    let mut line = format!("{}={}", escape(&record.key), escape(&record.value));
    if !metadata.is_empty() {
        line.push(' ');
        line.push(COMMENT);
        line.push(' ');
        line.push_str(&metadata.join(", "));
    }
    line
}

/// Drop the trailing blank line and newline-terminate every remaining line.
pub(crate) fn finish(mut lines: Vec<String>) -> String {
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
