//! Merging override records into upstream file content.

use std::collections::{HashMap, HashSet};

use crate::hotfix::parser::parse;
use crate::hotfix::record::{OverrideRecord, RecordId};
use crate::hotfix::writer::{entry_line, finish, push_sections, serialize_at};

/// Sections in first-encounter order.
#[derive(Default)]
struct SectionMap<'a> {
    order: Vec<(String, Vec<&'a OverrideRecord>)>,
    index: HashMap<String, usize>,
}

impl<'a> SectionMap<'a> {
    fn from_records(records: impl IntoIterator<Item = &'a OverrideRecord>) -> Self {
        let mut map = Self::default();
        for record in records {
            map.slot(&record.section).push(record);
        }
        map
    }

    /// Records of `section`, creating it at the end when missing.
    fn slot(&mut self, section: &str) -> &mut Vec<&'a OverrideRecord> {
        let idx = match self.index.get(section) {
            Some(idx) => *idx,
            None => {
                self.order.push((section.to_string(), Vec::new()));
                self.index.insert(section.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        &mut self.order[idx].1
    }
}

/// Merge `overrides` into `upstream` content for `file_id`.
///
/// Per overridden section, upstream entries whose key is overridden are
/// dropped and the override entries appended after the remaining ones.
/// Sections only present in the overrides are appended at the end. Disabled
/// overrides are ignored; with nothing to apply the upstream content is
/// returned untouched.
pub fn merge(upstream: &str, overrides: &[OverrideRecord], file_id: &str) -> String {
    let enabled: Vec<&OverrideRecord> = overrides.iter().filter(|r| r.enabled).collect();
    if enabled.is_empty() {
        return upstream.to_string();
    }

    let upstream_records = parse(upstream, file_id);
    let mut sections = SectionMap::from_records(&upstream_records);

    for (name, section_overrides) in SectionMap::from_records(enabled).order {
        let overridden: HashSet<&str> = section_overrides.iter().map(|r| r.key.as_str()).collect();
        let slot = sections.slot(&name);
        slot.retain(|r| !overridden.contains(r.key.as_str()));
        slot.extend(section_overrides);
    }

    let mut lines = Vec::new();
    push_sections(&mut lines, sections.order, |record| {
        let mut metadata = Vec::new();
        if !record.enabled {
            metadata.push("disabled".to_string());
        }
        if let Some(source) = &record.source_id {
            metadata.push(format!("source:{source}"));
        }
        let metadata: Vec<&str> = metadata.iter().map(String::as_str).collect();
        entry_line(record, &metadata)
    });
    finish(lines)
}

/// Layer two override files. Entries of `primary` win over entries of
/// `secondary` with the same `(file, section, key)`.
///
/// `secondary_file` defaults to `primary_file`. When the two differ, each
/// file's rendering is introduced by a `; Content from <file>` line.
pub fn combine(
    primary: &str,
    secondary: &str,
    primary_file: &str,
    secondary_file: Option<&str>,
) -> String {
    let secondary_file = secondary_file.unwrap_or(primary_file);
    let primary_records = parse(primary, primary_file);
    let secondary_records = parse(secondary, secondary_file);

    let taken: HashSet<RecordId<'_>> = primary_records.iter().map(|r| r.identity()).collect();
    let combined: Vec<OverrideRecord> = primary_records
        .iter()
        .chain(
            secondary_records
                .iter()
                .filter(|r| !taken.contains(&r.identity())),
        )
        .cloned()
        .collect();

    let mut files = serialize_at(&combined, true, None);
    if primary_file == secondary_file {
        return files.remove(primary_file).unwrap_or_default();
    }

    files
        .into_iter()
        .map(|(file, content)| format!("; Content from {file}\n{content}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_overrides_return_upstream_verbatim() {
        let upstream = "; upstream comment\n[A]\nk=1\n\n\n";
        assert_eq!(merge(upstream, &[], "f"), upstream);
    }

    #[test]
    fn test_only_disabled_overrides_return_upstream_verbatim() {
        let upstream = "[A]\nk=1";
        let overrides = vec![OverrideRecord::new("f", "A", "k", "2").disabled()];
        assert_eq!(merge(upstream, &overrides, "f"), upstream);
    }

    #[test]
    fn test_end_to_end_example() {
        let overrides = vec![OverrideRecord::new("file.ini", "Core", "Enabled", "false")];
        assert_eq!(
            merge("[Core]\nEnabled=true\n", &overrides, "file.ini"),
            "[Core]\nEnabled=false\n"
        );
    }

    #[test]
    fn test_override_wins_and_keeps_other_upstream_keys() {
        let upstream = "[A]\nk=1\nother=x\n[B]\ny=2\n";
        let overrides = vec![OverrideRecord::new("f", "A", "k", "2")];
        assert_eq!(
            merge(upstream, &overrides, "f"),
            "[A]\nother=x\nk=2\n\n[B]\ny=2\n"
        );
    }

    #[test]
    fn test_new_section_is_created_at_end() {
        let overrides = vec![OverrideRecord::new("f", "B", "x", "1")];
        assert_eq!(merge("[A]\nk=1\n", &overrides, "f"), "[A]\nk=1\n\n[B]\nx=1\n");
    }

    #[test]
    fn test_upstream_duplicates_are_kept() {
        let upstream = "[A]\n+Item=1\n+Item=2\n";
        let overrides = vec![OverrideRecord::new("f", "A", "Other", "x")];
        assert_eq!(
            merge(upstream, &overrides, "f"),
            "[A]\n+Item=1\n+Item=2\nOther=x\n"
        );
    }

    #[test]
    fn test_source_marker_is_emitted() {
        let overrides = vec![OverrideRecord::new("f", "A", "k", "v").with_source("ops")];
        assert_eq!(merge("", &overrides, "f"), "[A]\nk=v ; source:ops\n");
    }

    #[test]
    fn test_merge_is_deterministic() {
        let upstream = "[Z]\na=1\n[M]\nb=2\n[A]\nc=3\n";
        let overrides = vec![
            OverrideRecord::new("f", "Q", "q", "1"),
            OverrideRecord::new("f", "M", "b", "9"),
            OverrideRecord::new("f", "C", "c", "1"),
        ];
        let first = merge(upstream, &overrides, "f");
        assert_eq!(first, merge(upstream, &overrides, "f"));
        assert_eq!(first, "[Z]\na=1\n\n[M]\nb=9\n\n[A]\nc=3\n\n[Q]\nq=1\n\n[C]\nc=1\n");
    }

    #[test]
    fn test_combine_primary_wins() {
        let primary = "[A]\nk=primary\n";
        let secondary = "[A]\nk=secondary\nj=kept\n[B]\nx=1\n";
        assert_eq!(
            combine(primary, secondary, "f", None),
            "; Generated ini file\n\n[A]\nk=primary\nj=kept\n\n[B]\nx=1\n"
        );
    }

    #[test]
    fn test_combine_distinct_files() {
        let combined = combine("[A]\nk=1\n", "[A]\nk=2\n", "One.ini", Some("Two.ini"));
        assert_eq!(
            combined,
            "; Content from One.ini\n; Generated ini file\n\n[A]\nk=1\n\n\
             ; Content from Two.ini\n; Generated ini file\n\n[A]\nk=2\n"
        );
    }
}
