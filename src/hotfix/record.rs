//! Hotfix record type.

use serde::{Deserialize, Serialize};

/// A single override entry: one `key=value` line inside a `[section]` of a
/// named configuration file.
///
/// Identity is `(file, section, key)`. Disabled records are kept for audit and
/// toggling but never emitted by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    /// Configuration file the record belongs to (e.g. `DefaultEngine.ini`).
    pub file: String,
    /// Section name, without brackets.
    pub section: String,
    pub key: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upstream's storage name for the file, when it differs from `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_file: Option<String>,
    /// Who authored the override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl OverrideRecord {
    /// Create an enabled record.
    pub fn new(
        file: impl Into<String>,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            section: section.into(),
            key: key.into(),
            value: value.into(),
            enabled: true,
            unique_file: None,
            source_id: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_unique_file(mut self, unique_file: impl Into<String>) -> Self {
        self.unique_file = Some(unique_file.into());
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Check that the record renders back as exactly one line in exactly one
    /// section.
    pub fn validate(&self) -> Result<(), String> {
        for (field, text) in [
            ("file", self.file.as_str()),
            ("section", self.section.as_str()),
            ("key", self.key.as_str()),
        ] {
            if text.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        let fields = [
            ("file", Some(self.file.as_str())),
            ("section", Some(self.section.as_str())),
            ("key", Some(self.key.as_str())),
            ("value", Some(self.value.as_str())),
            ("unique_file", self.unique_file.as_deref()),
            ("source_id", self.source_id.as_deref()),
        ];
        for (field, text) in fields {
            if text.is_some_and(|t| t.contains(['\r', '\n'])) {
                return Err(format!("{field} must not contain line breaks"));
            }
        }
        if self.key.contains('=') {
            return Err(format!("key '{}' must not contain '='", self.key));
        }
        if self.key.trim_start().starts_with('[') {
            return Err(format!("key '{}' must not start with '['", self.key));
        }
        if self.section.contains(['[', ']']) {
            return Err(format!("section '{}' must not contain brackets", self.section));
        }
        if self.source_id.as_deref().is_some_and(|id| id.contains(',')) {
            return Err("source_id must not contain ','".to_string());
        }
        Ok(())
    }

    /// Borrowed `(file, section, key)` identity.
    pub fn identity(&self) -> RecordId<'_> {
        RecordId {
            file: &self.file,
            section: &self.section,
            key: &self.key,
        }
    }

    /// True when this record refers to the given file id, either by name or
    /// by upstream unique name.
    pub fn belongs_to(&self, file_id: &str) -> bool {
        self.file == file_id || self.unique_file.as_deref() == Some(file_id)
    }
}

/// Borrowed identity of an [`OverrideRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId<'a> {
    pub file: &'a str,
    pub section: &'a str,
    pub key: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_value() {
        let a = OverrideRecord::new("Game.ini", "Core", "Enabled", "true");
        let b = OverrideRecord::new("Game.ini", "Core", "Enabled", "false").disabled();
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_belongs_to_unique_file() {
        let record = OverrideRecord::new("Game.ini", "Core", "Enabled", "true")
            .with_unique_file("a1b2c3");
        assert!(record.belongs_to("Game.ini"));
        assert!(record.belongs_to("a1b2c3"));
        assert!(!record.belongs_to("Engine.ini"));
    }

    #[test]
    fn test_validate_accepts_plain_record() {
        let record = OverrideRecord::new("Game.ini", "Core", "List", "a=b;c").with_source("ops");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_structure_breaking_text() {
        let base = OverrideRecord::new("Game.ini", "Core", "Enabled", "false");
        let cases = [
            OverrideRecord { value: "false\n[Evil]\nAdmin=true".into(), ..base.clone() },
            OverrideRecord { value: "x\ry".into(), ..base.clone() },
            OverrideRecord { key: "a=b".into(), ..base.clone() },
            OverrideRecord { key: "[a".into(), ..base.clone() },
            OverrideRecord { section: "Core]\n[Evil".into(), ..base.clone() },
            OverrideRecord { section: "Co]re".into(), ..base.clone() },
            OverrideRecord { section: " ".into(), ..base.clone() },
            OverrideRecord { file: "Game.ini\n".into(), ..base.clone() },
            base.clone().with_source("ops\nx"),
            base.clone().with_source("ops, disabled"),
        ];
        for record in cases {
            assert!(record.validate().is_err(), "{record:?} should be rejected");
        }
    }

    #[test]
    fn test_deserialize_defaults_enabled() {
        let record: OverrideRecord = serde_json::from_str(
            r#"{"file":"Game.ini","section":"Core","key":"Enabled","value":"false"}"#,
        )
        .unwrap();
        assert!(record.enabled);
        assert!(record.unique_file.is_none());
    }
}
