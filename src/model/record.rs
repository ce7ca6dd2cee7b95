use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::{char_len, FieldKind};

/// Latest translation of one field for one locale.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    #[serde(skip)]
    pub locale: String,

    #[serde(skip, default = "default_kind")]
    pub kind: FieldKind,

    pub translated_text: String,

    /// Fingerprint of the source text this translation was made from. Empty
    /// when the text file exists without a sidecar entry.
    #[serde(default)]
    pub source_fingerprint: String,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub over_limit: bool,

    pub timestamp: DateTime<Utc>,
}

fn default_kind() -> FieldKind {
    FieldKind::Description
}

impl TranslationRecord {
    pub fn new(
        locale: &str,
        kind: FieldKind,
        translated_text: String,
        source_fingerprint: String,
        notes: String,
        over_limit: bool,
    ) -> Self {
        Self {
            locale: locale.to_string(),
            kind,
            translated_text,
            source_fingerprint,
            notes,
            over_limit,
            timestamp: Utc::now(),
        }
    }

    pub fn is_untracked(&self) -> bool {
        self.source_fingerprint.is_empty()
    }

    /// Fresh iff made from the current source and within its limit. An
    /// over-limit record is never fresh.
    pub fn is_fresh(&self, fingerprint: &str, char_limit: usize) -> bool {
        !self.over_limit
            && self.source_fingerprint == fingerprint
            && char_len(&self.translated_text) <= char_limit
    }
}
