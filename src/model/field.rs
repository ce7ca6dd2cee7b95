use serde::{Deserialize, Serialize};
use std::fmt;

/// The four localized metadata slots of a store version.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Description,
    WhatsNew,
    PromotionalText,
    Keywords,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::WhatsNew,
        FieldKind::Description,
        FieldKind::PromotionalText,
        FieldKind::Keywords,
    ];

    /// File holding this field inside a locale directory.
    pub fn file_name(self) -> &'static str {
        match self {
            FieldKind::Description => "desc.txt",
            FieldKind::WhatsNew => "new.txt",
            FieldKind::PromotionalText => "promo.txt",
            FieldKind::Keywords => "keywords.txt",
        }
    }

    /// Short name accepted by `--fields`.
    pub fn short_name(self) -> &'static str {
        match self {
            FieldKind::Description => "desc",
            FieldKind::WhatsNew => "new",
            FieldKind::PromotionalText => "promo",
            FieldKind::Keywords => "keywords",
        }
    }

    /// Attribute name on the store's localization resource.
    pub fn remote_attribute(self) -> &'static str {
        match self {
            FieldKind::Description => "description",
            FieldKind::WhatsNew => "whatsNew",
            FieldKind::PromotionalText => "promotionalText",
            FieldKind::Keywords => "keywords",
        }
    }

    pub fn char_limit(self) -> usize {
        match self {
            FieldKind::Description | FieldKind::WhatsNew => 4000,
            FieldKind::PromotionalText => 170,
            FieldKind::Keywords => 100,
        }
    }

    /// Human description handed to the translator.
    pub fn text_type(self) -> &'static str {
        match self {
            FieldKind::Description => "App Description",
            FieldKind::WhatsNew => "What's New / Release Notes",
            FieldKind::PromotionalText => "Promotional Text",
            FieldKind::Keywords => "App Store Keywords (comma-separated search terms)",
        }
    }

    /// Accepts a short name (`promo`), a file name (`promo.txt`) or the
    /// remote attribute name (`promotionalText`).
    pub fn parse(s: &str) -> Option<FieldKind> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.short_name() == s || k.file_name() == s || k.remote_attribute() == s)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Length as the store counts it: Unicode scalar values, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// English source text for one field, loaded fresh each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    pub kind: FieldKind,
    pub text: String,
    pub char_limit: usize,
}

impl SourceField {
    pub fn new(kind: FieldKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            char_limit: kind.char_limit(),
        }
    }
}
