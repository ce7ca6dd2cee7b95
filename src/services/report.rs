use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::field::FieldKind;

const RULE: &str = "==================================================";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslateStatus {
    Translated { chars: usize },
    Skipped { reason: String },
    OverLimit { chars: usize, limit: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateItem {
    pub locale: String,
    pub field: FieldKind,
    #[serde(flatten)]
    pub status: TranslateStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslateSummary {
    pub items: Vec<TranslateItem>,
    /// Backend calls issued across the run.
    pub backend_calls: usize,
}

impl TranslateSummary {
    pub fn push(&mut self, locale: &str, field: FieldKind, status: TranslateStatus) {
        self.items.push(TranslateItem {
            locale: locale.to_string(),
            field,
            status,
        });
    }

    /// Over-limit fields count as failures: the text was written but the store
    /// will reject it.
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| {
            matches!(
                i.status,
                TranslateStatus::Failed { .. } | TranslateStatus::OverLimit { .. }
            )
        })
    }

    pub fn count(&self, pred: impl Fn(&TranslateStatus) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.status)).count()
    }

    pub fn status_of(&self, locale: &str, field: FieldKind) -> Option<&TranslateStatus> {
        self.items
            .iter()
            .find(|i| i.locale == locale && i.field == field)
            .map(|i| &i.status)
    }
}

impl fmt::Display for TranslateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}\nTRANSLATION SUMMARY\n{RULE}")?;

        let mut translated = Vec::new();
        let mut skipped = Vec::new();
        let mut over = Vec::new();
        let mut failed = Vec::new();

        for i in &self.items {
            let key = format!("{}/{}", i.locale, i.field.file_name());
            match &i.status {
                TranslateStatus::Translated { chars } => translated.push(format!("{key} ({chars} chars)")),
                TranslateStatus::Skipped { reason } => skipped.push(format!("{key}: {reason}")),
                TranslateStatus::OverLimit { chars, limit } => over.push(format!("{key}: {chars}/{limit} chars")),
                TranslateStatus::Failed { error } => failed.push(format!("{key}: {error}")),
            }
        }

        write_section(f, "TRANSLATED", translated)?;
        write_section(f, "SKIPPED", skipped)?;
        write_section(f, "OVER LIMIT", over)?;
        write_section(f, "FAILED", failed)?;
        write!(f, "\n{RULE}")
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, lines: Vec<String>) -> fmt::Result {
    if lines.is_empty() {
        return writeln!(f, "\n{title}: None");
    }
    writeln!(f, "\n{title} ({}):", lines.len())?;
    for l in lines {
        writeln!(f, "  - {l}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlFixStatus {
    Updated,
    AlreadyCorrect,
    NoUrls,
    Missing,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UrlFixSummary {
    pub items: Vec<(String, UrlFixStatus)>,
}

impl UrlFixSummary {
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|(_, s)| *s == UrlFixStatus::Failed)
    }
}

impl fmt::Display for UrlFixSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}\nURL FIX SUMMARY\n{RULE}")?;
        for (title, wanted) in [
            ("UPDATED", UrlFixStatus::Updated),
            ("ALREADY CORRECT", UrlFixStatus::AlreadyCorrect),
            ("NO URLS", UrlFixStatus::NoUrls),
            ("MISSING desc.txt", UrlFixStatus::Missing),
            ("ERROR", UrlFixStatus::Failed),
        ] {
            let names: Vec<&str> = self
                .items
                .iter()
                .filter(|(_, s)| *s == wanted)
                .map(|(l, _)| l.as_str())
                .collect();
            if !names.is_empty() {
                writeln!(f, "\n{title} ({}): {}", names.len(), names.join(", "))?;
            }
        }
        write!(f, "\n{RULE}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTally {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of pushing one platform version.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub platform: String,
    pub version: String,
    pub tallies: BTreeMap<FieldKind, SyncTally>,
    pub failures: Vec<String>,
    /// Set when the platform could not be processed at all.
    pub aborted: Option<String>,
}

impl SyncSummary {
    pub fn new(platform: &str, version: &str) -> Self {
        Self {
            platform: platform.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    pub fn tally(&self, kind: FieldKind) -> SyncTally {
        self.tallies.get(&kind).copied().unwrap_or_default()
    }

    pub fn succeeded(&mut self, kind: FieldKind) {
        self.tallies.entry(kind).or_default().succeeded += 1;
    }

    pub fn skipped(&mut self, kind: FieldKind) {
        self.tallies.entry(kind).or_default().skipped += 1;
    }

    pub fn failed(&mut self, locale: &str, kind: FieldKind, error: impl fmt::Display) {
        self.tallies.entry(kind).or_default().failed += 1;
        self.failures.push(format!("{locale}/{kind}: {error}"));
    }

    pub fn has_failures(&self) -> bool {
        self.aborted.is_some() || self.tallies.values().any(|t| t.failed > 0)
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}\nUPLOAD SUMMARY: {} {}\n{RULE}", self.platform, self.version)?;
        if let Some(reason) = &self.aborted {
            writeln!(f, "\nABORTED: {reason}")?;
        }
        for (kind, t) in &self.tallies {
            writeln!(
                f,
                "  {:<9} succeeded {:>3}  skipped {:>3}  failed {:>3}",
                kind.short_name(),
                t.succeeded,
                t.skipped,
                t.failed
            )?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "\nFAILED ({}):", self.failures.len())?;
            for l in &self.failures {
                writeln!(f, "  - {l}")?;
            }
        }
        write!(f, "\n{RULE}")
    }
}
