use std::fmt;

use crate::error::{ConfigError, StoreError};
use crate::model::field::{char_len, FieldKind, SourceField};
use crate::model::locale::{self, Locale};

use super::hash::fingerprint;
use super::store::RecordStore;

/// `--only de` or `--only de/promo.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFilter {
    pub locale: &'static Locale,
    pub field: Option<FieldKind>,
}

impl TargetFilter {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let (code, field) = match s.trim().split_once('/') {
            Some((code, field)) => (code, Some(field)),
            None => (s.trim(), None),
        };

        let locale = locale::by_code(code)
            .filter(|l| !l.is_source())
            .ok_or_else(|| ConfigError::UnknownLocale(code.to_string()))?;

        let field = match field {
            Some(f) => Some(FieldKind::parse(f).ok_or_else(|| ConfigError::UnknownField(f.to_string()))?),
            None => None,
        };

        Ok(Self { locale, field })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Forced,
    Missing,
    Untracked,
    SourceChanged,
    OverLimit,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::Forced => "forced",
            StaleReason::Missing => "no translation",
            StaleReason::Untracked => "no fingerprint on record",
            StaleReason::SourceChanged => "source changed",
            StaleReason::OverLimit => "over limit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct StaleField {
    pub source: SourceField,
    pub fingerprint: String,
    pub reason: StaleReason,
}

/// Staleness verdict for one locale.
#[derive(Debug, Clone)]
pub struct LocalePlan {
    pub locale: &'static Locale,
    pub stale: Vec<StaleField>,
    pub fresh: Vec<(FieldKind, usize)>,
}

impl LocalePlan {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Selection<'a> {
    /// `None` means every field.
    pub fields: Option<&'a [FieldKind]>,
    pub force: bool,
    pub only: Option<TargetFilter>,
}

impl Selection<'_> {
    pub fn includes_locale(&self, locale: &Locale) -> bool {
        self.only.map_or(true, |f| f.locale == locale)
    }

    pub fn includes_field(&self, kind: FieldKind) -> bool {
        let by_list = self.fields.map_or(true, |fs| fs.contains(&kind));
        let by_target = self.only.and_then(|f| f.field).map_or(true, |f| f == kind);
        by_list && by_target
    }
}

pub fn check_locale(
    store: &dyn RecordStore,
    locale: &'static Locale,
    sources: &[SourceField],
    sel: &Selection<'_>,
) -> Result<LocalePlan, StoreError> {
    let mut plan = LocalePlan {
        locale,
        stale: Vec::new(),
        fresh: Vec::new(),
    };

    for source in sources.iter().filter(|s| sel.includes_field(s.kind)) {
        let fp = fingerprint(&source.text);
        let existing = store.get(locale, source.kind)?;

        let reason = match existing {
            _ if sel.force => Some(StaleReason::Forced),
            None => Some(StaleReason::Missing),
            Some(r) if r.is_untracked() => Some(StaleReason::Untracked),
            Some(r) if r.is_fresh(&fp, source.char_limit) => {
                plan.fresh.push((source.kind, char_len(&r.translated_text)));
                None
            }
            Some(r) if r.source_fingerprint != fp => Some(StaleReason::SourceChanged),
            Some(_) => Some(StaleReason::OverLimit),
        };

        if let Some(reason) = reason {
            plan.stale.push(StaleField {
                source: source.clone(),
                fingerprint: fp,
                reason,
            });
        }
    }

    Ok(plan)
}

/// Flat list of (locale, field) pairs needing translation.
pub fn work_list(
    store: &dyn RecordStore,
    locales: &[&'static Locale],
    sources: &[SourceField],
    sel: &Selection<'_>,
) -> Result<Vec<(&'static Locale, FieldKind)>, StoreError> {
    let mut out = Vec::new();

    for &locale in locales.iter().filter(|l| !l.is_source() && sel.includes_locale(l)) {
        let plan = check_locale(store, locale, sources, sel)?;
        out.extend(plan.stale.iter().map(|s| (locale, s.source.kind)));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::TranslationRecord;
    use crate::services::fingerprint::store::FsRecordStore;

    fn sources() -> Vec<SourceField> {
        vec![
            SourceField::new(FieldKind::PromotionalText, "Buy now!"),
            SourceField::new(FieldKind::Keywords, "photo,editor"),
        ]
    }

    fn loc(code: &str) -> &'static Locale {
        locale::by_code(code).unwrap()
    }

    #[test]
    fn target_filter_parsing() {
        let f = TargetFilter::parse("de/promo.txt").unwrap();
        assert_eq!(f.locale.code, "de");
        assert_eq!(f.field, Some(FieldKind::PromotionalText));

        assert_eq!(TargetFilter::parse("ja").unwrap().field, None);
        assert!(matches!(TargetFilter::parse("xx"), Err(ConfigError::UnknownLocale(_))));
        assert!(matches!(TargetFilter::parse("en"), Err(ConfigError::UnknownLocale(_))));
        assert!(matches!(TargetFilter::parse("de/banner.txt"), Err(ConfigError::UnknownField(_))));
    }

    #[test]
    fn reasons_follow_record_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let de = loc("de");

        let fresh = TranslationRecord::new("de", FieldKind::PromotionalText, "Jetzt kaufen!".into(), fingerprint("Buy now!"), String::new(), false);
        let flagged = TranslationRecord::new("de", FieldKind::Keywords, "foto".into(), fingerprint("photo,editor"), String::new(), true);
        store.put_all(de, &[fresh, flagged]).unwrap();

        let plan = check_locale(&store, de, &sources(), &Selection::default()).unwrap();
        assert_eq!(plan.fresh, vec![(FieldKind::PromotionalText, 13)]);
        assert_eq!(plan.stale.len(), 1);
        assert_eq!(plan.stale[0].reason, StaleReason::OverLimit);

        let changed = vec![SourceField::new(FieldKind::PromotionalText, "Buy today!")];
        let plan = check_locale(&store, de, &changed, &Selection::default()).unwrap();
        assert_eq!(plan.stale[0].reason, StaleReason::SourceChanged);

        let forced = Selection { force: true, ..Selection::default() };
        let plan = check_locale(&store, de, &sources(), &forced).unwrap();
        assert!(plan.stale.iter().all(|s| s.reason == StaleReason::Forced));
        assert_eq!(plan.stale.len(), 2);
    }

    #[test]
    fn hand_edited_text_over_limit_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let de = loc("de");
        let rec = TranslationRecord::new("de", FieldKind::Keywords, "foto".into(), fingerprint("photo,editor"), String::new(), false);
        store.put(de, &rec).unwrap();
        std::fs::write(store.text_path(de, FieldKind::Keywords), "x".repeat(101)).unwrap();

        let sel = Selection { fields: Some(&[FieldKind::Keywords]), ..Selection::default() };
        let plan = check_locale(&store, de, &sources(), &sel).unwrap();
        assert_eq!(plan.stale.len(), 1);
        assert_eq!(plan.stale[0].reason, StaleReason::OverLimit);
        assert!(plan.fresh.is_empty());
    }

    #[test]
    fn single_target_limits_work_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let locales = [loc("de"), loc("fr"), loc("ja")];

        let all = work_list(&store, &locales, &sources(), &Selection::default()).unwrap();
        assert_eq!(all.len(), 6);

        let only = Selection {
            only: Some(TargetFilter::parse("de/promo.txt").unwrap()),
            ..Selection::default()
        };
        let one = work_list(&store, &locales, &sources(), &only).unwrap();
        assert_eq!(one, vec![(loc("de"), FieldKind::PromotionalText)]);
    }

    #[test]
    fn reverting_source_to_translated_content_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let de = loc("de");
        let rec = TranslationRecord::new("de", FieldKind::PromotionalText, "Jetzt kaufen!".into(), fingerprint("Buy now!\n"), String::new(), false);
        store.put(de, &rec).unwrap();

        let sel = Selection { fields: Some(&[FieldKind::PromotionalText]), ..Selection::default() };
        let plan = check_locale(&store, de, &sources(), &sel).unwrap();
        assert!(plan.is_empty());
    }
}
