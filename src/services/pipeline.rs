use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{ConfigError, SyncError};
use crate::model::field::{char_len, FieldKind, SourceField};
use crate::model::locale::Locale;
use crate::services::{
    ai::TranslationBackend,
    engine::TranslationEngine,
    fingerprint::{check_locale, RecordStore, Selection},
    report::{TranslateStatus, TranslateSummary, UrlFixStatus, UrlFixSummary},
    urls::UrlLocalizer,
};

pub struct TranslateRun<'a> {
    pub config: &'a AppConfig,
    pub store: &'a dyn RecordStore,
    pub backend: &'a dyn TranslationBackend,
    /// Target locales taking part in this run.
    pub locales: &'a [&'static Locale],
    pub sources: &'a [SourceField],
    pub cancel: &'a AtomicBool,
}

/// Translate every stale (locale, field) pair, one locale at a time.
///
/// A locale whose backend call or files fail is recorded and the run moves on.
/// Only a bad `--only` target aborts before any work.
pub fn run(ctx: &TranslateRun<'_>, sel: &Selection<'_>) -> Result<TranslateSummary, SyncError> {
    if let Some(only) = sel.only {
        if !ctx.locales.contains(&only.locale) {
            return Err(ConfigError::UnknownLocale(only.locale.code.to_string()).into());
        }
    }

    let urls = UrlLocalizer::new(&ctx.config.base_urls.configured()).map_err(ConfigError::from)?;
    let engine = TranslationEngine::new(
        ctx.backend,
        ctx.store,
        &ctx.config.brand,
        ctx.config.translation_retry_budget,
    )
    .with_urls(&urls);

    let mut summary = TranslateSummary::default();

    if let Some(field) = sel.only.and_then(|o| o.field) {
        if !ctx.sources.iter().any(|s| s.kind == field) {
            warn!(field = %field, "requested field has no English source");
            if let Some(only) = sel.only {
                summary.push(
                    only.locale.code,
                    field,
                    TranslateStatus::Failed {
                        error: format!("en/{} not found", field.file_name()),
                    },
                );
            }
            return Ok(summary);
        }
    }

    for &locale in ctx.locales.iter().filter(|l| !l.is_source() && sel.includes_locale(l)) {
        if ctx.cancel.load(Ordering::SeqCst) {
            warn!("interrupted, remaining locales left untouched");
            break;
        }

        let plan = match check_locale(ctx.store, locale, ctx.sources, sel) {
            Ok(p) => p,
            Err(e) => {
                error!(locale = locale.code, error = %e, "cannot read locale state");
                for s in ctx.sources.iter().filter(|s| sel.includes_field(s.kind)) {
                    summary.push(locale.code, s.kind, TranslateStatus::Failed { error: e.to_string() });
                }
                continue;
            }
        };

        for (kind, chars) in &plan.fresh {
            summary.push(
                locale.code,
                *kind,
                TranslateStatus::Skipped {
                    reason: format!("OK ({chars} chars)"),
                },
            );
        }

        if plan.is_empty() {
            info!(locale = locale.code, "up to date");
            continue;
        }

        info!(
            locale = locale.code,
            name = locale.display_name,
            stale = plan.stale.len(),
            force = sel.force,
            "translating"
        );
        for s in &plan.stale {
            info!(locale = locale.code, field = %s.source.kind, reason = %s.reason, "stale");
        }

        match engine.translate_locale(&plan) {
            Ok(result) => {
                summary.backend_calls += result.attempts;
                for c in &result.accepted {
                    summary.push(locale.code, c.kind, TranslateStatus::Translated { chars: c.len() });
                }
                for c in &result.over_limit {
                    summary.push(
                        locale.code,
                        c.kind,
                        TranslateStatus::OverLimit {
                            chars: c.len(),
                            limit: c.char_limit,
                        },
                    );
                }
                for kind in &result.missing {
                    summary.push(
                        locale.code,
                        *kind,
                        TranslateStatus::Failed {
                            error: "missing from backend response".into(),
                        },
                    );
                }
            }
            Err(e) => {
                if matches!(e, SyncError::Backend(_)) {
                    summary.backend_calls += 1;
                }
                error!(locale = locale.code, error = %e, "locale failed");
                for s in &plan.stale {
                    summary.push(locale.code, s.source.kind, TranslateStatus::Failed { error: e.to_string() });
                }
            }
        }
    }

    Ok(summary)
}

/// Rewrite the configured base URLs in every target locale's description.
pub fn fix_urls(
    store: &dyn RecordStore,
    urls: &UrlLocalizer,
    locales: &[&'static Locale],
    cancel: &AtomicBool,
) -> UrlFixSummary {
    let mut summary = UrlFixSummary::default();

    for &locale in locales.iter().filter(|l| !l.is_source()) {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let status = match store.get(locale, FieldKind::Description) {
            Ok(None) => UrlFixStatus::Missing,
            Err(e) => {
                error!(locale = locale.code, error = %e, "cannot read description");
                UrlFixStatus::Failed
            }
            Ok(Some(mut record)) => {
                let localized = urls.localize(&record.translated_text, locale);
                if localized == record.translated_text {
                    if urls.mentions_any(&localized) {
                        UrlFixStatus::AlreadyCorrect
                    } else {
                        UrlFixStatus::NoUrls
                    }
                } else {
                    record.over_limit = char_len(&localized) > FieldKind::Description.char_limit();
                    record.translated_text = localized;
                    match store.put(locale, &record) {
                        Ok(()) => {
                            info!(locale = locale.code, urls = ?urls.localized_urls(locale), "URLs updated");
                            UrlFixStatus::Updated
                        }
                        Err(e) => {
                            error!(locale = locale.code, error = %e, "cannot write description");
                            UrlFixStatus::Failed
                        }
                    }
                }
            }
        };

        summary.items.push((locale.code.to_string(), status));
    }

    summary
}
