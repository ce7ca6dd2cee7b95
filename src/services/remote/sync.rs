use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::{RemoteError, SyncError};
use crate::model::field::{char_len, FieldKind};
use crate::model::locale::{self, Locale};
use crate::services::fingerprint::RecordStore;
use crate::services::report::SyncSummary;

use super::client::{Platform, StoreClient};

/// Which store version to push to.
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub platform: Platform,
    pub app_id: String,
    pub version: String,
}

/// Pushes stored translations to the store: resolve the version, index its
/// localizations by tag, then create-or-patch per locale.
pub struct RemoteSync<'a> {
    client: &'a StoreClient<'a>,
    store: &'a dyn RecordStore,
    cancel: &'a AtomicBool,
}

enum Outcome {
    Done,
    /// Authorization failed even after regenerating the token.
    Fatal(RemoteError),
}

impl<'a> RemoteSync<'a> {
    pub fn new(client: &'a StoreClient<'a>, store: &'a dyn RecordStore, cancel: &'a AtomicBool) -> Self {
        Self {
            client,
            store,
            cancel,
        }
    }

    /// Returns `Err` only when the run must stop (double authorization
    /// failure). Everything else lands in the summary.
    pub fn push(
        &self,
        target: &PushTarget,
        locales: &[&'static Locale],
        fields: &[FieldKind],
    ) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary::new(target.platform.api_name(), &target.version);
        info!(
            platform = target.platform.api_name(),
            version = %target.version,
            app_id = %target.app_id,
            fields = ?fields,
            "uploading"
        );

        let version = match self.client.find_version(&target.app_id, target.platform, &target.version) {
            Ok(Some(v)) => v,
            Ok(None) => {
                summary.aborted = Some(format!("no version '{}' found", target.version));
                return Ok(summary);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                summary.aborted = Some(format!("version lookup failed: {e}"));
                return Ok(summary);
            }
        };

        let mut existing = match self.client.list_localizations(&version.id) {
            Ok(m) => m,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                summary.aborted = Some(format!("listing localizations failed: {e}"));
                return Ok(summary);
            }
        };

        for &locale in locales {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("interrupted, remaining locales not uploaded");
                summary.aborted = Some("interrupted".into());
                break;
            }

            if let Outcome::Fatal(e) = self.push_locale(&version.id, locale, fields, &mut existing, &mut summary) {
                return Err(e.into());
            }
        }

        Ok(summary)
    }

    fn push_locale(
        &self,
        version_id: &str,
        locale: &'static Locale,
        fields: &[FieldKind],
        existing: &mut HashMap<String, String>,
        summary: &mut SyncSummary,
    ) -> Outcome {
        info!(locale = locale.remote_tag, name = locale.display_name, "processing");

        let texts = match self.local_texts(locale) {
            Ok(t) => t,
            Err(e) => {
                error!(locale = locale.code, error = %e, "cannot read translations");
                for &kind in fields {
                    summary.failed(locale.remote_tag, kind, &e);
                }
                return Outcome::Done;
            }
        };

        // Split requested fields into pushable, absent and locally invalid.
        let mut pushable = Vec::new();
        for &kind in fields {
            match texts.get(&kind) {
                None => summary.skipped(kind),
                Some(t) if char_len(t) > kind.char_limit() => summary.failed(
                    locale.remote_tag,
                    kind,
                    format!("{} chars exceeds limit of {}", char_len(t), kind.char_limit()),
                ),
                Some(_) => pushable.push(kind),
            }
        }

        if pushable.is_empty() {
            return Outcome::Done;
        }

        match existing.get(locale.remote_tag).cloned() {
            Some(id) => self.patch_fields(locale, &id, &pushable, &texts, summary),
            None => self.create(version_id, locale, &pushable, &texts, existing, summary),
        }
    }

    /// One PATCH per field so a rejected field does not take the others down.
    fn patch_fields(
        &self,
        locale: &Locale,
        localization_id: &str,
        kinds: &[FieldKind],
        texts: &BTreeMap<FieldKind, String>,
        summary: &mut SyncSummary,
    ) -> Outcome {
        for &kind in kinds {
            let Some(text) = texts.get(&kind) else {
                continue;
            };
            let mut attrs = Map::new();
            attrs.insert(kind.remote_attribute().into(), Value::String(text.clone()));

            match self.client.update_localization(localization_id, &attrs) {
                Ok(()) => {
                    info!(locale = locale.remote_tag, field = %kind, "updated");
                    summary.succeeded(kind);
                }
                Err(e) if e.is_fatal() => return Outcome::Fatal(e),
                Err(e) => {
                    warn!(locale = locale.remote_tag, field = %kind, error = %e, "update failed");
                    summary.failed(locale.remote_tag, kind, &e);
                }
            }
        }
        Outcome::Done
    }

    /// Create the localization with every field attribute seeded at once.
    /// Fields without a usable local translation fall back to the English
    /// source so the new resource is never left half-populated.
    fn create(
        &self,
        version_id: &str,
        locale: &'static Locale,
        kinds: &[FieldKind],
        texts: &BTreeMap<FieldKind, String>,
        existing: &mut HashMap<String, String>,
        summary: &mut SyncSummary,
    ) -> Outcome {
        let fallback = if locale.is_source() {
            BTreeMap::new()
        } else {
            match self.local_texts(locale::source()) {
                Ok(t) => t,
                Err(e) => {
                    error!(locale = locale.remote_tag, error = %e, "cannot read English fallback, not creating localization");
                    for &kind in kinds {
                        summary.failed(locale.remote_tag, kind, &e);
                    }
                    return Outcome::Done;
                }
            }
        };

        let mut attrs = Map::new();
        for kind in FieldKind::ALL {
            let text = texts
                .get(&kind)
                .filter(|t| char_len(t) <= kind.char_limit())
                .or_else(|| fallback.get(&kind));
            if let Some(t) = text {
                attrs.insert(kind.remote_attribute().into(), Value::String(t.clone()));
            }
        }

        match self.client.create_localization(version_id, locale.remote_tag, &attrs) {
            Ok(id) => {
                info!(locale = locale.remote_tag, id = %id, "created localization");
                existing.insert(locale.remote_tag.to_string(), id);
                for &kind in kinds {
                    summary.succeeded(kind);
                }
                Outcome::Done
            }
            Err(e) if e.is_fatal() => Outcome::Fatal(e),
            // 409: an earlier attempt already created it. Re-index and patch
            // instead of creating a second one.
            Err(RemoteError::Validation { status: 409, .. }) => {
                match self.client.list_localizations(version_id) {
                    Ok(fresh) => *existing = fresh,
                    Err(e) if e.is_fatal() => return Outcome::Fatal(e),
                    Err(e) => warn!(error = %e, "re-listing localizations failed"),
                }
                match existing.get(locale.remote_tag).cloned() {
                    Some(id) => {
                        info!(locale = locale.remote_tag, "localization already exists, updating instead");
                        self.patch_fields(locale, &id, kinds, texts, summary)
                    }
                    None => {
                        for &kind in kinds {
                            summary.failed(locale.remote_tag, kind, "create conflicted but localization not found");
                        }
                        Outcome::Done
                    }
                }
            }
            Err(e) => {
                warn!(locale = locale.remote_tag, error = %e, "create failed");
                for &kind in kinds {
                    summary.failed(locale.remote_tag, kind, &e);
                }
                Outcome::Done
            }
        }
    }

    fn local_texts(&self, locale: &Locale) -> Result<BTreeMap<FieldKind, String>, crate::error::StoreError> {
        let mut out = BTreeMap::new();
        for kind in FieldKind::ALL {
            if let Some(r) = self.store.get(locale, kind)? {
                out.insert(kind, r.translated_text);
            }
        }
        Ok(out)
    }
}
