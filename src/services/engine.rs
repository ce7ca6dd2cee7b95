//! Per-locale translation with character-limit validation and one bounded
//! shortening round.
//!
//! A locale batch moves `Pending -> Requested -> Accepted`, or through
//! `RetryRequested` when a field came back too long. A field still too long
//! after the retry budget is spent ends `FailedOverLimit`: the shortest
//! candidate seen is written with `over_limit = true` and the run goes on.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::BrandContext;
use crate::error::{BackendError, SyncError};
use crate::model::field::{char_len, FieldKind};
use crate::model::locale::Locale;
use crate::model::record::TranslationRecord;
use crate::services::ai::TranslationBackend;
use crate::services::ai_types::{FieldRequest, FieldTranslation, ShortenField, ShortenRequest, TranslationRequest};
use crate::services::fingerprint::staleness::{LocalePlan, StaleField};
use crate::services::fingerprint::store::RecordStore;
use crate::services::urls::UrlLocalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Pending,
    Requested,
    RetryRequested,
    Accepted,
    FailedOverLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: FieldKind,
    pub text: String,
    pub note: String,
    pub char_limit: usize,
}

impl Candidate {
    pub fn len(&self) -> usize {
        char_len(&self.text)
    }

    pub fn fits(&self) -> bool {
        self.len() <= self.char_limit
    }
}

/// What a locale batch came back with once the retry budget is spent.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub accepted: Vec<Candidate>,
    pub over_limit: Vec<Candidate>,
    /// Requested fields the backend never answered.
    pub missing: Vec<FieldKind>,
    /// Backend calls issued for this locale.
    pub attempts: usize,
    /// Last state reached by each requested field. A field the backend never
    /// answered stays at the request it was last part of.
    pub states: BTreeMap<FieldKind, FieldState>,
}

impl BatchResult {
    pub fn state_of(&self, kind: FieldKind) -> FieldState {
        self.states.get(&kind).copied().unwrap_or(FieldState::Pending)
    }
}

pub struct TranslationEngine<'a> {
    backend: &'a dyn TranslationBackend,
    store: &'a dyn RecordStore,
    brand: &'a BrandContext,
    urls: Option<&'a UrlLocalizer>,
    retry_budget: usize,
}

impl<'a> TranslationEngine<'a> {
    pub fn new(
        backend: &'a dyn TranslationBackend,
        store: &'a dyn RecordStore,
        brand: &'a BrandContext,
        retry_budget: usize,
    ) -> Self {
        Self {
            backend,
            store,
            brand,
            urls: None,
            retry_budget,
        }
    }

    /// Localize configured URLs in description candidates before validation.
    pub fn with_urls(mut self, urls: &'a UrlLocalizer) -> Self {
        if !urls.is_empty() {
            self.urls = Some(urls);
        }
        self
    }

    /// Translate every stale field of one locale and persist the outcome.
    /// Nothing is written if the initial request fails.
    pub fn translate_locale(&self, plan: &LocalePlan) -> Result<BatchResult, SyncError> {
        if plan.is_empty() {
            return Ok(BatchResult::default());
        }

        let locale = plan.locale;
        let result = self.run_batch(locale, &plan.stale)?;

        let fingerprints: BTreeMap<FieldKind, &str> = plan
            .stale
            .iter()
            .map(|s| (s.source.kind, s.fingerprint.as_str()))
            .collect();

        let records: Vec<TranslationRecord> = result
            .accepted
            .iter()
            .map(|c| (c, false))
            .chain(result.over_limit.iter().map(|c| (c, true)))
            .map(|(c, over_limit)| {
                TranslationRecord::new(
                    locale.code,
                    c.kind,
                    c.text.clone(),
                    fingerprints.get(&c.kind).copied().unwrap_or_default().to_string(),
                    c.note.clone(),
                    over_limit,
                )
            })
            .collect();

        self.store.put_all(locale, &records)?;

        info!(
            locale = locale.code,
            accepted = result.accepted.len(),
            over_limit = result.over_limit.len(),
            missing = result.missing.len(),
            attempts = result.attempts,
            "locale translated"
        );

        Ok(result)
    }

    /// Initial request plus at most `retry_budget` shortening rounds, scoped to
    /// the fields still over their limit.
    pub fn run_batch(
        &self,
        locale: &Locale,
        stale: &[StaleField],
    ) -> Result<BatchResult, BackendError> {
        let mut result = BatchResult::default();
        let mut states: BTreeMap<FieldKind, FieldState> =
            stale.iter().map(|s| (s.source.kind, FieldState::Pending)).collect();
        let limits: BTreeMap<FieldKind, usize> =
            stale.iter().map(|s| (s.source.kind, s.source.char_limit)).collect();

        let req = TranslationRequest {
            locale_name: locale.display_name.to_string(),
            context: self.brand.clone(),
            fields: stale
                .iter()
                .map(|s| FieldRequest {
                    kind: s.source.kind,
                    source_text: s.source.text.clone(),
                    char_limit: s.source.char_limit,
                })
                .collect(),
        };

        states.values_mut().for_each(|s| *s = FieldState::Requested);
        result.attempts += 1;
        let answers = self.backend.translate(&req)?;

        // Best candidate per field so far; the shorter one wins on a tie-break.
        let mut best: BTreeMap<FieldKind, Candidate> = BTreeMap::new();
        self.absorb(locale, answers, &limits, &mut best);

        for round in 0..self.retry_budget {
            let violating: Vec<&Candidate> = best.values().filter(|c| !c.fits()).collect();
            if violating.is_empty() {
                break;
            }

            let shorten = ShortenRequest {
                locale_name: locale.display_name.to_string(),
                context: self.brand.clone(),
                fields: violating
                    .iter()
                    .map(|c| ShortenField {
                        kind: c.kind,
                        previous_text: c.text.clone(),
                        char_limit: c.char_limit,
                        instruction: shorten_instruction(c.len(), c.char_limit),
                    })
                    .collect(),
            };

            for f in &shorten.fields {
                states.insert(f.kind, FieldState::RetryRequested);
                debug!(locale = locale.code, field = %f.kind, round, "over limit, asking for shorter text");
            }

            result.attempts += 1;
            match self.backend.shorten(&shorten) {
                Ok(answers) => self.absorb(locale, answers, &limits, &mut best),
                Err(e) => {
                    warn!(locale = locale.code, error = %e, "shortening request failed, keeping first candidates");
                    break;
                }
            }
        }

        for (kind, state) in states.iter_mut() {
            match best.remove(kind) {
                Some(c) if c.fits() => {
                    *state = FieldState::Accepted;
                    result.accepted.push(c);
                }
                Some(c) => {
                    *state = FieldState::FailedOverLimit;
                    warn!(
                        locale = locale.code,
                        field = %kind,
                        chars = c.len(),
                        limit = c.char_limit,
                        "still over limit, keeping shortest candidate"
                    );
                    result.over_limit.push(c);
                }
                None => result.missing.push(*kind),
            }
        }

        result.states = states;
        Ok(result)
    }

    fn absorb(
        &self,
        locale: &Locale,
        answers: Vec<FieldTranslation>,
        limits: &BTreeMap<FieldKind, usize>,
        best: &mut BTreeMap<FieldKind, Candidate>,
    ) {
        for a in answers {
            let Some(&char_limit) = limits.get(&a.kind) else {
                debug!(locale = locale.code, field = %a.kind, "ignoring unrequested field");
                continue;
            };

            let text = match (a.kind, self.urls) {
                (FieldKind::Description, Some(urls)) => urls.localize(&a.text, locale),
                _ => a.text,
            };

            let candidate = Candidate {
                kind: a.kind,
                text,
                note: a.note,
                char_limit,
            };

            match best.get(&a.kind) {
                Some(prev) if prev.len() <= candidate.len() => {}
                _ => {
                    best.insert(a.kind, candidate);
                }
            }
        }
    }
}

fn shorten_instruction(len: usize, limit: usize) -> String {
    format!(
        "Your translation is {len} characters but the MAXIMUM allowed is {limit} characters. \
         This is a hard App Store Connect limit. Please shorten the translation significantly \
         while preserving the key message. You MUST stay under {limit} characters."
    )
}
