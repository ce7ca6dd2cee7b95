use crate::config::{BrandContext, ClaudeSettings, RetryPolicy};
use crate::error::BackendError;
use crate::model::field::FieldKind;
use crate::services::ai_types::{FieldTranslation, ShortenRequest, TranslationRequest};
use crate::services::retry::{has_next_attempt, should_retry_http, sleep_before_retry};

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use std::time::Duration;

/// Anything that can translate a locale batch.
pub trait TranslationBackend: Send + Sync {
    fn translate(&self, req: &TranslationRequest) -> Result<Vec<FieldTranslation>, BackendError>;

    fn shorten(&self, req: &ShortenRequest) -> Result<Vec<FieldTranslation>, BackendError>;
}

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: usize = 3;

const NO_CONSIDERATIONS: &str = "No considerations provided";

const SYSTEM_PROMPT: &str = "You are a professional translator for App Store content. You are translating content for {app_name}.

ABOUT THE APP:
{app_description}

BRAND VOICE GUIDELINES:
{brand_voice}

TRANSLATION REQUIREMENTS:
- Translate to natural, fluent {target_language}
- Preserve the professional tone
- Keep technical terms accurate
- Maintain App Store formatting conventions for the target locale
- Do NOT use markdown formatting - output plain text suitable for App Store Connect
- Preserve line breaks and bullet points where they exist in the source

RESPONSE FORMAT:
For every field you are given, respond with this exact block, using the field id you were given:

===FIELD:<id>===
===TRANSLATION_START===
(Your translated text here, preserving all formatting and line breaks)
===TRANSLATION_END===
===CONSIDERATIONS_START===
(Brief notes about translation choices, tone decisions, and any cultural adaptations made)
===CONSIDERATIONS_END===";

/// Claude Messages API backend.
pub struct ClaudeBackend {
    client: Client,
    settings: ClaudeSettings,
    retry: RetryPolicy,
}

impl ClaudeBackend {
    pub fn new(settings: ClaudeSettings, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self {
            client,
            settings,
            retry: RetryPolicy {
                max_attempts: MAX_RETRIES,
                ..RetryPolicy::default()
            },
        })
    }

    fn complete(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.settings.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [
                { "role": "user", "content": user }
            ]
        });

        let mut last_err = BackendError::Http("no attempt made".into());

        for attempt in 0..self.retry.max_attempts {
            let res = self
                .client
                .post(&self.settings.api_url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send();

            let resp = match res {
                Ok(r) => r,
                Err(err) => {
                    last_err = BackendError::Http(err.to_string());
                    if has_next_attempt(&self.retry, attempt) {
                        sleep_before_retry(&self.retry, attempt);
                        continue;
                    }
                    break;
                }
            };

            let status = resp.status();

            // Read as text first so an error body survives a JSON failure.
            let text = match resp.text() {
                Ok(t) => t,
                Err(err) => {
                    last_err = BackendError::Http(err.to_string());
                    if has_next_attempt(&self.retry, attempt) {
                        sleep_before_retry(&self.retry, attempt);
                    }
                    continue;
                }
            };

            if !status.is_success() {
                last_err = BackendError::Status {
                    status: status.as_u16(),
                    message: extract_error_message(status, &text),
                };
                if should_retry_http(status) && has_next_attempt(&self.retry, attempt) {
                    warn!(status = status.as_u16(), attempt, "translation backend busy, retrying");
                    sleep_before_retry(&self.retry, attempt);
                    continue;
                }
                break;
            }

            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|_| BackendError::Malformed("invalid JSON from backend".into()))?;

            return json
                .get("content")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .ok_or_else(|| BackendError::Malformed("missing content[0].text".into()));
        }

        Err(last_err)
    }
}

impl TranslationBackend for ClaudeBackend {
    fn translate(&self, req: &TranslationRequest) -> Result<Vec<FieldTranslation>, BackendError> {
        let system = build_system_prompt(&req.context, &req.locale_name);
        let user = build_translate_prompt(req);
        debug!(locale = %req.locale_name, fields = req.fields.len(), "requesting translation");

        let content = self.complete(&system, &user)?;
        let kinds: Vec<FieldKind> = req.fields.iter().map(|f| f.kind).collect();
        parse_response(&content, &kinds)
    }

    fn shorten(&self, req: &ShortenRequest) -> Result<Vec<FieldTranslation>, BackendError> {
        let system = build_system_prompt(&req.context, &req.locale_name);
        let user = build_shorten_prompt(req);
        debug!(locale = %req.locale_name, fields = req.fields.len(), "requesting shorter translation");

        let content = self.complete(&system, &user)?;
        let kinds: Vec<FieldKind> = req.fields.iter().map(|f| f.kind).collect();
        parse_response(&content, &kinds)
    }
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    if trimmed.chars().count() > 400 {
        let snippet: String = trimmed.chars().take(400).collect();
        format!("{snippet}...")
    } else if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("no body").to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn build_system_prompt(ctx: &BrandContext, target_language: &str) -> String {
    SYSTEM_PROMPT
        .replace("{app_name}", &ctx.app_name)
        .replace("{app_description}", &ctx.app_description)
        .replace("{brand_voice}", &ctx.brand_voice)
        .replace("{target_language}", target_language)
}

fn build_translate_prompt(req: &TranslationRequest) -> String {
    let mut p = format!(
        "Please translate the following App Store fields to {}.\n",
        req.locale_name
    );

    for f in &req.fields {
        p.push_str(&format!(
            "\nFIELD ID: {}\nTYPE: {}\nCRITICAL: The translation MUST be {} characters or less. This is a hard App Store limit. Be concise.\nSOURCE TEXT:\n{}\n",
            f.kind.short_name(),
            f.kind.text_type(),
            f.char_limit,
            f.source_text.trim()
        ));
    }

    p.push_str("\nRemember: answer every field using the exact delimiter format specified (===FIELD:<id>===, ===TRANSLATION_START===, etc.).");
    p
}

fn build_shorten_prompt(req: &ShortenRequest) -> String {
    let mut p = format!(
        "The following {} translations are too long for the App Store.\n",
        req.locale_name
    );

    for f in &req.fields {
        p.push_str(&format!(
            "\nFIELD ID: {}\nTYPE: {}\nERROR: {}\nPREVIOUS TRANSLATION:\n{}\n",
            f.kind.short_name(),
            f.kind.text_type(),
            f.instruction,
            f.previous_text.trim()
        ));
    }

    p.push_str("\nRemember: answer every field using the exact delimiter format specified (===FIELD:<id>===, ===TRANSLATION_START===, etc.).");
    p
}

/// Pull every requested field out of a delimited response. Fields the model
/// left out are simply absent from the result.
pub fn parse_response(
    content: &str,
    kinds: &[FieldKind],
) -> Result<Vec<FieldTranslation>, BackendError> {
    let mut out = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let pattern = format!(
            r"===FIELD:{}===\s*===TRANSLATION_START===\s*([\s\S]*?)\s*===TRANSLATION_END===(?:\s*===CONSIDERATIONS_START===\s*([\s\S]*?)\s*===CONSIDERATIONS_END===)?",
            regex::escape(kind.short_name())
        );
        let re = Regex::new(&pattern).map_err(|e| BackendError::Malformed(e.to_string()))?;

        if let Some(caps) = re.captures(content) {
            let text = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let note = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(NO_CONSIDERATIONS)
                .to_string();
            out.push(FieldTranslation { kind, text, note });
        }
    }

    if out.is_empty() && !kinds.is_empty() {
        let snippet: String = content.chars().take(500).collect();
        return Err(BackendError::Malformed(format!(
            "could not find any translation in response: {snippet}"
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_fields_and_defaults_missing_notes() {
        let content = "\
===FIELD:promo===
===TRANSLATION_START===
Jetzt kaufen!
===TRANSLATION_END===
===CONSIDERATIONS_START===
Kept the imperative.
===CONSIDERATIONS_END===

===FIELD:keywords===
===TRANSLATION_START===
foto,editor
===TRANSLATION_END===";

        let out = parse_response(content, &[FieldKind::PromotionalText, FieldKind::Keywords]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Jetzt kaufen!");
        assert_eq!(out[0].note, "Kept the imperative.");
        assert_eq!(out[1].text, "foto,editor");
        assert_eq!(out[1].note, NO_CONSIDERATIONS);
    }

    #[test]
    fn missing_field_is_left_out() {
        let content = "===FIELD:promo===\n===TRANSLATION_START===\nHola\n===TRANSLATION_END===";
        let out = parse_response(content, &[FieldKind::PromotionalText, FieldKind::Description]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, FieldKind::PromotionalText);
    }

    #[test]
    fn response_without_markers_is_malformed() {
        let err = parse_response("Sure! Here you go.", &[FieldKind::Keywords]).unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[test]
    fn system_prompt_carries_brand_context() {
        let ctx = BrandContext {
            app_name: "Lumen".into(),
            app_description: "A photo editor.".into(),
            brand_voice: "Warm.".into(),
        };
        let p = build_system_prompt(&ctx, "German");
        assert!(p.contains("content for Lumen."));
        assert!(p.contains("A photo editor."));
        assert!(p.contains("fluent German"));
        assert!(!p.contains("{brand_voice}"));
    }

    #[test]
    fn error_message_prefers_json_detail() {
        let msg = extract_error_message(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad model"}}"#);
        assert_eq!(msg, "bad model");
        assert_eq!(extract_error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }
}
