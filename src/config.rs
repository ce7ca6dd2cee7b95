//! Run configuration. Built once at startup and passed down by reference.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_STORE_API_URL: &str = "https://api.appstoreconnect.apple.com/v1";
pub const DEFAULT_CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

/// Timeout applied to every outbound HTTP call.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

/// Follow-up requests allowed after the initial translation of a locale.
pub const TRANSLATION_RETRY_BUDGET: usize = 1;

pub const TOKEN_LIFETIME_SECS: i64 = 20 * 60;
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Default)]
pub struct StoreCredentials {
    pub key_id: String,
    pub issuer_id: String,
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct AppIds {
    pub ios: String,
    pub mac: String,
}

/// Context strings handed to the translator with every request.
#[derive(Debug, Clone)]
pub struct BrandContext {
    pub app_name: String,
    pub app_description: String,
    pub brand_voice: String,
}

impl Default for BrandContext {
    fn default() -> Self {
        Self {
            app_name: "Your App".into(),
            app_description: "A great application.".into(),
            brand_voice: "Professional and friendly.".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BaseUrls {
    pub privacy: Option<String>,
    pub terms: Option<String>,
}

impl BaseUrls {
    pub fn configured(&self) -> Vec<&str> {
        [self.privacy.as_deref(), self.terms.as_deref()]
            .into_iter()
            .flatten()
            .filter(|u| !u.trim().is_empty())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.configured().len() == 2
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_CLAUDE_API_URL.into(),
            model: DEFAULT_CLAUDE_MODEL.into(),
        }
    }
}

/// Bounded exponential backoff for store API calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(800),
            max_jitter_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenTiming {
    pub lifetime_secs: i64,
    pub refresh_margin_secs: i64,
}

impl Default for TokenTiming {
    fn default() -> Self {
        Self {
            lifetime_secs: TOKEN_LIFETIME_SECS,
            refresh_margin_secs: TOKEN_REFRESH_MARGIN_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding one sub-directory per locale code.
    pub content_root: PathBuf,
    pub store: StoreCredentials,
    pub store_api_url: String,
    pub app_ids: AppIds,
    pub claude: ClaudeSettings,
    pub brand: BrandContext,
    pub base_urls: BaseUrls,
    pub http_timeout: Duration,
    pub translation_retry_budget: usize,
    pub token: TokenTiming,
    pub remote_retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("."),
            store: StoreCredentials::default(),
            store_api_url: DEFAULT_STORE_API_URL.into(),
            app_ids: AppIds::default(),
            claude: ClaudeSettings::default(),
            brand: BrandContext::default(),
            base_urls: BaseUrls::default(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            translation_retry_budget: TRANSLATION_RETRY_BUDGET,
            token: TokenTiming::default(),
            remote_retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn require_translation(&self) -> Result<(), ConfigError> {
        if self.claude.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("CLAUDE_API_KEY"));
        }
        Ok(())
    }

    pub fn require_upload(&self, ios: bool, mac: bool) -> Result<(), ConfigError> {
        if self.store.key_id.trim().is_empty() {
            return Err(ConfigError::Missing("APP_STORE_KEY_ID"));
        }
        if self.store.issuer_id.trim().is_empty() {
            return Err(ConfigError::Missing("APP_STORE_ISSUER_ID"));
        }
        if self.store.private_key_path.is_none() {
            return Err(ConfigError::Missing("APP_STORE_PRIVATE_KEY_PATH"));
        }
        if ios && self.app_ids.ios.trim().is_empty() {
            return Err(ConfigError::Missing("IOS_APP_ID"));
        }
        if mac && self.app_ids.mac.trim().is_empty() {
            return Err(ConfigError::Missing("MAC_APP_ID"));
        }
        Ok(())
    }
}
