//! Builds [`AppConfig`] from the process environment and an optional `.env`.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{AppConfig, AppIds, BaseUrls, BrandContext, ClaudeSettings, StoreCredentials};

/// Load `.env` (explicit path, else the working directory) into the process
/// environment, then read the settings. Variables already set win.
pub fn load(env_file: Option<&Path>, content_root: PathBuf) -> AppConfig {
    let loaded = match env_file {
        Some(p) => dotenv::from_path(p).map(|_| p.to_path_buf()),
        None => dotenv::dotenv(),
    };
    match loaded {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(e) => debug!(error = %e, "no environment file loaded"),
    }

    from_vars(|k| env::var(k).ok(), content_root)
}

/// Settings from a variable lookup. Empty values count as unset.
pub fn from_vars(get: impl Fn(&str) -> Option<String>, content_root: PathBuf) -> AppConfig {
    let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let defaults = AppConfig::default();
    let brand = BrandContext::default();
    let claude = ClaudeSettings::default();

    AppConfig {
        content_root,
        store: StoreCredentials {
            key_id: var("APP_STORE_KEY_ID").unwrap_or_default(),
            issuer_id: var("APP_STORE_ISSUER_ID").unwrap_or_default(),
            private_key_path: var("APP_STORE_PRIVATE_KEY_PATH").map(PathBuf::from),
        },
        app_ids: AppIds {
            ios: var("IOS_APP_ID").unwrap_or_default(),
            mac: var("MAC_APP_ID").unwrap_or_default(),
        },
        claude: ClaudeSettings {
            api_key: var("CLAUDE_API_KEY").unwrap_or_default(),
            model: var("CLAUDE_MODEL").unwrap_or(claude.model),
            api_url: claude.api_url,
        },
        brand: BrandContext {
            app_name: var("APP_NAME").unwrap_or(brand.app_name),
            app_description: var("APP_DESCRIPTION").unwrap_or(brand.app_description),
            brand_voice: var("BRAND_VOICE").unwrap_or(brand.brand_voice),
        },
        base_urls: BaseUrls {
            privacy: var("BASE_PRIVACY_URL"),
            terms: var("BASE_TERMS_URL"),
        },
        ..defaults
    }
}
