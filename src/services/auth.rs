//! Short-lived ES256 bearer tokens for the store API.
//!
//! Header `{"alg":"ES256","kid":<key id>,"typ":"JWT"}`, claims
//! `{"iss":<issuer id>,"iat":<now>,"exp":<now + lifetime>,"aud":"appstoreconnect-v1"}`,
//! each base64url without padding, signed over `header.claims` with P-256 /
//! SHA-256 and the raw 64-byte `r || s` signature appended.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::debug;

use crate::config::{StoreCredentials, TokenTiming};
use crate::error::{ConfigError, RemoteError};

pub const AUDIENCE: &str = "appstoreconnect-v1";

/// Allowance for clock drift between us and the store, on top of the
/// refresh margin.
pub const CLOCK_SKEW_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub expires_at: i64,
}

pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    kid: &'a str,
    typ: &'a str,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
    exp: i64,
    aud: &'a str,
}

pub struct TokenSigner {
    key: SigningKey,
    key_id: String,
    issuer_id: String,
}

impl TokenSigner {
    pub fn from_pem(pem: &str, key_id: &str, issuer_id: &str) -> Result<Self, ConfigError> {
        let key = SigningKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key,
            key_id: key_id.to_string(),
            issuer_id: issuer_id.to_string(),
        })
    }

    pub fn from_credentials(creds: &StoreCredentials) -> Result<Self, ConfigError> {
        let path = creds
            .private_key_path
            .as_deref()
            .ok_or(ConfigError::Missing("APP_STORE_PRIVATE_KEY_PATH"))?;
        Self::from_pem(&read_key(path)?, &creds.key_id, &creds.issuer_id)
    }

    pub fn sign(&self, issued_at: i64, expires_at: i64) -> Result<String, RemoteError> {
        let header = Header {
            alg: "ES256",
            kid: &self.key_id,
            typ: "JWT",
        };
        let claims = Claims {
            iss: &self.issuer_id,
            iat: issued_at,
            exp: expires_at,
            aud: AUDIENCE,
        };

        let header = serde_json::to_vec(&header).map_err(|e| RemoteError::Signing(e.to_string()))?;
        let claims = serde_json::to_vec(&claims).map_err(|e| RemoteError::Signing(e.to_string()))?;

        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));
        // Randomized nonce: a token re-issued within the same second must
        // still differ from the one the store rejected.
        let signature: Signature = self
            .key
            .try_sign_with_rng(&mut OsRng, signing_input.as_bytes())
            .map_err(|e| RemoteError::Signing(e.to_string()))?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }
}

fn read_key(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Holds the one cached token. Every access goes through the mutex, so
/// concurrent callers never regenerate twice or observe a half-built token.
pub struct AuthSession {
    signer: TokenSigner,
    clock: Box<dyn Clock>,
    timing: TokenTiming,
    token: Mutex<Option<AuthToken>>,
}

impl AuthSession {
    pub fn new(signer: TokenSigner, timing: TokenTiming) -> Self {
        Self::with_clock(signer, timing, Box::new(SystemClock))
    }

    pub fn with_clock(signer: TokenSigner, timing: TokenTiming, clock: Box<dyn Clock>) -> Self {
        Self {
            signer,
            clock,
            timing,
            token: Mutex::new(None),
        }
    }

    /// Token for the next request, regenerated when it is missing or within
    /// the refresh margin of expiry.
    pub fn bearer(&self) -> Result<String, RemoteError> {
        let mut slot = self.token.lock().unwrap_or_else(|p| p.into_inner());
        let now = self.clock.now();

        if let Some(t) = slot.as_ref() {
            if !self.needs_refresh(t, now) {
                return Ok(t.value.clone());
            }
        }

        let fresh = self.issue(now)?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    /// Regenerate after the store rejected `rejected`. If another caller
    /// already replaced it, that newer token is returned instead.
    pub fn force_refresh(&self, rejected: &str) -> Result<String, RemoteError> {
        let mut slot = self.token.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(t) = slot.as_ref() {
            if t.value != rejected {
                return Ok(t.value.clone());
            }
        }

        let fresh = self.issue(self.clock.now())?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> Option<AuthToken> {
        self.token.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    #[cfg(test)]
    pub(crate) fn install(&self, token: AuthToken) {
        *self.token.lock().unwrap_or_else(|p| p.into_inner()) = Some(token);
    }

    fn needs_refresh(&self, token: &AuthToken, now: i64) -> bool {
        token.expires_at - now < self.timing.refresh_margin_secs + CLOCK_SKEW_SECS
    }

    fn issue(&self, now: i64) -> Result<AuthToken, RemoteError> {
        let expires_at = now + self.timing.lifetime_secs;
        let value = self.signer.sign(now, expires_at)?;
        debug!(expires_at, "issued store API token");
        Ok(AuthToken { value, expires_at })
    }
}
