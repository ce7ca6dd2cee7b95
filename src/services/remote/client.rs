use std::collections::HashMap;

use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::error::RemoteError;
use crate::services::auth::AuthSession;
use crate::services::retry::{should_retry_http, sleep_before_retry};

use super::transport::{ApiRequest, ApiResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    MacOs,
}

impl Platform {
    pub fn api_name(self) -> &'static str {
        match self {
            Platform::Ios => "IOS",
            Platform::MacOs => "MAC_OS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: String,
    pub version_string: String,
    pub state: String,
}

/// Authenticated store API calls with transient retry and the single
/// re-authorization rule.
pub struct StoreClient<'a> {
    transport: &'a dyn Transport,
    auth: &'a AuthSession,
    retry: RetryPolicy,
}

impl<'a> StoreClient<'a> {
    pub fn new(transport: &'a dyn Transport, auth: &'a AuthSession, retry: RetryPolicy) -> Self {
        Self {
            transport,
            auth,
            retry,
        }
    }

    /// Send one request. Transient failures are retried with backoff up to
    /// the attempt cap; a 401 triggers exactly one forced token refresh and
    /// one resend, and a second 401 is returned as `Authorization`.
    pub fn call(&self, req: &ApiRequest) -> Result<Option<Value>, RemoteError> {
        let mut bearer = self.auth.bearer()?;
        let mut reauthorized = false;
        let mut attempt = 0usize;

        loop {
            let failure = match self.transport.send(req, &bearer) {
                Ok(resp) if resp.is_success() => return Ok(resp.body),
                Ok(resp) if resp.status == StatusCode::UNAUTHORIZED.as_u16() => {
                    let detail = error_detail(&resp);
                    if reauthorized {
                        return Err(RemoteError::Authorization {
                            status: resp.status,
                            detail,
                        });
                    }
                    warn!(path = %req.path, "store rejected token, regenerating once");
                    reauthorized = true;
                    bearer = self.auth.force_refresh(&bearer)?;
                    continue;
                }
                Ok(resp) => classify(resp),
                Err(e) => e,
            };

            if !matches!(failure, RemoteError::Transient(_)) {
                return Err(failure);
            }

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                warn!(path = %req.path, attempts = attempt, "giving up after transient failures");
                return Err(failure);
            }

            debug!(path = %req.path, attempt, error = %failure, "transient failure, backing off");
            sleep_before_retry(&self.retry, attempt - 1);
            bearer = self.auth.bearer()?;
        }
    }

    /// The version must already exist; it is never created here.
    pub fn find_version(
        &self,
        app_id: &str,
        platform: Platform,
        version: &str,
    ) -> Result<Option<VersionInfo>, RemoteError> {
        let path = format!(
            "/apps/{app_id}/appStoreVersions?filter[platform]={}&filter[versionString]={version}",
            platform.api_name()
        );
        let body = self.call(&ApiRequest::get(path))?.unwrap_or(Value::Null);

        let Some(first) = body.get("data").and_then(|d| d.get(0)) else {
            return Ok(None);
        };

        let id = first
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Decode("version without id".into()))?;
        let attr = |name: &str| {
            first
                .pointer(&format!("/attributes/{name}"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let info = VersionInfo {
            id: id.to_string(),
            version_string: attr("versionString"),
            state: attr("appStoreState"),
        };
        info!(version = %info.version_string, state = %info.state, "found version");
        Ok(Some(info))
    }

    /// Existing localizations under a version, keyed by locale tag.
    pub fn list_localizations(&self, version_id: &str) -> Result<HashMap<String, String>, RemoteError> {
        let path = format!("/appStoreVersions/{version_id}/appStoreVersionLocalizations?limit=200");
        let body = self.call(&ApiRequest::get(path))?.unwrap_or(Value::Null);

        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Decode("localization list without data".into()))?;

        let mut out = HashMap::with_capacity(data.len());
        for loc in data {
            let id = loc.get("id").and_then(Value::as_str);
            let tag = loc.pointer("/attributes/locale").and_then(Value::as_str);
            if let (Some(id), Some(tag)) = (id, tag) {
                out.insert(tag.to_string(), id.to_string());
            }
        }

        Ok(out)
    }

    pub fn create_localization(
        &self,
        version_id: &str,
        locale_tag: &str,
        attributes: &Map<String, Value>,
    ) -> Result<String, RemoteError> {
        let mut attrs = attributes.clone();
        attrs.insert("locale".into(), Value::String(locale_tag.to_string()));

        let body = json!({
            "data": {
                "type": "appStoreVersionLocalizations",
                "attributes": attrs,
                "relationships": {
                    "appStoreVersion": {
                        "data": { "type": "appStoreVersions", "id": version_id }
                    }
                }
            }
        });

        let resp = self
            .call(&ApiRequest::post("/appStoreVersionLocalizations", body))?
            .unwrap_or(Value::Null);

        resp.pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Decode("created localization without id".into()))
    }

    /// Partial update: only the given attributes are sent.
    pub fn update_localization(
        &self,
        localization_id: &str,
        attributes: &Map<String, Value>,
    ) -> Result<(), RemoteError> {
        let body = json!({
            "data": {
                "type": "appStoreVersionLocalizations",
                "id": localization_id,
                "attributes": attributes
            }
        });

        self.call(&ApiRequest::patch(
            format!("/appStoreVersionLocalizations/{localization_id}"),
            body,
        ))?;
        Ok(())
    }
}

fn classify(resp: ApiResponse) -> RemoteError {
    let detail = error_detail(&resp);
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if should_retry_http(status) {
        RemoteError::Transient(format!("HTTP {}: {detail}", resp.status))
    } else if status == StatusCode::NOT_FOUND {
        RemoteError::NotFound(detail)
    } else {
        RemoteError::Validation {
            status: resp.status,
            detail,
        }
    }
}

/// `errors[].detail` from a store error body, else the raw text.
fn error_detail(resp: &ApiResponse) -> String {
    let details: Vec<&str> = resp
        .body
        .as_ref()
        .and_then(|b| b.get("errors"))
        .and_then(Value::as_array)
        .map(|errs| {
            errs.iter()
                .filter_map(|e| {
                    e.get("detail")
                        .or_else(|| e.get("title"))
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default();

    if !details.is_empty() {
        return details.join("; ");
    }

    let raw = resp.raw.trim();
    if raw.is_empty() {
        format!("HTTP {}", resp.status)
    } else {
        raw.chars().take(400).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenTiming;
    use crate::services::auth::TokenSigner;
    use crate::services::remote::transport::Method;
    use std::sync::Mutex;

    const KEY: &str = crate::services::auth::tests::TEST_KEY;

    /// Plays back queued responses and records each request with its bearer.
    struct Replay {
        responses: Mutex<Vec<Result<ApiResponse, RemoteError>>>,
        seen: Mutex<Vec<(ApiRequest, String)>>,
    }

    impl Replay {
        fn new(responses: Vec<Result<ApiResponse, RemoteError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Replay {
        fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, RemoteError> {
            self.seen.lock().unwrap().push((req.clone(), bearer.to_string()));
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn resp(status: u16, body: Value) -> Result<ApiResponse, RemoteError> {
        Ok(ApiResponse {
            status,
            raw: body.to_string(),
            body: Some(body),
        })
    }

    fn session() -> AuthSession {
        AuthSession::new(TokenSigner::from_pem(KEY, "K", "I").unwrap(), TokenTiming::default())
    }

    #[test]
    fn transient_failures_are_retried_up_to_cap() {
        let t = Replay::new(vec![
            resp(503, json!({})),
            Err(RemoteError::Transient("connection reset".into())),
            resp(200, json!({ "data": [] })),
        ]);
        let auth = session();
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(3));

        assert!(client.call(&ApiRequest::get("/x")).is_ok());
        assert_eq!(t.seen.lock().unwrap().len(), 3);

        let t = Replay::new(vec![resp(500, json!({})), resp(502, json!({}))]);
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(2));
        let err = client.call(&ApiRequest::get("/x")).unwrap_err();
        assert!(matches!(err, RemoteError::Transient(_)));
        assert_eq!(t.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let t = Replay::new(vec![resp(
            409,
            json!({ "errors": [{ "detail": "keywords too long" }] }),
        )]);
        let auth = session();
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(4));

        let err = client.call(&ApiRequest::patch("/l/1", json!({}))).unwrap_err();
        match err {
            RemoteError::Validation { status, detail } => {
                assert_eq!(status, 409);
                assert_eq!(detail, "keywords too long");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unauthorized_refreshes_once_then_succeeds() {
        let t = Replay::new(vec![resp(401, json!({})), resp(200, json!({ "ok": true }))]);
        let auth = session();
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(3));

        assert!(client.call(&ApiRequest::get("/x")).is_ok());
        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.method, Method::Get);
        assert_ne!(seen[1].1, seen[0].1, "resend must carry the regenerated token");
    }

    #[test]
    fn second_unauthorized_is_fatal() {
        let t = Replay::new(vec![resp(401, json!({})), resp(401, json!({}))]);
        let auth = session();
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(3));

        let err = client.call(&ApiRequest::get("/x")).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(t.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn find_version_reads_first_match() {
        let t = Replay::new(vec![resp(
            200,
            json!({ "data": [{ "id": "v1", "attributes": { "versionString": "1.2.0", "appStoreState": "PREPARE_FOR_SUBMISSION" } }] }),
        )]);
        let auth = session();
        let client = StoreClient::new(&t, &auth, RetryPolicy::immediate(1));

        let v = client.find_version("123", Platform::MacOs, "1.2.0").unwrap().unwrap();
        assert_eq!(v.id, "v1");
        assert_eq!(v.state, "PREPARE_FOR_SUBMISSION");

        let seen = t.seen.lock().unwrap();
        assert_eq!(
            seen[0].0.path,
            "/apps/123/appStoreVersions?filter[platform]=MAC_OS&filter[versionString]=1.2.0"
        );
    }
}
