mod common;

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use serde_json::{json, Value};

use common::TEST_KEY;
use store_locale_sync::config::{RetryPolicy, TokenTiming};
use store_locale_sync::error::{RemoteError, SyncError};
use store_locale_sync::model::field::FieldKind;
use store_locale_sync::model::locale;
use store_locale_sync::model::record::TranslationRecord;
use store_locale_sync::services::auth::{AuthSession, TokenSigner};
use store_locale_sync::services::fingerprint::{FsRecordStore, RecordStore};
use store_locale_sync::services::remote::{
    ApiRequest, ApiResponse, Method, Platform, PushTarget, RemoteSync, StoreClient, Transport,
};

/// Store API double with scripted failures in front of normal handling.
struct FakeApi {
    localizations: Mutex<HashMap<String, String>>,
    versions: Vec<(&'static str, &'static str)>,
    script: Mutex<Vec<u16>>,
    log: Mutex<Vec<(ApiRequest, String)>>,
}

impl FakeApi {
    fn new() -> Self {
        Self {
            localizations: Mutex::new(HashMap::new()),
            versions: vec![("IOS", "ver-ios"), ("MAC_OS", "ver-mac")],
            script: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn count(&self, method: Method) -> usize {
        self.log.lock().unwrap().iter().filter(|(r, _)| r.method == method).count()
    }

    fn reply(status: u16, body: Value) -> Result<ApiResponse, RemoteError> {
        Ok(ApiResponse {
            status,
            raw: body.to_string(),
            body: Some(body),
        })
    }
}

impl Transport for FakeApi {
    fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, RemoteError> {
        self.log.lock().unwrap().push((req.clone(), bearer.to_string()));

        let scripted = {
            let mut s = self.script.lock().unwrap();
            if s.is_empty() { None } else { Some(s.remove(0)) }
        };
        if let Some(status) = scripted {
            return Self::reply(status, json!({ "errors": [{ "detail": "scripted" }] }));
        }

        match req.method {
            Method::Get if req.path.starts_with("/apps/") => {
                let data: Vec<Value> = self
                    .versions
                    .iter()
                    .filter(|(p, _)| req.path.contains(&format!("filter[platform]={p}&")))
                    .map(|(_, id)| json!({ "id": id, "attributes": { "versionString": "4.0", "appStoreState": "PREPARE_FOR_SUBMISSION" } }))
                    .collect();
                Self::reply(200, json!({ "data": data }))
            }
            Method::Get => {
                let data: Vec<Value> = self
                    .localizations
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(tag, id)| json!({ "id": id, "attributes": { "locale": tag } }))
                    .collect();
                Self::reply(200, json!({ "data": data }))
            }
            Method::Post => {
                let tag = req.body.as_ref().and_then(|b| b.pointer("/data/attributes/locale")).and_then(Value::as_str).unwrap().to_string();
                let mut locs = self.localizations.lock().unwrap();
                if locs.contains_key(&tag) {
                    return Self::reply(409, json!({ "errors": [{ "detail": "already exists" }] }));
                }
                let id = format!("loc-{tag}");
                locs.insert(tag, id.clone());
                Self::reply(201, json!({ "data": { "id": id } }))
            }
            Method::Patch => Self::reply(200, json!({ "data": {} })),
        }
    }
}

fn content(root: &std::path::Path) -> FsRecordStore {
    fs::create_dir_all(root.join("en")).unwrap();
    for kind in FieldKind::ALL {
        fs::write(root.join("en").join(kind.file_name()), format!("English {kind}")).unwrap();
    }
    let store = FsRecordStore::new(root);
    for code in ["de", "ja"] {
        let l = locale::by_code(code).unwrap();
        let records: Vec<TranslationRecord> = FieldKind::ALL
            .into_iter()
            .map(|k| TranslationRecord::new(code, k, format!("{code} {k}"), "fp".into(), String::new(), false))
            .collect();
        store.put_all(l, &records).unwrap();
    }
    store
}

fn session() -> AuthSession {
    AuthSession::new(TokenSigner::from_pem(TEST_KEY, "KEY", "ISSUER").unwrap(), TokenTiming::default())
}

fn ios() -> PushTarget {
    PushTarget {
        platform: Platform::Ios,
        app_id: "999".into(),
        version: "4.0".into(),
    }
}

#[test]
fn first_push_creates_and_second_push_patches() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let api = FakeApi::new();
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(3));
    let cancel = AtomicBool::new(false);
    let sync = RemoteSync::new(&client, &store, &cancel);
    let locales = store.present_locales();
    assert_eq!(locales.len(), 3);

    let first = sync.push(&ios(), &locales, &FieldKind::ALL).unwrap();
    assert_eq!(api.count(Method::Post), 3);
    assert_eq!(api.count(Method::Patch), 0);
    assert_eq!(first.tally(FieldKind::Keywords).succeeded, 3);
    assert!(!first.has_failures());

    let second = sync.push(&ios(), &locales, &[FieldKind::PromotionalText]).unwrap();
    assert_eq!(api.count(Method::Post), 3);
    assert_eq!(api.count(Method::Patch), 3);
    assert_eq!(api.localizations.lock().unwrap().len(), 3);
    assert_eq!(second.tally(FieldKind::PromotionalText).succeeded, 3);

    let log = api.log.lock().unwrap();
    let patch = log.iter().rev().find(|(r, _)| r.method == Method::Patch).unwrap();
    let attrs = patch.0.body.as_ref().unwrap().pointer("/data/attributes").unwrap();
    assert_eq!(attrs.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["promotionalText"]);
}

#[test]
fn source_locale_is_pushed_from_english_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let api = FakeApi::new();
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(1));
    let cancel = AtomicBool::new(false);

    RemoteSync::new(&client, &store, &cancel)
        .push(&ios(), &[locale::source()], &[FieldKind::Keywords])
        .unwrap();

    let log = api.log.lock().unwrap();
    let post = log.iter().find(|(r, _)| r.method == Method::Post).unwrap();
    let attrs = post.0.body.as_ref().unwrap().pointer("/data/attributes").unwrap();
    assert_eq!(attrs["locale"], "en-US");
    assert_eq!(attrs["keywords"], "English keywords");
    assert_eq!(attrs["description"], "English desc");
}

#[test]
fn rejected_token_is_regenerated_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let api = FakeApi::new();
    api.script.lock().unwrap().push(401);
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(1));
    let cancel = AtomicBool::new(false);

    let de = locale::by_code("de").unwrap();
    let summary = RemoteSync::new(&client, &store, &cancel)
        .push(&ios(), &[de], &FieldKind::ALL)
        .unwrap();
    assert!(!summary.has_failures());

    let log = api.log.lock().unwrap();
    assert_eq!(log[0].0.method, Method::Get);
    assert_eq!(log[0].0.path, log[1].0.path);
    assert_ne!(log[1].1, log[0].1, "resend must carry the regenerated token");
}

#[test]
fn repeated_authorization_failure_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let api = FakeApi::new();
    api.script.lock().unwrap().extend([401, 401]);
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(3));
    let cancel = AtomicBool::new(false);

    let err = RemoteSync::new(&client, &store, &cancel)
        .push(&ios(), &store.present_locales(), &FieldKind::ALL)
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Authorization { status: 401, .. })));
    assert_eq!(api.count(Method::Post), 0);
}

#[test]
fn transient_errors_are_retried_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let api = FakeApi::new();
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(4));
    let cancel = AtomicBool::new(false);
    let de = locale::by_code("de").unwrap();

    // The version lookup fails twice before the store answers.
    api.script.lock().unwrap().extend([503, 503]);
    let summary = RemoteSync::new(&client, &store, &cancel)
        .push(&ios(), &[de], &FieldKind::ALL)
        .unwrap();

    {
        let log = api.log.lock().unwrap();
        assert_eq!(log[2].0.path, log[0].0.path);
    }
    assert!(!summary.has_failures());
    assert_eq!(api.count(Method::Post), 1);
    assert_eq!(api.localizations.lock().unwrap().len(), 1);
}

#[test]
fn missing_version_aborts_only_that_platform() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    let mut api = FakeApi::new();
    api.versions.retain(|(p, _)| *p == "MAC_OS");
    let auth = session();
    let client = StoreClient::new(&api, &auth, RetryPolicy::immediate(1));
    let cancel = AtomicBool::new(false);
    let sync = RemoteSync::new(&client, &store, &cancel);
    let locales = store.present_locales();

    let ios_summary = sync.push(&ios(), &locales, &FieldKind::ALL).unwrap();
    assert!(ios_summary.aborted.is_some());
    assert!(ios_summary.has_failures());

    let mac = PushTarget {
        platform: Platform::MacOs,
        ..ios()
    };
    let mac_summary = sync.push(&mac, &locales, &FieldKind::ALL).unwrap();
    assert!(!mac_summary.has_failures());
    assert_eq!(api.count(Method::Post), 3);
}

#[test]
fn store_reads_pushed_text_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = content(dir.path());
    fs::write(dir.path().join("de/promo.txt"), "Hand edited").unwrap();

    let de = locale::by_code("de").unwrap();
    let r = store.get(de, FieldKind::PromotionalText).unwrap().unwrap();
    assert_eq!(r.translated_text, "Hand edited");
    assert_eq!(r.source_fingerprint, "fp");
}
