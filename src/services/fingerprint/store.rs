use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::field::{FieldKind, SourceField};
use crate::model::locale::{self, Locale};
use crate::model::record::TranslationRecord;

pub const SIDECAR_FILE: &str = "full_translation.json";

/// Per-(locale, field) record storage. Writes are atomic: a reader sees either
/// the previous record or the new one, never a mix.
pub trait RecordStore: Send + Sync {
    fn get(&self, locale: &Locale, kind: FieldKind)
        -> Result<Option<TranslationRecord>, StoreError>;

    /// Persist several records of one locale as a unit.
    fn put_all(&self, locale: &Locale, records: &[TranslationRecord]) -> Result<(), StoreError>;

    fn put(&self, locale: &Locale, record: &TranslationRecord) -> Result<(), StoreError> {
        self.put_all(locale, std::slice::from_ref(record))
    }
}

type Sidecar = BTreeMap<FieldKind, TranslationRecord>;

/// Text file per field plus one JSON sidecar per locale directory.
pub struct FsRecordStore {
    root: PathBuf,
    locks: Mutex<HashMap<&'static str, Arc<Mutex<()>>>>,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locale_dir(&self, locale: &Locale) -> PathBuf {
        self.root.join(locale.code)
    }

    pub fn text_path(&self, locale: &Locale, kind: FieldKind) -> PathBuf {
        self.locale_dir(locale).join(kind.file_name())
    }

    pub fn sidecar_path(&self, locale: &Locale) -> PathBuf {
        self.locale_dir(locale).join(SIDECAR_FILE)
    }

    /// Catalog locales that have a directory under the root, source included.
    pub fn present_locales(&self) -> Vec<&'static Locale> {
        locale::all()
            .iter()
            .filter(|l| self.locale_dir(l).is_dir())
            .collect()
    }

    /// Load the English source fields. Missing files are skipped with a warning.
    pub fn load_sources(&self) -> Result<Vec<SourceField>, StoreError> {
        let source = locale::source();
        let mut out = Vec::new();

        for kind in FieldKind::ALL {
            let path = self.text_path(source, kind);
            match read_trimmed(&path)? {
                Some(text) => out.push(SourceField::new(kind, text)),
                None => warn!(path = %path.display(), "source file not found"),
            }
        }

        Ok(out)
    }

    fn lock_for(&self, locale: &Locale) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(locale.code).or_default().clone()
    }

    fn load_sidecar(&self, locale: &Locale) -> Result<Sidecar, StoreError> {
        let path = self.sidecar_path(locale);
        if !path.exists() {
            return Ok(Sidecar::new());
        }

        let data = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;

        let mut sidecar: Sidecar = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                // Entries become untracked and get retranslated; the next
                // write replaces the file.
                warn!(path = %path.display(), error = %e, "ignoring unreadable sidecar");
                return Ok(Sidecar::new());
            }
        };

        for (kind, record) in sidecar.iter_mut() {
            record.locale = locale.code.to_string();
            record.kind = *kind;
        }

        Ok(sidecar)
    }
}

impl RecordStore for FsRecordStore {
    fn get(
        &self,
        locale: &Locale,
        kind: FieldKind,
    ) -> Result<Option<TranslationRecord>, StoreError> {
        let path = self.text_path(locale, kind);
        let Some(text) = read_trimmed(&path)? else {
            return Ok(None);
        };

        let mut sidecar = self.load_sidecar(locale)?;

        let record = match sidecar.remove(&kind) {
            // The file on disk wins over the sidecar copy so manual edits are
            // what gets pushed.
            Some(mut r) => {
                r.translated_text = text;
                r
            }
            None => TranslationRecord {
                locale: locale.code.to_string(),
                kind,
                translated_text: text,
                source_fingerprint: String::new(),
                notes: String::new(),
                over_limit: false,
                timestamp: modified_at(&path),
            },
        };

        Ok(Some(record))
    }

    fn put_all(&self, locale: &Locale, records: &[TranslationRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let lock = self.lock_for(locale);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        // Text first. A crash before the sidecar lands leaves the new text
        // under the previous record, which is still a valid translation.
        for r in records {
            write_atomic(&self.text_path(locale, r.kind), r.translated_text.as_bytes())?;
        }

        let mut sidecar = self.load_sidecar(locale)?;
        for r in records {
            sidecar.insert(r.kind, r.clone());
        }

        let json = serde_json::to_string_pretty(&sidecar)?;
        write_atomic(&self.sidecar_path(locale), json.as_bytes())?;

        debug!(locale = locale.code, count = records.len(), "records persisted");
        Ok(())
    }
}

fn read_trimmed(path: &Path) -> Result<Option<String>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(text.to_string()))
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "record".to_string(),
    };
    p.set_file_name(format!(".{file_name}.tmp"));
    p
}
