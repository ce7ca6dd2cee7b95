use std::path::PathBuf;

/// Missing or unusable settings. Always fatal before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    Missing(&'static str),
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("invalid base URL pattern: {0}")]
    InvalidUrl(#[from] regex::Error),
    #[error("failed to read private key {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Local persistence failures. Fatal for the affected locale only.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure talking to the translation backend. The locale is skipped.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid backend response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Transient,
    Validation,
    Authorization,
    NotFound,
    Decode,
}

/// Failure talking to the store API.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("rejected by store (HTTP {status}): {detail}")]
    Validation { status: u16, detail: String },
    #[error("not authorized (HTTP {status}): {detail}")]
    Authorization { status: u16, detail: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("unexpected store response: {0}")]
    Decode(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::Transient(_) => RemoteErrorKind::Transient,
            RemoteError::Validation { .. } => RemoteErrorKind::Validation,
            RemoteError::Authorization { .. } | RemoteError::Signing(_) => {
                RemoteErrorKind::Authorization
            }
            RemoteError::NotFound(_) => RemoteErrorKind::NotFound,
            RemoteError::Decode(_) => RemoteErrorKind::Decode,
        }
    }

    /// Authorization failures survive only one forced token refresh; after
    /// that nothing else in the run can succeed.
    pub fn is_fatal(&self) -> bool {
        self.kind() == RemoteErrorKind::Authorization
    }
}

/// Run-level errors that stop a phase entirely.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("cancelled")]
    Cancelled,
}
