use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API base, query string included.
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `None` for an empty or non-JSON body.
    pub body: Option<Value>,
    pub raw: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP exchange with the store. Status codes are returned, not judged;
/// `Err` means the request never got an answer.
pub trait Transport: Send + Sync {
    fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, RemoteError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, RemoteError> {
        let url = format!("{}{}", self.base_url, req.path);

        let builder = match req.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };
        let builder = builder.bearer_auth(bearer);
        let builder = match &req.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let resp = builder
            .send()
            .map_err(|e| RemoteError::Transient(e.to_string()))?;
        let status = resp.status().as_u16();
        let raw = resp
            .text()
            .map_err(|e| RemoteError::Transient(e.to_string()))?;
        let body = if raw.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw).ok()
        };

        Ok(ApiResponse { status, body, raw })
    }
}
