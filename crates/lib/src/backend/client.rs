//! HTTP client for the document-QA backend (http://127.0.0.1:8000 by default).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Client for the backend HTTP API.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend api error: {0}")]
    Api(String),
    #[error("reading upload file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl BackendClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client: reqwest::Client::new(),
        }
    }

    /// Like [`BackendClient::new`] with a per-request timeout.
    pub fn with_timeout(base_url: Option<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            client,
        })
    }

    /// Build from config: resolved base URL and optional timeout.
    pub fn from_config(config: &crate::config::Config) -> Result<Self, BackendError> {
        let base_url = Some(crate::config::resolve_backend_url(config));
        match config.backend.timeout() {
            Some(t) => Self::with_timeout(base_url, t),
            None => Ok(Self::new(base_url)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /upload — multipart body with the document in field `file`.
    pub async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, BackendError> {
        let url = format!("{}/upload", self.base_url);
        log::debug!("uploading {} ({} bytes) to {}", file.file_name, file.bytes.len(), url);
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.mime_type())?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let res = self.client.post(&url).multipart(form).send().await?;
        decode_json(res).await
    }

    /// POST /ask — URL-encoded `question` and `session_id`.
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError> {
        let url = format!("{}/ask", self.base_url);
        log::debug!("asking {} (session {:?})", url, request.session_id);
        let res = self.client.post(&url).form(request).send().await?;
        decode_json(res).await
    }
}

fn normalize_base_url(base_url: Option<String>) -> String {
    base_url
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Non-2xx becomes `Api("{status} {body}")`; a 2xx body that does not parse becomes `Decode`.
async fn decode_json<T: serde::de::DeserializeOwned>(
    res: reqwest::Response,
) -> Result<T, BackendError> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(BackendError::Api(format!("{} {}", status, body).trim_end().to_string()));
    }
    let body = res.text().await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// A document to upload: file name and contents.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read the file at `path`; the file name is the last path component.
    pub fn read(path: &Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self { file_name, bytes })
    }

    /// Content type sent with the multipart part.
    pub fn mime_type(&self) -> &'static str {
        if has_pdf_extension(Path::new(&self.file_name)) {
            "application/pdf"
        } else {
            "application/octet-stream"
        }
    }
}

/// True when the path ends in `.pdf` (case-insensitive). Front ends use this as the file filter.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub message: String,
}

/// Form body for POST /ask. `session_id` is empty when no identity is available.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: String,
}

/// Every field is optional; absent fields are simply not rendered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub clarification: Option<String>,
    #[serde(default)]
    pub reasoning_log: Option<Vec<String>>,
}
