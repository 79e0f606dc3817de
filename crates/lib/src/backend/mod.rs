//! Document-QA backend abstraction and HTTP client.
//!
//! The backend exposes `POST /upload` (multipart PDF) and `POST /ask` (URL-encoded question
//! plus session id). [`Backend`] is the seam the conversation controller talks to;
//! [`BackendClient`] is the reqwest implementation.

mod client;

pub use client::{
    has_pdf_extension, AskRequest, AskResponse, BackendClient, BackendError, UploadFile,
    UploadResponse,
};

use async_trait::async_trait;

/// Operations the conversation controller needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload a document for indexing.
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, BackendError>;

    /// Ask a question within a session.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError>;
}

#[async_trait]
impl Backend for BackendClient {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, BackendError> {
        BackendClient::upload(self, file).await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError> {
        BackendClient::ask(self, request).await
    }
}
