//! Upload relay: sends a document to the backend and tracks its status.
//!
//! `Uploading` is always reported before the terminal `Uploaded` / `Error`. A failed
//! upload is not retried; the user picks the file again.

use super::logs::ReasoningLog;
use crate::backend::{Backend, BackendError, UploadFile, UploadResponse};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    /// Backend accepted the document; carries its message.
    Uploaded(String),
    /// Transport, HTTP, file or decode failure; carries the reason.
    Error(String),
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Uploaded(_) | UploadStatus::Error(_))
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Idle => write!(f, "idle"),
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Uploaded(m) => write!(f, "uploaded: {}", m),
            UploadStatus::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Read `path` and send it to the backend. Runs without touching relay state, so a
/// front end can call it off the UI thread.
pub async fn transfer(backend: &dyn Backend, path: &Path) -> Result<UploadResponse, BackendError> {
    let file = UploadFile::read(path)?;
    backend.upload(&file).await
}

/// Status holder for uploads; at most one upload in flight.
#[derive(Debug, Default)]
pub struct UploadRelay {
    status: UploadStatus,
    pending: Option<u64>,
    next_seq: u64,
}

impl UploadRelay {
    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Mark an upload as started. Returns its sequence number, or `None` if one is already running.
    pub fn begin(&mut self) -> Option<u64> {
        if self.pending.is_some() {
            return None;
        }
        self.next_seq += 1;
        self.pending = Some(self.next_seq);
        self.status = UploadStatus::Uploading;
        Some(self.next_seq)
    }

    /// Apply the outcome of upload `seq` and record it in `reasoning`. Outcomes for any other
    /// sequence number are dropped and `None` is returned.
    pub fn finish(
        &mut self,
        seq: u64,
        result: Result<UploadResponse, BackendError>,
        reasoning: &mut ReasoningLog,
    ) -> Option<&UploadStatus> {
        if self.pending != Some(seq) {
            log::debug!("dropping stale upload result #{}", seq);
            return None;
        }
        self.pending = None;
        self.status = match result {
            Ok(res) => {
                log::info!("upload accepted: {}", res.message);
                reasoning.push(format!("Upload successful: {}", res.message));
                UploadStatus::Uploaded(res.message)
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("upload failed: {}", reason);
                reasoning.push(format!("Upload failed: {}", reason));
                UploadStatus::Error(reason)
            }
        };
        Some(&self.status)
    }

    /// Upload `path` end to end, reporting every status transition to `on_status`.
    /// Returns the terminal status, or `None` when another upload is in flight.
    pub async fn upload(
        &mut self,
        backend: &dyn Backend,
        path: &Path,
        reasoning: &mut ReasoningLog,
        on_status: &mut (dyn FnMut(&UploadStatus) + Send),
    ) -> Option<UploadStatus> {
        let seq = self.begin()?;
        on_status(&self.status);
        let result = transfer(backend, path).await;
        let status = self.finish(seq, result, reasoning)?.clone();
        on_status(&status);
        Some(status)
    }
}
