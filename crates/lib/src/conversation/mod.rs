//! Session-scoped conversation controller.
//!
//! A [`Conversation`] owns the chat transcript, the reasoning log and the upload status for
//! one session. Each operation is split into a synchronous `begin_*` step (local echo,
//! returns the request to send) and a `finish_*` step (applies the backend outcome), so a
//! UI thread can keep the state while the request runs on a worker. The async
//! [`Conversation::send_message`] and [`Conversation::upload`] drive both steps in one call.
//!
//! One question and one upload may be in flight at a time; further attempts are rejected
//! without side effects.

mod logs;
mod upload;

pub use logs::{ChatTranscript, LogMark, ReasoningLog, AGENT_PREFIX, THINKING, USER_PREFIX};
pub use upload::{transfer, UploadRelay, UploadStatus};

use crate::backend::{AskRequest, AskResponse, Backend, BackendError};
use crate::config::ConversationConfig;
use crate::session::SessionIdentity;
use std::path::Path;

/// Why an operation was not started. Rejections have no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("message is empty")]
    Empty,
    #[error("a question is already in flight")]
    AskInFlight,
    #[error("an upload is already in flight")]
    UploadInFlight,
}

/// A question that has been echoed locally and must now be sent.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub seq: u64,
    pub request: AskRequest,
}

#[derive(Debug, Default)]
pub struct Conversation {
    session_id: Option<String>,
    transcript: ChatTranscript,
    reasoning: ReasoningLog,
    uploads: UploadRelay,
    pending_turn: Option<u64>,
    next_turn: u64,
    clear_placeholder_on_error: bool,
}

impl Conversation {
    pub fn new(identity: Option<&SessionIdentity>, config: ConversationConfig) -> Self {
        Self {
            session_id: identity.map(|i| i.id().to_string()),
            clear_placeholder_on_error: config.clear_placeholder_on_error,
            ..Self::default()
        }
    }

    /// Attach the session identity once it is known (e.g. resolved after the window opened).
    pub fn set_session(&mut self, identity: &SessionIdentity) {
        self.session_id = Some(identity.id().to_string());
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn reasoning_log(&self) -> &ReasoningLog {
        &self.reasoning
    }

    pub fn upload_status(&self) -> &UploadStatus {
        self.uploads.status()
    }

    pub fn ask_in_flight(&self) -> bool {
        self.pending_turn.is_some()
    }

    pub fn upload_in_flight(&self) -> bool {
        self.uploads.in_flight()
    }

    /// Echo `text` into both logs and return the request to send.
    /// Whitespace-only input and a second concurrent question are rejected untouched.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, Rejected> {
        if text.trim().is_empty() {
            return Err(Rejected::Empty);
        }
        if self.pending_turn.is_some() {
            return Err(Rejected::AskInFlight);
        }
        self.reasoning.push(format!("Received message: {}", text));
        self.reasoning.push(THINKING);
        self.transcript.push_user(text);

        self.next_turn += 1;
        self.pending_turn = Some(self.next_turn);
        Ok(PendingTurn {
            seq: self.next_turn,
            request: AskRequest {
                question: text.to_string(),
                session_id: self.session_id.clone().unwrap_or_default(),
            },
        })
    }

    /// Apply the backend outcome for turn `seq`. Returns false (and changes nothing) when
    /// `seq` is not the pending turn.
    pub fn finish_turn(&mut self, seq: u64, result: Result<AskResponse, BackendError>) -> bool {
        if self.pending_turn != Some(seq) {
            log::debug!("dropping stale ask result #{}", seq);
            return false;
        }
        self.pending_turn = None;
        match result {
            Ok(res) => {
                // Clarification wins over answer in the transcript; empty strings count as absent.
                let reply = non_empty(res.clarification.as_deref())
                    .or_else(|| non_empty(res.answer.as_deref()));
                if let Some(r) = reply {
                    self.transcript.push_agent(r);
                }
                self.reasoning.reconcile(
                    res.reasoning_log.as_deref().unwrap_or_default(),
                    res.answer.as_deref(),
                );
                log::info!(
                    "turn #{} answered ({} reasoning steps)",
                    seq,
                    res.reasoning_log.as_ref().map(Vec::len).unwrap_or(0)
                );
            }
            Err(e) => {
                log::warn!("turn #{} failed: {}", seq, e);
                if self.clear_placeholder_on_error {
                    self.reasoning.clear_placeholder();
                }
                self.reasoning.push(format!("Error: {}", e));
            }
        }
        true
    }

    /// Send `text` and wait for the backend, applying the result.
    pub async fn send_message(&mut self, backend: &dyn Backend, text: &str) -> Result<(), Rejected> {
        let turn = self.begin_turn(text)?;
        let result = backend.ask(&turn.request).await;
        self.finish_turn(turn.seq, result);
        Ok(())
    }

    /// Mark an upload as started; the caller then runs [`transfer`] and hands the outcome to
    /// [`Conversation::finish_upload`].
    pub fn begin_upload(&mut self) -> Result<u64, Rejected> {
        self.uploads.begin().ok_or(Rejected::UploadInFlight)
    }

    pub fn finish_upload(
        &mut self,
        seq: u64,
        result: Result<crate::backend::UploadResponse, BackendError>,
    ) -> Option<&UploadStatus> {
        self.uploads.finish(seq, result, &mut self.reasoning)
    }

    /// Upload the document at `path`, reporting `Uploading` and then the terminal status
    /// to `on_status`. Returns the terminal status.
    pub async fn upload(
        &mut self,
        backend: &dyn Backend,
        path: &Path,
        on_status: &mut (dyn FnMut(&UploadStatus) + Send),
    ) -> Result<UploadStatus, Rejected> {
        self.uploads
            .upload(backend, path, &mut self.reasoning, on_status)
            .await
            .ok_or(Rejected::UploadInFlight)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
