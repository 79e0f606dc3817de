//! Integration tests: run a mock document-QA backend on a free port and drive the
//! conversation controller through the real HTTP client.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Form, Json, Router,
};
use lib::backend::BackendClient;
use lib::conversation::{Conversation, UploadStatus, THINKING};
use lib::config::ConversationConfig;
use lib::session::SessionIdentity;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct ReceivedFile {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

#[derive(Default)]
struct Recorded {
    uploads: Mutex<Vec<ReceivedFile>>,
    asks: Mutex<Vec<HashMap<String, String>>>,
}

type Shared = Arc<Recorded>;

async fn upload_ok(State(rec): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        rec.uploads.lock().unwrap().push(ReceivedFile {
            field: name,
            file_name,
            content_type,
            len,
        });
    }
    Json(json!({ "message": "PDF uploaded and embedded successfully." }))
}

async fn upload_fails() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "index unavailable")
}

async fn ask(State(rec): State<Shared>, Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
    let question = form.get("question").cloned().unwrap_or_default();
    rec.asks.lock().unwrap().push(form);
    match question.as_str() {
        "fail" => (StatusCode::BAD_GATEWAY, "boom").into_response(),
        "garbage" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "vague" => Json(json!({
            "clarification": "Which section do you mean?",
            "answer": "Section 2",
            "reasoning_log": ["ambiguous question"]
        }))
        .into_response(),
        _ => Json(json!({
            "answer": "42",
            "reasoning_log": ["step1", "step2"]
        }))
        .into_response(),
    }
}

async fn spawn_backend(upload_succeeds: bool) -> (String, Shared) {
    let rec: Shared = Arc::new(Recorded::default());
    let router = if upload_succeeds {
        Router::new().route("/upload", post(upload_ok))
    } else {
        Router::new().route("/upload", post(upload_fails))
    };
    let app = router.route("/ask", post(ask)).with_state(rec.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), rec)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn temp_pdf() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("docent-upload-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("paper.pdf");
    std::fs::write(&path, b"%PDF-1.4\n%fake\n").expect("write pdf");
    path
}

fn conversation() -> (Conversation, SessionIdentity) {
    let identity = SessionIdentity::ephemeral();
    (
        Conversation::new(Some(&identity), ConversationConfig::default()),
        identity,
    )
}

#[tokio::test]
async fn upload_reports_uploading_then_uploaded() {
    let (base, rec) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, _) = conversation();
    let path = temp_pdf();

    let mut seen = Vec::new();
    let status = convo
        .upload(&client, &path, &mut |s: &UploadStatus| seen.push(s.clone()))
        .await
        .expect("not rejected");

    let expected = UploadStatus::Uploaded("PDF uploaded and embedded successfully.".to_string());
    assert_eq!(status, expected);
    assert_eq!(seen, vec![UploadStatus::Uploading, expected.clone()]);
    assert_eq!(convo.upload_status(), &expected);
    assert_eq!(
        convo.reasoning_log().entries(),
        ["Upload successful: PDF uploaded and embedded successfully."]
    );

    let uploads = rec.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("paper.pdf"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(uploads[0].len, b"%PDF-1.4\n%fake\n".len());
}

#[tokio::test]
async fn upload_http_failure_never_reports_uploaded() {
    let (base, _) = spawn_backend(false).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, _) = conversation();
    let path = temp_pdf();

    let mut seen = Vec::new();
    let status = convo
        .upload(&client, &path, &mut |s: &UploadStatus| seen.push(s.clone()))
        .await
        .expect("not rejected");

    match &status {
        UploadStatus::Error(reason) => {
            assert!(reason.contains("500"), "reason: {}", reason);
            assert!(reason.contains("index unavailable"), "reason: {}", reason);
        }
        other => panic!("expected error status, got {:?}", other),
    }
    assert!(!seen.iter().any(|s| matches!(s, UploadStatus::Uploaded(_))));
    assert_eq!(seen.first(), Some(&UploadStatus::Uploading));
    assert!(convo.reasoning_log().entries()[0].starts_with("Upload failed: "));
}

#[tokio::test]
async fn upload_unreachable_backend_is_error() {
    let client = BackendClient::new(Some(closed_port_url()));
    let (mut convo, _) = conversation();
    let status = convo
        .upload(&client, &temp_pdf(), &mut |_: &UploadStatus| {})
        .await
        .expect("not rejected");
    assert!(matches!(status, UploadStatus::Error(_)));
    assert!(!convo.upload_in_flight());
}

#[tokio::test]
async fn ask_sends_form_and_merges_reasoning() {
    let (base, rec) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, identity) = conversation();

    convo
        .send_message(&client, "What is the answer?")
        .await
        .expect("not rejected");

    assert_eq!(
        convo.transcript().entries(),
        ["🧑 You: What is the answer?", "🤖 Agent: 42"]
    );
    assert_eq!(
        convo.reasoning_log().entries(),
        [
            "Received message: What is the answer?",
            "Reasoning: step1",
            "Reasoning: step2",
            "Answer: 42",
        ]
    );

    let asks = rec.asks.lock().unwrap();
    assert_eq!(asks.len(), 1);
    assert_eq!(asks[0].get("question").map(String::as_str), Some("What is the answer?"));
    assert_eq!(asks[0].get("session_id").map(String::as_str), Some(identity.id()));
}

#[tokio::test]
async fn ask_clarification_wins_in_transcript() {
    let (base, _) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, _) = conversation();

    convo.send_message(&client, "vague").await.unwrap();

    assert_eq!(
        convo.transcript().entries(),
        ["🧑 You: vague", "🤖 Agent: Which section do you mean?"]
    );
    assert_eq!(
        convo.reasoning_log().entries(),
        [
            "Received message: vague",
            "Reasoning: ambiguous question",
            "Answer: Section 2",
        ]
    );
}

#[tokio::test]
async fn ask_http_failure_logs_error_and_keeps_placeholder() {
    let (base, _) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, _) = conversation();

    convo.send_message(&client, "fail").await.unwrap();

    let log = convo.reasoning_log().entries();
    assert_eq!(log.len(), 3);
    assert_eq!(log[1], THINKING);
    assert!(log[2].starts_with("Error: backend api error: 502"), "{}", log[2]);
    assert!(log[2].ends_with("boom"), "{}", log[2]);
    assert_eq!(convo.transcript().len(), 1);
    assert!(!convo.ask_in_flight());
}

#[tokio::test]
async fn ask_malformed_body_is_an_error() {
    let (base, _) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    let (mut convo, _) = conversation();

    convo.send_message(&client, "garbage").await.unwrap();

    let last = convo.reasoning_log().entries().last().unwrap();
    assert!(last.starts_with("Error: malformed backend response"), "{}", last);
    assert_eq!(convo.transcript().len(), 1);
}

#[tokio::test]
async fn ask_unreachable_backend_is_an_error() {
    let client = BackendClient::new(Some(closed_port_url()));
    let (mut convo, _) = conversation();

    convo.send_message(&client, "anyone there?").await.unwrap();

    let last = convo.reasoning_log().entries().last().unwrap();
    assert!(last.starts_with("Error: backend request failed"), "{}", last);
    // A later successful turn clears the leftover placeholder.
    let (base, _) = spawn_backend(true).await;
    let client = BackendClient::new(Some(base));
    convo.send_message(&client, "again").await.unwrap();
    assert!(!convo.reasoning_log().entries().iter().any(|e| e == THINKING));
}
