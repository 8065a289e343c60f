#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests driving the HTTP router with deterministic fake models

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pdf_assistant::agents::Assistant;
use pdf_assistant::config::{Config, IndexConfig, IndexMode};
use pdf_assistant::providers::{ChatModel, EmbeddingModel};
use pdf_assistant::server::{AppState, create_router};
use pdf_assistant::vector_index::VectorIndex;
use pdf_assistant::voice::{AudioArtifact, SpeechSynthesizer, Transcriber};
use pdf_assistant::{AssistantError, Result};

const CAPITAL_PDF: &[u8] = include_bytes!("fixtures/capital.pdf");
const TWO_PAGES_PDF: &[u8] = include_bytes!("fixtures/two_pages.pdf");
const BLANK_PDF: &[u8] = include_bytes!("fixtures/blank.pdf");
const BOUNDARY: &str = "pdf-assistant-test-boundary";

// =============================================================================
// Fakes
// =============================================================================

struct HashEmbedder;

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0_f32; 64];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let mut hasher = DefaultHasher::new();
                    word.to_lowercase().hash(&mut hasher);
                    vector[(hasher.finish() % 64) as usize] += 1.0;
                }
                vector
            })
            .collect())
    }
}

/// Routes questions about capitals or Rust to the documents and answers
/// with the first context line that shares a word with the question
struct ScriptedModel;

impl ScriptedModel {
    fn section<'a>(prompt: &'a str, heading: &str, next: &str) -> &'a str {
        prompt
            .split_once(heading)
            .and_then(|(_, rest)| rest.split_once(next).map(|(body, _)| body))
            .unwrap_or_default()
            .trim()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.starts_with("Classify") {
            let question = Self::section(prompt, "Question:", "Answer:").to_lowercase();
            let about_documents = ["capital", "rust", "cargo", "document"]
                .iter()
                .any(|word| question.contains(word));
            return Ok(if about_documents { "pdf" } else { "friendly" }.to_string());
        }

        if prompt.starts_with("You are a friendly chatbot") {
            return Ok("I'm doing great, thanks for asking!".to_string());
        }

        let context = Self::section(prompt, "Context:", "Chat History:");
        let question = Self::section(prompt, "Question:", "Answer:").to_lowercase();
        let words: Vec<&str> = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .collect();
        let line = context
            .lines()
            .find(|line| {
                let line = line.to_lowercase();
                words.iter().any(|word| line.contains(word))
            })
            .unwrap_or("I don't know");
        Ok(line.trim().to_string())
    }
}

struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct SilentTranscriber;

#[async_trait]
impl Transcriber for SilentTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>) -> Result<String> {
        Err(AssistantError::NoSpeechDetected)
    }
}

/// Writes the answer text itself as the "audio"
struct EchoSynthesizer {
    scratch: PathBuf,
}

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact> {
        let artifact = AudioArtifact::new(
            self.scratch
                .join(format!("{}_reply.mp3", uuid::Uuid::new_v4())),
        );
        tokio::fs::write(artifact.path(), text.as_bytes()).await?;
        Ok(artifact)
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct TestApp {
    router: Router,
    scratch: PathBuf,
    _temp_dir: TempDir,
}

async fn make_app_with(mode: IndexMode, transcriber: Arc<dyn Transcriber>) -> TestApp {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        index: IndexConfig { mode },
        ..Config::default()
    };
    let scratch = config.scratch_audio_dir();
    std::fs::create_dir_all(&scratch).expect("should create scratch dir");

    let index = VectorIndex::open(&config, Arc::new(HashEmbedder))
        .await
        .expect("should open vector index");
    let assistant = Assistant::new(&config, Arc::new(index), Arc::new(ScriptedModel));
    let state = AppState::new(
        Arc::new(assistant),
        transcriber,
        Arc::new(EchoSynthesizer {
            scratch: scratch.clone(),
        }),
    );

    TestApp {
        router: create_router(state, config.server.max_upload_bytes),
        scratch,
        _temp_dir: temp_dir,
    }
}

async fn make_app() -> TestApp {
    make_app_with(
        IndexMode::Replace,
        Arc::new(FixedTranscriber("What is the capital of France?")),
    )
    .await
}

fn multipart_request(uri: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

fn chat_request(question: &str, session: Option<&str>) -> Request<Body> {
    let uri = format!(
        "/chat?question={}",
        url::form_urlencoded::byte_serialize(question.as_bytes()).collect::<String>()
    );
    let mut builder = Request::get(uri);
    if let Some(session) = session {
        builder = builder.header("x-session-id", session);
    }
    builder.body(Body::empty()).expect("request should build")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, body.to_vec())
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let json = serde_json::from_slice(&body).expect("body should be JSON");
    (status, json)
}

async fn upload(app: &TestApp, filename: &str, bytes: &[u8]) -> (StatusCode, Value) {
    send_json(app, multipart_request("/upload-pdf", "file", filename, bytes)).await
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn upload_pdf_reports_chunks() {
    let app = make_app().await;

    let (status, body) = upload(&app, "capital.pdf", CAPITAL_PDF).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "PDF processed and stored in vector DB.");
    assert_eq!(body["chunks"], 1);
}

#[tokio::test]
async fn upload_rejects_non_pdf_names() {
    let app = make_app().await;

    let (status, body) = upload(&app, "notes.txt", b"plain text").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only PDF files are supported.");
}

#[tokio::test]
async fn upload_accepts_uppercase_extension() {
    let app = make_app().await;

    let (status, _) = upload(&app, "CAPITAL.PDF", CAPITAL_PDF).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let app = make_app().await;

    let (status, body) = send_json(
        &app,
        multipart_request("/upload-pdf", "document", "capital.pdf", CAPITAL_PDF),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["detail"]
            .as_str()
            .is_some_and(|detail| detail.contains("file"))
    );
}

#[tokio::test]
async fn corrupt_pdf_is_a_processing_error() {
    let app = make_app().await;

    let (status, body) = upload(&app, "broken.pdf", b"%PDF-1.4 definitely not a pdf").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["detail"]
            .as_str()
            .is_some_and(|detail| detail.starts_with("Processing error: "))
    );
}

#[tokio::test]
async fn blank_pdf_is_a_processing_error() {
    let app = make_app().await;

    let (status, body) = upload(&app, "blank.pdf", BLANK_PDF).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["detail"]
            .as_str()
            .is_some_and(|detail| detail.contains("no extractable text"))
    );
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn upload_then_ask_about_the_capital() {
    let app = make_app().await;
    upload(&app, "capital.pdf", CAPITAL_PDF).await;

    let (status, body) =
        send_json(&app, chat_request("What is the capital of France?", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "What is the capital of France?");
    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|answer| answer.contains("Paris"))
    );
}

#[tokio::test]
async fn small_talk_does_not_need_an_index() {
    let app = make_app().await;

    let (status, body) = send_json(&app, chat_request("How are you today?", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "I'm doing great, thanks for asking!");
}

#[tokio::test]
async fn document_question_before_upload_fails() {
    let app = make_app().await;

    let (status, body) =
        send_json(&app, chat_request("What is the capital of France?", None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Vector store not found.");
}

#[tokio::test]
async fn blank_question_is_bad_request() {
    let app = make_app().await;

    let (status, _) = send_json(&app, chat_request("   ", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = Request::get("/chat")
        .body(Body::empty())
        .expect("request should build");
    let (status, _) = send_json(&app, missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replace_mode_forgets_previous_upload() {
    let app = make_app().await;
    upload(&app, "capital.pdf", CAPITAL_PDF).await;
    upload(&app, "rust.pdf", TWO_PAGES_PDF).await;

    let (_, body) = send_json(&app, chat_request("What is the capital of France?", None)).await;

    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|answer| !answer.contains("Paris"))
    );
}

#[tokio::test]
async fn append_mode_keeps_every_upload() {
    let app = make_app_with(
        IndexMode::Append,
        Arc::new(FixedTranscriber("What is the capital of France?")),
    )
    .await;
    upload(&app, "capital.pdf", CAPITAL_PDF).await;
    let (status, body) = upload(&app, "rust.pdf", TWO_PAGES_PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chunks"], 1);

    let (_, capital) =
        send_json(&app, chat_request("What is the capital of France?", None)).await;
    let (_, cargo) = send_json(&app, chat_request("Which tool is Cargo?", None)).await;

    assert!(capital["answer"].as_str().is_some_and(|a| a.contains("Paris")));
    assert!(cargo["answer"].as_str().is_some_and(|a| a.contains("package manager")));
}

// =============================================================================
// Voice
// =============================================================================

#[tokio::test]
async fn voice_chat_returns_transcript_and_answer() {
    let app = make_app().await;
    upload(&app, "capital.pdf", CAPITAL_PDF).await;

    let (status, body) = send_json(
        &app,
        multipart_request("/voice-chat", "audio", "question.wav", b"RIFF....WAVE"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcribed"], "What is the capital of France?");
    assert!(body["answer"].as_str().is_some_and(|a| a.contains("Paris")));
}

#[tokio::test]
async fn silent_recording_reports_no_speech() {
    let app = make_app_with(IndexMode::Replace, Arc::new(SilentTranscriber)).await;

    let (status, body) = send_json(
        &app,
        multipart_request("/voice-chat", "audio", "silence.wav", b"RIFF....WAVE"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "No speech recognized.");
}

#[tokio::test]
async fn empty_recording_is_bad_request() {
    let app = make_app().await;

    let (status, _) = send_json(
        &app,
        multipart_request("/voice-chat", "audio", "empty.wav", b""),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn voice_chat_audio_streams_mp3_and_cleans_up() {
    let app = make_app().await;
    upload(&app, "capital.pdf", CAPITAL_PDF).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/voice-chat/audio",
            "audio",
            "question.wav",
            b"RIFF....WAVE",
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "audio/mpeg"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"response.mp3\""
    );
    let audio = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    assert!(String::from_utf8_lossy(&audio).contains("Paris"));

    let leftovers = std::fs::read_dir(&app.scratch)
        .expect("scratch dir should exist")
        .count();
    assert_eq!(leftovers, 0);
}

// =============================================================================
// History and health
// =============================================================================

#[tokio::test]
async fn clearing_history_only_affects_that_session() {
    let app = make_app().await;
    send_json(&app, chat_request("Hello there", Some("alice"))).await;
    send_json(&app, chat_request("Hi!", Some("bob"))).await;

    let request = Request::delete("/history")
        .header("x-session-id", "alice")
        .body(Body::empty())
        .expect("request should build");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn health_reports_index_readiness() {
    let app = make_app().await;
    let health = || {
        Request::get("/health")
            .body(Body::empty())
            .expect("request should build")
    };

    let (status, before) = send_json(&app, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["status"], "ok");
    assert_eq!(before["index_ready"], false);

    upload(&app, "capital.pdf", CAPITAL_PDF).await;

    let (_, after) = send_json(&app, health()).await;
    assert_eq!(after["index_ready"], true);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = make_app().await;
    let request = Request::get("/health")
        .header(header::ORIGIN, "http://localhost:8501")
        .body(Body::empty())
        .expect("request should build");

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = make_app().await;
    let request = Request::get("/nope")
        .body(Body::empty())
        .expect("request should build");

    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
