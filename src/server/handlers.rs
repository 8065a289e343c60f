//! Route handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SESSION_HEADER;
use super::error::ApiError;
use super::state::AppState;
use crate::agents::DEFAULT_SESSION;
use crate::ingest::{PdfDocument, validate_pdf_filename};

/// Body returned by a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceChatResponse {
    pub transcribed: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub index_ready: bool,
}

/// A file pulled out of a multipart body
struct UploadedFile {
    filename: Option<String>,
    bytes: Bytes,
}

/// Session id from the request headers, or the shared default session
pub(super) fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

/// Read the multipart field called `name`, skipping any others
async fn read_field(multipart: &mut Multipart, name: &str) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(name) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok(UploadedFile { filename, bytes });
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field `{name}`."
    )))
}

/// Transcribe an uploaded recording and answer it
async fn answer_recording(
    state: &AppState,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<VoiceChatResponse, ApiError> {
    let audio = read_field(&mut multipart, "audio").await?;
    if audio.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded audio is empty.".to_string()));
    }

    debug!("Received {} bytes of audio", audio.bytes.len());
    let transcribed = state.transcriber.transcribe(audio.bytes.to_vec()).await?;
    let answer = state
        .assistant
        .ask(&session_id(headers), &transcribed)
        .await?;

    Ok(VoiceChatResponse {
        transcribed,
        answer: answer.answer,
    })
}

/// POST /upload-pdf
#[inline]
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_field(&mut multipart, "file").await?;
    let filename = upload.filename.unwrap_or_default();
    validate_pdf_filename(&filename)?;

    info!("Processing upload {} ({} bytes)", filename, upload.bytes.len());
    let report = state
        .assistant
        .ingest(vec![PdfDocument::new(filename, upload.bytes.to_vec())])
        .await
        .map_err(|e| ApiError::with_context("Processing error", &e))?;

    Ok(Json(UploadResponse {
        message: "PDF processed and stored in vector DB.".to_string(),
        chunks: report.chunks,
    }))
}

/// GET /chat?question=...
#[inline]
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = query.question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest(
            "Question must not be empty.".to_string(),
        ));
    }

    let answer = state.assistant.ask(&session_id(&headers), question).await?;
    Ok(Json(ChatResponse {
        question: question.to_string(),
        answer: answer.answer,
    }))
}

/// POST /voice-chat
#[inline]
pub async fn voice_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let reply = answer_recording(&state, &headers, multipart).await?;
    Ok(Json(reply))
}

/// POST /voice-chat/audio: the answer as spoken MP3
#[inline]
pub async fn voice_chat_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let reply = answer_recording(&state, &headers, multipart).await?;

    let artifact = state.synthesizer.synthesize(&reply.answer).await?;
    let audio = artifact.read().await?;
    drop(artifact);

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"response.mp3\"",
            ),
        ],
        audio,
    )
        .into_response())
}

/// DELETE /history
#[inline]
pub async fn clear_history(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let session = session_id(&headers);
    state.assistant.clear_history(&session);
    info!("Cleared history for session {}", session);
    StatusCode::NO_CONTENT
}

/// GET /health
#[inline]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let index_ready = state.assistant.index().exists().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        index_ready,
    }))
}
