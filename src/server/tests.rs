use super::handlers::session_id;
use super::*;
use crate::AssistantError;
use axum::body::to_bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;

async fn rendered(error: ApiError) -> (StatusCode, ErrorBody) {
    let response = error.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, body)
}

#[tokio::test]
async fn unsupported_format_is_bad_request() {
    let error = ApiError::from(AssistantError::UnsupportedFormat(
        "Only PDF files are supported.".to_string(),
    ));

    let (status, body) = rendered(error).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.detail, "Only PDF files are supported.");
}

#[tokio::test]
async fn other_errors_are_internal_with_display_text() {
    let (status, body) = rendered(ApiError::from(AssistantError::IndexNotFound)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.detail, "Vector store not found.");
}

#[tokio::test]
async fn context_prefixes_internal_detail() {
    let error = ApiError::with_context(
        "Processing error",
        &AssistantError::Extraction("no extractable text".to_string()),
    );

    let (status, body) = rendered(error).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body.detail,
        "Processing error: Extraction error: no extractable text"
    );
}

#[test]
fn context_keeps_unsupported_format_a_bad_request() {
    let error = ApiError::with_context(
        "Processing error",
        &AssistantError::UnsupportedFormat("Only PDF files are supported.".to_string()),
    );

    assert_eq!(error.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn session_defaults_when_header_missing_or_blank() {
    let mut headers = HeaderMap::new();
    assert_eq!(session_id(&headers), "default");

    headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));
    assert_eq!(session_id(&headers), "default");
}

#[test]
fn session_header_is_trimmed() {
    let mut headers = HeaderMap::new();
    headers.insert(SESSION_HEADER, HeaderValue::from_static(" alice "));

    assert_eq!(session_id(&headers), "alice");
}
