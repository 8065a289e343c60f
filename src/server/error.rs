//! API error type and its JSON rendering.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::AssistantError;

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Errors a handler can answer with
#[derive(Debug)]
pub enum ApiError {
    /// 400: missing, malformed or unsupported input
    BadRequest(String),
    /// 500: anything that went wrong while serving a valid request
    Internal(String),
}

impl ApiError {
    #[inline]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal error whose detail is prefixed with `context`
    #[inline]
    pub fn with_context(context: &str, err: &AssistantError) -> Self {
        match err {
            AssistantError::UnsupportedFormat(msg) => Self::BadRequest(msg.clone()),
            other => Self::Internal(format!("{context}: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::BadRequest(msg) => {
                debug!("Rejected request: {}", msg);
                msg
            }
            Self::Internal(msg) => {
                error!("Request failed: {}", msg);
                msg
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<AssistantError> for ApiError {
    #[inline]
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::UnsupportedFormat(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    #[inline]
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}
