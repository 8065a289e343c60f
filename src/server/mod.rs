//! HTTP front end for the assistant.
//!
//! Exposes PDF upload, text chat, voice chat and a few housekeeping
//! endpoints over axum. Errors are returned as `{"detail": "..."}`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::{ApiError, ErrorBody};
pub use routes::{create_router, start_server};
pub use state::AppState;

/// Header carrying the conversation session id
pub const SESSION_HEADER: &str = "x-session-id";
