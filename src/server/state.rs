//! State shared by every route handler.

use std::sync::Arc;

use crate::agents::Assistant;
use crate::voice::{SpeechSynthesizer, Transcriber};

/// Shared application state.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    #[inline]
    pub fn new(
        assistant: Arc<Assistant>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            assistant,
            transcriber,
            synthesizer,
        }
    }
}
