//! Model seams used by the index and the agents.
//!
//! The assistant talks to embedding and chat models only through these traits,
//! so tests can swap in deterministic fakes and deployments can swap backends.

use async_trait::async_trait;

use crate::{AssistantError, Result};

/// Turns text into fixed-length vectors
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed every text, preserving order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    #[inline]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AssistantError::EmbeddingService("no embedding returned".to_string()))
    }
}

/// Completes a prompt with generated text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
