use std::sync::Arc;
use tracing::debug;

use super::memory::ConversationMemory;
use super::prompts::document_prompt;
use crate::Result;
use crate::providers::ChatModel;
use crate::vector_index::VectorIndex;

/// Answers questions from chunks retrieved out of the vector index
pub struct RagAnswerer {
    index: Arc<VectorIndex>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl RagAnswerer {
    #[inline]
    pub fn new(index: Arc<VectorIndex>, model: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self {
            index,
            model,
            top_k,
        }
    }

    /// Retrieve context, generate an answer and remember the exchange
    ///
    /// Memory is only touched once the model has answered.
    #[inline]
    pub async fn answer(&self, question: &str, memory: &ConversationMemory) -> Result<String> {
        let retrieved = self.index.query(question, self.top_k).await?;
        debug!("Answering from {} retrieved chunks", retrieved.len());

        let context = retrieved
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = document_prompt(&context, &memory.render(), question);
        let answer = self.model.generate(&prompt).await?.trim().to_string();

        memory.record_exchange(question, &answer);
        Ok(answer)
    }
}
