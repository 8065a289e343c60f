use std::sync::Arc;

use super::memory::ConversationMemory;
use super::prompts::friendly_prompt;
use crate::Result;
use crate::providers::ChatModel;

/// Open conversation with no retrieval
pub struct FriendlyAgent {
    model: Arc<dyn ChatModel>,
}

impl FriendlyAgent {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    #[inline]
    pub async fn answer(&self, question: &str, memory: &ConversationMemory) -> Result<String> {
        let prompt = friendly_prompt(&memory.render(), question);
        let answer = self.model.generate(&prompt).await?.trim().to_string();

        memory.record_exchange(question, &answer);
        Ok(answer)
    }
}
