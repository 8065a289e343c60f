// Question answering: routing, retrieval-augmented answers and small talk

pub mod friendly;
pub mod memory;
pub mod prompts;
pub mod rag;
pub mod router;


use std::sync::Arc;
use tracing::{debug, info};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::config::{Config, IndexMode};
use crate::ingest::{PdfDocument, extract_text_blocking, validate_pdf_filename};
use crate::providers::ChatModel;
use crate::vector_index::VectorIndex;
use crate::{AssistantError, Result};

pub use friendly::FriendlyAgent;
pub use memory::{
    ConversationMemory, DEFAULT_SESSION, MAX_SESSIONS, Role, Session, SessionStore, Turn,
};
pub use rag::RagAnswerer;
pub use router::{KeywordRouter, ModelRouter, QuestionRouter, Route, router_for};

/// A routed answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub route: Route,
    pub answer: String,
}

/// Outcome of indexing a batch of uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub characters: usize,
    pub chunks: usize,
    pub mode: IndexMode,
}

/// Routes each question to the right answerer and keeps per-session memory
pub struct Assistant {
    router: Arc<dyn QuestionRouter>,
    rag: RagAnswerer,
    friendly: FriendlyAgent,
    sessions: SessionStore,
    index: Arc<VectorIndex>,
    chunking: ChunkingConfig,
    index_mode: IndexMode,
}

impl Assistant {
    #[inline]
    pub fn new(config: &Config, index: Arc<VectorIndex>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            router: router_for(config.router.strategy, Arc::clone(&model)),
            rag: RagAnswerer::new(
                Arc::clone(&index),
                Arc::clone(&model),
                config.retrieval.top_k,
            ),
            friendly: FriendlyAgent::new(model),
            sessions: SessionStore::new(),
            index,
            chunking: config.chunking.clone(),
            index_mode: config.index.mode,
        }
    }

    /// Replace the router chosen from configuration
    #[inline]
    pub fn with_router(mut self, router: Arc<dyn QuestionRouter>) -> Self {
        self.router = router;
        self
    }

    #[inline]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[inline]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Route `question` and answer it within `session_id`
    #[inline]
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer> {
        let route = self.router.route(question).await?;
        info!("Routing question to {} answerer", route);

        let session = self.sessions.get_or_create(session_id);
        let answer = match route {
            Route::Document => self.rag.answer(question, &session.document).await?,
            Route::Conversational => {
                self.friendly
                    .answer(question, &session.conversational)
                    .await?
            }
        };

        Ok(Answer { route, answer })
    }

    /// Extract, chunk and index uploaded PDFs
    ///
    /// The index writer is held from before extraction until the chunks are
    /// stored, so questions asked meanwhile are answered from the new index.
    #[inline]
    pub async fn ingest(&self, documents: Vec<PdfDocument>) -> Result<IngestReport> {
        for document in &documents {
            validate_pdf_filename(&document.filename)?;
        }

        let document_count = documents.len();
        let name = documents
            .iter()
            .map(|d| d.filename.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let writer = self.index.writer().await;
        let text = extract_text_blocking(documents).await?;
        if text.trim().is_empty() {
            return Err(AssistantError::Extraction(
                "no extractable text".to_string(),
            ));
        }

        let chunks: Vec<_> = chunk_text(&text, &self.chunking)
            .into_iter()
            .filter(|chunk| !chunk.content.trim().is_empty())
            .collect();
        debug!("Indexing {} chunks from {}", chunks.len(), name);

        let stored = match self.index_mode {
            IndexMode::Replace => writer.build(&chunks, &name).await?,
            IndexMode::Append => writer.append(&chunks, &name).await?,
        };
        drop(writer);

        info!("Indexed {} chunks from {} document(s)", stored, document_count);
        Ok(IngestReport {
            documents: document_count,
            characters: text.chars().count(),
            chunks: stored,
            mode: self.index_mode,
        })
    }

    /// Forget the conversation history of a session
    #[inline]
    pub fn clear_history(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }
}
