use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::prompts::classification_prompt;
use crate::Result;
use crate::config::RouterStrategy;
use crate::providers::ChatModel;

/// Which answerer handles a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Answer from the indexed documents
    Document,
    /// Free-form conversation
    Conversational,
}

impl fmt::Display for Route {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Conversational => write!(f, "conversational"),
        }
    }
}

#[async_trait]
pub trait QuestionRouter: Send + Sync {
    async fn route(&self, question: &str) -> Result<Route>;
}

/// Lets the chat model classify each question
pub struct ModelRouter {
    model: Arc<dyn ChatModel>,
}

impl ModelRouter {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl QuestionRouter for ModelRouter {
    /// Anything other than an answer mentioning `pdf` is conversational
    #[inline]
    async fn route(&self, question: &str) -> Result<Route> {
        let classification = self
            .model
            .generate(&classification_prompt(question))
            .await?
            .trim()
            .to_lowercase();

        debug!("Model classified question as {:?}", classification);

        Ok(if classification.contains("pdf") {
            Route::Document
        } else {
            Route::Conversational
        })
    }
}

const DOCUMENT_PHRASES: &[&str] = &[
    "document",
    "pdf",
    "according to",
    "the file",
    "uploaded",
    "the text",
    "the paper",
    "the report",
    "in the context",
];

/// Routes on document-referential phrasing without calling a model
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    #[inline]
    pub fn classify(question: &str) -> Route {
        let question = question.to_lowercase();
        if DOCUMENT_PHRASES.iter().any(|phrase| question.contains(phrase)) {
            Route::Document
        } else {
            Route::Conversational
        }
    }
}

#[async_trait]
impl QuestionRouter for KeywordRouter {
    #[inline]
    async fn route(&self, question: &str) -> Result<Route> {
        Ok(Self::classify(question))
    }
}

/// Build the router selected in configuration
#[inline]
pub fn router_for(strategy: RouterStrategy, model: Arc<dyn ChatModel>) -> Arc<dyn QuestionRouter> {
    match strategy {
        RouterStrategy::Model => Arc::new(ModelRouter::new(model)),
        RouterStrategy::Keyword => Arc::new(KeywordRouter),
    }
}
