use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("Vector store not found.")]
    IndexNotFound,

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("No speech recognized.")]
    NoSpeechDetected,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod agents;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod ingest;
pub mod ollama;
pub mod providers;
pub mod server;
pub mod upstream;
pub mod vector_index;
pub mod voice;
