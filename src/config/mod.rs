// Configuration management module
// TOML settings, environment credentials and application paths

pub mod settings;


pub use settings::{
    Config, ConfigError, IndexConfig, IndexMode, OllamaConfig, RetrievalConfig, RouterConfig,
    RouterStrategy, ServerConfig, SpeechConfig, TranscriptionConfig,
};
