use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::agents::Assistant;
use crate::config::Config;
use crate::ingest::PdfDocument;
use crate::ollama::OllamaClient;
use crate::server::{AppState, start_server};
use crate::vector_index::VectorIndex;
use crate::voice::{AssemblyAiTranscriber, GoogleTtsSynthesizer};

/// Load configuration from `config_dir`, or from the default directory
#[inline]
pub fn load_config(config_dir: Option<PathBuf>) -> Result<Config> {
    let dir = match config_dir {
        Some(dir) => dir,
        None => Config::default_dir().context("Failed to resolve configuration directory")?,
    };
    Config::load(&dir)
}

/// Wire the Ollama client, vector index and agents together
#[inline]
pub async fn build_assistant(config: &Config) -> Result<(OllamaClient, Arc<Assistant>)> {
    let client = OllamaClient::new(config)?;
    let index = VectorIndex::open(config, Arc::new(client.clone()))
        .await
        .context("Failed to open vector index")?;
    let assistant = Assistant::new(config, Arc::new(index), Arc::new(client.clone()));
    Ok((client, Arc::new(assistant)))
}

async fn check_ollama(client: &OllamaClient) -> Result<()> {
    let client = client.clone();
    tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task failed")?
}

/// Start the HTTP server
#[inline]
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.set_host(host)?;
    }
    if let Some(port) = port {
        config.server.set_port(port)?;
    }

    let api_key = config.transcription_api_key()?;
    let (client, assistant) = build_assistant(&config).await?;
    check_ollama(&client)
        .await
        .context("Ollama is not ready; check that the server is running and both models are pulled")?;

    let transcriber = AssemblyAiTranscriber::new(&config.transcription, api_key)?;
    let synthesizer = GoogleTtsSynthesizer::new(&config.speech, config.scratch_audio_dir())?;
    let state = AppState::new(assistant, Arc::new(transcriber), Arc::new(synthesizer));

    info!(
        "Serving with chat model {} and embedding model {}",
        client.chat_model(),
        client.embedding_model()
    );
    start_server(&config.server, state).await?;
    Ok(())
}

fn read_document(path: &Path) -> Result<PdfDocument> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(PdfDocument::new(filename, bytes))
}

/// Index PDF files from disk
#[inline]
pub async fn ingest_files(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let documents = paths
        .iter()
        .map(|path| read_document(path))
        .collect::<Result<Vec<_>>>()?;

    let (_, assistant) = build_assistant(config).await?;
    let report = assistant.ingest(documents).await?;

    println!(
        "{} Indexed {} document(s): {} characters in {} chunks",
        style("✓").green(),
        report.documents,
        report.characters,
        report.chunks
    );
    println!("  Index mode: {}", style(format!("{:?}", report.mode)).cyan());
    Ok(())
}

/// Answer one question from the command line
#[inline]
pub async fn ask(config: &Config, question: &str, session: &str) -> Result<()> {
    let (_, assistant) = build_assistant(config).await?;
    let answer = assistant.ask(session, question).await?;

    println!("{} {}", style(format!("[{}]", answer.route)).dim(), answer.answer);
    Ok(())
}

/// Write `config` to its config file unless one already exists
///
/// Returns whether a file was written.
#[inline]
pub fn init_config(config: &Config) -> Result<bool> {
    if config.config_file_path().exists() {
        return Ok(false);
    }
    config.save()?;
    info!("Wrote configuration to {}", config.config_file_path().display());
    Ok(true)
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) {
    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }
    println!("  Embedding Model: {}", style(&config.ollama.model).cyan());
    println!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    println!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    println!("  Temperature: {}", style(config.ollama.temperature).cyan());
    println!();

    println!("{}", style("Retrieval:").bold().yellow());
    println!(
        "  Chunk Size: {} (overlap {})",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    println!("  Top K: {}", style(config.retrieval.top_k).cyan());
    println!("  Index Mode: {}", style(format!("{:?}", config.index.mode)).cyan());
    println!(
        "  Router: {}",
        style(format!("{:?}", config.router.strategy)).cyan()
    );
    println!();

    println!("{}", style("Server:").bold().yellow());
    println!("  Address: {}", style(config.server.bind_address()).cyan());
    println!(
        "  Upload Limit: {} bytes",
        style(config.server.max_upload_bytes).cyan()
    );
    println!();

    println!("{}", style("Voice:").bold().yellow());
    println!("  Transcription: {}", style(&config.transcription.base_url).cyan());
    println!(
        "  Speech: {} ({})",
        style(&config.speech.base_url).cyan(),
        config.speech.language
    );
    println!();

    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

/// Report on Ollama, the vector index and credentials
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 PDF Assistant Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    let client = OllamaClient::new(config)?;
    match check_ollama(&client).await {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!("   📋 Embedding Model: {}", client.embedding_model());
            println!("   💬 Chat Model: {}", client.chat_model());
        }
        Err(e) => println!("   ❌ Ollama: {:#}", e),
    }

    println!("🔍 Vector Index Status:");
    match VectorIndex::open(config, Arc::new(client)).await {
        Ok(index) => match index.count().await {
            Ok(0) => println!("   💤 LanceDB: No document uploaded yet"),
            Ok(count) => println!("   ✅ LanceDB: {} chunks indexed", count),
            Err(e) => println!("   ⚠️  LanceDB: {}", e),
        },
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!("🎙️  Voice Status:");
    match config.transcription_api_key() {
        Ok(_) => println!("   ✅ Transcription key: set"),
        Err(e) => println!("   ❌ {}", e),
    }

    Ok(())
}
