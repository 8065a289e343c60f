use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SpeechConfig;
use crate::upstream::{RetryPolicy, build_agent, send_with_retry};
use crate::{AssistantError, Result};

/// Longest piece of text the speech endpoint accepts in one request
pub const MAX_PIECE_CHARS: usize = 100;

const PIECE_DELIMITERS: &[char] = &['.', '!', '?', ';', ':', ',', '\n'];

/// Text to speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact>;
}

/// A synthesized MP3 in the scratch directory, deleted on drop
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
}

impl AudioArtifact {
    #[inline]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file into memory
    #[inline]
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for AudioArtifact {
    #[inline]
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch audio {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch audio {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Split text into pieces of at most `max_chars` characters
///
/// Pieces end after punctuation or a newline where possible, then at
/// whitespace, and as a last resort mid-word. Neighbouring short pieces are
/// merged back together.
#[inline]
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces: Vec<String> = Vec::new();

    for fragment in text.split_inclusive(PIECE_DELIMITERS) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        for part in split_long(fragment, max_chars) {
            match pieces.last_mut() {
                Some(last) if last.chars().count() + 1 + part.chars().count() <= max_chars => {
                    last.push(' ');
                    last.push_str(&part);
                }
                _ => pieces.push(part),
            }
        }
    }

    pieces
}

fn split_long(fragment: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for word in fragment.split_whitespace() {
        let word_chars = word.chars().count();
        let current_chars = current.chars().count();

        if current_chars > 0 && current_chars + 1 + word_chars <= max_chars {
            current.push(' ');
            current.push_str(word);
            continue;
        }

        if current_chars > 0 {
            parts.push(std::mem::take(&mut current));
        }

        if word_chars <= max_chars {
            current.push_str(word);
        } else {
            let chars: Vec<char> = word.chars().collect();
            let mut slices = chars.chunks(max_chars).peekable();
            while let Some(slice) = slices.next() {
                let slice: String = slice.iter().collect();
                if slices.peek().is_some() {
                    parts.push(slice);
                } else {
                    current = slice;
                }
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Client for a Google-Translate-TTS-compatible endpoint
#[derive(Debug, Clone)]
pub struct GoogleTtsSynthesizer {
    base_url: Url,
    language: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
    scratch_dir: PathBuf,
}

impl GoogleTtsSynthesizer {
    #[inline]
    pub fn new(config: &SpeechConfig, scratch_dir: PathBuf) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid speech URL: {}", config.base_url))?;

        Ok(Self {
            base_url,
            language: config.language.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry: RetryPolicy::default(),
            scratch_dir,
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn fetch_piece(&self, piece: &str, index: usize, total: usize) -> anyhow::Result<Vec<u8>> {
        let url = self
            .base_url
            .join("/translate_tts")
            .context("Failed to build speech URL")?;
        let total = total.to_string();
        let index = index.to_string();
        let length = piece.chars().count().to_string();

        send_with_retry(url.as_str(), self.retry, || {
            self.agent
                .get(url.as_str())
                .query("ie", "UTF-8")
                .query("q", piece)
                .query("tl", &self.language)
                .query("client", "tw-ob")
                .query("total", &total)
                .query("idx", &index)
                .query("textlen", &length)
                .header("User-Agent", "Mozilla/5.0")
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_vec())
        })
        .with_context(|| format!("Failed to synthesize piece {}", index))
    }

    /// Fetch every piece and write the concatenated MP3 to the scratch dir
    #[inline]
    pub fn synthesize_blocking(&self, text: &str) -> Result<AudioArtifact> {
        let pieces = split_for_speech(text, MAX_PIECE_CHARS);
        if pieces.is_empty() {
            return Err(AssistantError::Synthesis(
                "nothing to synthesize".to_string(),
            ));
        }

        debug!("Synthesizing {} pieces of speech", pieces.len());

        let mut audio = Vec::new();
        for (index, piece) in pieces.iter().enumerate() {
            let bytes = self
                .fetch_piece(piece, index, pieces.len())
                .map_err(|e| AssistantError::Synthesis(format!("{e:#}")))?;
            audio.extend_from_slice(&bytes);
        }

        std::fs::create_dir_all(&self.scratch_dir)?;
        let artifact = AudioArtifact::new(
            self.scratch_dir
                .join(format!("{}_reply.mp3", uuid::Uuid::new_v4())),
        );
        std::fs::write(artifact.path(), &audio)?;

        debug!(
            "Wrote {} bytes of speech to {}",
            audio.len(),
            artifact.path().display()
        );
        Ok(artifact)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsSynthesizer {
    #[inline]
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.synthesize_blocking(&text))
            .await
            .map_err(|e| AssistantError::Synthesis(e.to_string()))?
    }
}
