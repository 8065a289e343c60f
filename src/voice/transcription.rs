use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::TranscriptionConfig;
use crate::upstream::{RetryPolicy, build_agent, send_with_retry};
use crate::{AssistantError, Result};

/// Speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe recorded audio, trimmed
    ///
    /// Fails with `NoSpeechDetected` when the service hears nothing.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

/// Client for an AssemblyAI-compatible transcription API
#[derive(Debug, Clone)]
pub struct AssemblyAiTranscriber {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
    poll_interval: Duration,
    deadline: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    text: Option<String>,
    error: Option<String>,
}

/// Terminal state of a transcript job
enum JobOutcome {
    Completed(Option<String>),
    Failed(String),
}

impl AssemblyAiTranscriber {
    #[inline]
    pub fn new(config: &TranscriptionConfig, api_key: String) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid transcription URL: {}", config.base_url))?;
        let deadline = Duration::from_secs(config.timeout_seconds);

        Ok(Self {
            base_url,
            api_key,
            agent: build_agent(deadline),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            deadline,
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override how often and how long a job is polled
    #[inline]
    pub fn with_polling(mut self, poll_interval: Duration, deadline: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.deadline = deadline;
        self
    }

    fn upload(&self, audio: &[u8]) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("/v2/upload")
            .context("Failed to build upload URL")?;

        debug!("Uploading {} bytes of audio", audio.len());

        let response_text = send_with_retry(url.as_str(), self.retry, || {
            self.agent
                .post(url.as_str())
                .header("authorization", &self.api_key)
                .header("Content-Type", "application/octet-stream")
                .send(audio)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to upload audio")?;

        let upload: UploadResponse =
            serde_json::from_str(&response_text).context("Failed to parse upload response")?;
        Ok(upload.upload_url)
    }

    fn create_job(&self, audio_url: &str) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("/v2/transcript")
            .context("Failed to build transcript URL")?;

        let request_json = serde_json::to_string(&TranscriptRequest { audio_url })
            .context("Failed to serialize transcript request")?;

        let response_text = send_with_retry(url.as_str(), self.retry, || {
            self.agent
                .post(url.as_str())
                .header("authorization", &self.api_key)
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to create transcript")?;

        let job: TranscriptResponse =
            serde_json::from_str(&response_text).context("Failed to parse transcript response")?;
        debug!("Created transcript job {} ({})", job.id, job.status);
        Ok(job.id)
    }

    fn wait_for_job(&self, id: &str) -> anyhow::Result<JobOutcome> {
        let url = self
            .base_url
            .join(&format!("/v2/transcript/{id}"))
            .context("Failed to build polling URL")?;
        let started = Instant::now();

        loop {
            let response_text = send_with_retry(url.as_str(), self.retry, || {
                self.agent
                    .get(url.as_str())
                    .header("authorization", &self.api_key)
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to poll transcript")?;

            let job: TranscriptResponse = serde_json::from_str(&response_text)
                .context("Failed to parse transcript status")?;

            match job.status.as_str() {
                "completed" => return Ok(JobOutcome::Completed(job.text)),
                "error" => {
                    return Ok(JobOutcome::Failed(
                        job.error.unwrap_or_else(|| "unknown error".to_string()),
                    ));
                }
                status => debug!("Transcript {} is {}", id, status),
            }

            if started.elapsed() >= self.deadline {
                warn!("Transcript {} did not finish within {:?}", id, self.deadline);
                return Err(anyhow!(
                    "Transcription timed out after {} seconds",
                    self.deadline.as_secs()
                ));
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Upload, transcribe and wait for the result
    #[inline]
    pub fn transcribe_blocking(&self, audio: &[u8]) -> Result<String> {
        let outcome = self
            .upload(audio)
            .and_then(|audio_url| self.create_job(&audio_url))
            .and_then(|id| self.wait_for_job(&id))
            .map_err(|e| AssistantError::Transcription(format!("{e:#}")))?;

        let text = match outcome {
            JobOutcome::Completed(text) => text.unwrap_or_default(),
            JobOutcome::Failed(message) => return Err(AssistantError::Transcription(message)),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::NoSpeechDetected);
        }

        info!("Transcribed {} characters of speech", text.len());
        Ok(text.to_string())
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    #[inline]
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.transcribe_blocking(&audio))
            .await
            .map_err(|e| AssistantError::Transcription(e.to_string()))?
    }
}
