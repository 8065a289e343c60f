//! Shared plumbing for blocking calls to hosted services.
//!
//! Every upstream client (Ollama, transcription, speech) builds its agent and
//! retries requests through this module so transient failures are handled the
//! same way everywhere.

use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, error, warn};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE
            .checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| u32::try_from(factor).ok())
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Build a blocking HTTP agent with a global timeout
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run `request_fn` until it succeeds, retrying server errors, rate limiting
/// and transport failures with exponential backoff
#[inline]
pub fn send_with_retry<T, F>(target: &str, policy: RetryPolicy, mut request_fn: F) -> Result<T>
where
    F: FnMut() -> Result<T, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        debug!("HTTP request attempt {}/{} to {}", attempt, policy.attempts, target);

        match request_fn() {
            Ok(response) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response);
            }
            Err(error) => {
                if !is_retryable(&error, attempt, policy.attempts) {
                    return Err(match error {
                        ureq::Error::StatusCode(status) => {
                            anyhow!("Client error: HTTP {}", status)
                        }
                        other => anyhow!("Non-retryable error: {}", other),
                    });
                }

                last_error = Some(anyhow!("Request error: {}", error));

                if attempt < policy.attempts {
                    let delay = policy.delay_for(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed for request to {}", target);

    Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
}

fn is_retryable(error: &ureq::Error, attempt: u32, attempts: u32) -> bool {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 || *status == 429 => {
            warn!(
                "Server error (status {}), attempt {}/{}",
                status, attempt, attempts
            );
            true
        }
        ureq::Error::StatusCode(status) => {
            warn!("Client error (status {}), not retrying", status);
            false
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => {
            warn!(
                "Transport error: {}, attempt {}/{}",
                error, attempt, attempts
            );
            true
        }
        _ => {
            warn!("Non-retryable error: {}", error);
            false
        }
    }
}
