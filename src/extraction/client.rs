//! Model invocation with a per-attempt timeout and sequential retries.
//!
//! Backoff after failed attempt `n` is `2n` seconds (2s, 4s, 6s, ...).
//! Only failures tagged `retryable` are retried; everything else ends the
//! call on the spot. Dropping the returned future cancels the call and no
//! further attempt is scheduled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{CallParameters, ExtractionSettings};
use crate::providers::{CompletionRequest, LlmProvider, Message, StopReason};

use super::error::{AttemptError, ExtractionError};

/// Seconds of backoff added per failed attempt.
pub const BACKOFF_STEP_SECS: u64 = 2;

/// Delay before the retry that follows failed attempt `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt).saturating_mul(BACKOFF_STEP_SECS))
}

/// Thin wrapper around an [`LlmProvider`] enforcing timeout and retry policy.
#[derive(Clone)]
pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
    max_retries: u32,
    timeout: Duration,
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("model", &self.provider.model_id())
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ExtractionClient {
    /// Bind a provider to the retry and timeout settings.
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &ExtractionSettings) -> Self {
        Self {
            provider,
            max_retries: settings.max_retries(),
            timeout: Duration::from_secs(settings.timeout_seconds()),
        }
    }

    /// One attempt: a single provider call bounded by the timeout.
    ///
    /// # Errors
    ///
    /// Returns an [`AttemptError`] classified from the provider failure or
    /// the timeout.
    pub async fn request(
        &self,
        messages: &[Message],
        params: CallParameters,
    ) -> Result<String, AttemptError> {
        let request = CompletionRequest {
            messages: messages.to_vec(),
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_output_tokens),
            json_output: self.provider.supports_json_mode(),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                AttemptError::transient(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "model responded"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!("model output hit the token limit and may be truncated");
        }
        Ok(response.text)
    }

    /// Run `attempt` until it succeeds, fails fatally, or the retry budget
    /// is spent. Attempts are numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error, stamped with the attempt count.
    pub async fn run_with_retries<T, F, Fut>(&self, mut attempt: F) -> Result<T, ExtractionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut number: u32 = 1;
        loop {
            match attempt(number).await {
                Ok(value) => {
                    if number > 1 {
                        info!(attempt = number, "extraction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(failure) if failure.retryable && number <= self.max_retries => {
                    let delay = backoff_delay(number);
                    warn!(
                        attempt = number,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %failure.error,
                        "extraction attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    number = number.saturating_add(1);
                }
                Err(failure) => {
                    warn!(
                        attempt = number,
                        retryable = failure.retryable,
                        error = %failure.error,
                        "extraction failed"
                    );
                    return Err(failure.error.with_attempts(number));
                }
            }
        }
    }
}
