//! Generation client: timeout, bounded retry with exponential backoff, and a
//! global concurrency cap around a [`GenerationBackend`].

use log::{debug, warn};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use vibecheck_rs_config::GenerationConfig;
use vibecheck_rs_protocol::{GenerationBackend, GenerationError, GenerationRequest, RawResponse};

static FENCE_OPEN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)```\w+"));
static FENCE_CLOSE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)```\n?$"));

/// Timeout and backoff schedule for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Shared generation entry point. Clones share the same concurrency budget.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl GenerationClient {
    /// Build a client from the `generation` config section.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self::with_policy(backend, RetryPolicy::from_config(config), config.concurrency)
    }

    pub fn with_policy(
        backend: Arc<dyn GenerationBackend>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Permits not currently held by in-flight calls.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one generation call to completion.
    ///
    /// The concurrency permit is held across every attempt and backoff sleep.
    /// Cancellation resolves to `Ok(None)`; any other error is returned once
    /// retries are exhausted or the error is not retryable.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        let Ok(_permit) = self.permits.acquire().await else {
            debug!("generation permits closed (model={})", request.model);
            return Ok(None);
        };

        let mut attempt = 0u32;
        loop {
            let call = self.backend.generate(request);
            let result = match tokio::time::timeout(self.policy.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(raw) => {
                    debug!(
                        "generation succeeded (model={}, attempt={})",
                        request.model,
                        attempt + 1
                    );
                    return Ok(Some(shape_response(raw)));
                }
                Err(GenerationError::Cancelled) => {
                    debug!("generation cancelled (model={})", request.model);
                    return Ok(None);
                }
                Err(err) if err.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "retrying generation (model={}, attempt={}, delay_ms={}): {}",
                        request.model,
                        attempt + 1,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "generation failed (model={}, attempts={}): {}",
                        request.model,
                        attempt + 1,
                        err
                    );
                    return Err(err);
                }
            }
        }
    }
}

/// Turn a raw backend response into displayable output data.
pub fn shape_response(raw: RawResponse) -> String {
    match raw {
        RawResponse::Image { mime_type, data } => format!("data:{mime_type};base64,{data}"),
        RawResponse::Text(text) => strip_code_fences(&text),
    }
}

/// Remove ```` ```lang ```` openers and trailing ```` ``` ```` closers, then trim.
pub fn strip_code_fences(text: &str) -> String {
    let (Ok(open), Ok(close)) = (FENCE_OPEN.as_ref(), FENCE_CLOSE.as_ref()) else {
        warn!("code fence patterns failed to compile; returning text unstripped");
        return text.trim().to_string();
    };
    let cleaned = open.replace_all(text, "");
    close.replace_all(&cleaned, "").trim().to_string()
}
