use std::time::Duration;

use analysis_console_core::env_non_empty;

use crate::ai_types::{ChatRequest, ChatResponse};
use crate::error::LlmError;

/// Maximum serialized size of structured source data included in a prompt.
pub const MAX_SOURCE_DATA_LEN: usize = 24_000;
/// Default model used when `ANALYSIS_CONSOLE_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_RETRIES: usize = 3;
const RETRY_DELAYS: [u32; 4] = [0, 1, 2, 4];
/// Longest server-requested wait honored between retries, in retry units.
pub(crate) const MAX_RETRY_AFTER_STEPS: u32 = 30;

/// Client for the generation endpoint.
pub struct LlmClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    retry_unit: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Creates a new client with the given API key and base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        let model =
            env_non_empty("ANALYSIS_CONSOLE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ClientInit(e.to_string()))?;
        Ok(Self { client, api_key, base_url, model, retry_unit: Duration::from_secs(1) })
    }

    /// Sets a custom model for this client.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Scales the retry backoff schedule (default one second per step).
    #[must_use]
    pub const fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat completion request and return the extracted content string.
    ///
    /// Transient failures (transport errors, 429 and 5xx gateway statuses) are
    /// retried with a 0/1/2/4 step backoff. A `Retry-After` header on the
    /// failed response replaces the step, capped at [`MAX_RETRY_AFTER_STEPS`].
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails, the API returns a
    /// non-success status, the response body cannot be parsed, or the choices
    /// array is empty.
    pub(crate) async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            let failure = match self.send_once(request).await {
                Ok(content) => return Ok(content),
                Err(failure) => failure,
            };
            if !failure.error.is_transient() {
                return Err(failure.error);
            }
            if attempt >= MAX_RETRIES {
                return Err(LlmError::RetriesExhausted(Box::new(failure.error)));
            }
            attempt = attempt.saturating_add(1);
            let delay = self.retry_unit.saturating_mul(retry_steps(attempt, failure.retry_after));
            tracing::warn!(
                attempt,
                max = MAX_RETRIES,
                ?delay,
                error = %failure.error,
                "generation call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, AttemptFailure> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(AttemptFailure::from)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            let body =
                response.text().await.unwrap_or_else(|_| "Could not read error body".to_owned());
            return Err(AttemptFailure {
                error: LlmError::HttpStatus { code: status.as_u16(), body },
                retry_after,
            });
        }

        let body = response.text().await.map_err(AttemptFailure::from)?;
        let chat_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::JsonParse {
                context: format!("chat completion response (body: {})", truncate(&body, 200)),
                source: e,
            })?;
        let first_choice = chat_response.choices.first().ok_or(LlmError::EmptyResponse)?;
        Ok(first_choice.message.content.clone())
    }
}

/// One failed request plus the server's `Retry-After` hint, in seconds.
struct AttemptFailure {
    error: LlmError,
    retry_after: Option<u32>,
}

impl From<LlmError> for AttemptFailure {
    fn from(error: LlmError) -> Self {
        Self { error, retry_after: None }
    }
}

impl From<reqwest::Error> for AttemptFailure {
    fn from(error: reqwest::Error) -> Self {
        LlmError::HttpRequest(error).into()
    }
}

/// Backoff steps before retry number `attempt` (1-based).
pub(crate) fn retry_steps(attempt: usize, retry_after: Option<u32>) -> u32 {
    match retry_after {
        Some(secs) => secs.min(MAX_RETRY_AFTER_STEPS),
        None => RETRY_DELAYS.get(attempt).copied().unwrap_or(4),
    }
}

/// Truncates a string to the given maximum length at a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}
