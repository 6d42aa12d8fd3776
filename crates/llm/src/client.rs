use std::time::Duration;

use async_trait::async_trait;

use crate::ai_types::{ChatCompletionResponse, ChatMessage, ChatRequest};
use crate::error::LlmError;

const MAX_RETRIES: usize = 3;
/// Multipliers applied to the base delay before attempt `n`.
const RETRY_BACKOFF: [u32; 4] = [0, 1, 2, 4];
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anything that can answer a chat conversation with a single text reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) retry_base: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("client", &self.client)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmClient {
    /// Creates a client for `base_url` (e.g. `http://host:8014/v1`); requests go
    /// to `{base_url}/chat/completions`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, LlmError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::ClientInit(e.to_string()))?;
        Ok(Self { client, api_key, base_url, model, retry_base: DEFAULT_RETRY_BASE })
    }

    /// Scales the pause between retries of transient failures.
    #[must_use]
    pub const fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion request and return the first choice's content.
    ///
    /// Transient failures (connection errors, 429, 5xx) are retried with
    /// growing pauses; other statuses fail immediately.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails, the API returns a
    /// non-success status, the response body cannot be parsed, or the choices
    /// array is empty.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let factor = RETRY_BACKOFF.get(attempt).copied().unwrap_or(4);
                let delay = self.retry_base.saturating_mul(factor);
                tokio::time::sleep(delay).await;
                tracing::warn!("LLM retry attempt {attempt}/{MAX_RETRIES} after {delay:?}");
            }

            let mut builder =
                self.client.post(format!("{}/chat/completions", self.base_url)).json(request);
            if !self.api_key.is_empty() {
                builder = builder.bearer_auth(&self.api_key);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::HttpRequest(e));
                    continue;
                },
            };

            let status = response.status();
            if status.is_success() {
                let body = match response.text().await {
                    Ok(b) => b,
                    Err(e) => {
                        last_error = Some(LlmError::HttpRequest(e));
                        continue;
                    },
                };

                let chat_response: ChatCompletionResponse =
                    serde_json::from_str(&body).map_err(|e| LlmError::JsonParse {
                        context: format!(
                            "chat completion response (body: {})",
                            truncate(&body, 200)
                        ),
                        source: e,
                    })?;

                let first_choice = chat_response.choices.first().ok_or(LlmError::EmptyResponse)?;

                return Ok(first_choice.message.content.clone());
            }

            let status_code = status.as_u16();
            let body =
                response.text().await.unwrap_or_else(|_| "Could not read error body".to_owned());

            let err = LlmError::HttpStatus { code: status_code, body };
            if err.is_transient() {
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(LlmError::RetriesExhausted(Box::new(last_error.unwrap_or(LlmError::EmptyResponse))))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = ChatRequest::new(&self.model, messages);
        self.chat_completion(&request).await
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
