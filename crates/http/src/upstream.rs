//! Engine backed by an OpenAI-compatible `/completions` server (e.g. vLLM).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, Generation, InferenceEngine, SamplingParams};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct UpstreamEngine {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for UpstreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamEngine")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl UpstreamEngine {
    /// `base_url` includes the version prefix, e.g. `http://127.0.0.1:8000/v1`.
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    /// Polls `{base_url}/models` until the backend answers with success.
    pub async fn wait_until_ready(&self, attempts: u32, delay: Duration) -> Result<(), EngineError> {
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=attempts {
            match self.authorized(self.client.get(format!("{}/models", self.base_url))).send().await
            {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(base_url = %self.base_url, attempt, "Inference backend ready");
                    return Ok(());
                },
                Ok(resp) => last_error = format!("HTTP {}", resp.status()),
                Err(e) => last_error = e.to_string(),
            }
            tracing::debug!(attempt, %last_error, "Inference backend not ready yet");
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(EngineError::NotReady { attempts, last_error })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() { builder } else { builder.bearer_auth(&self.api_key) }
    }
}

#[async_trait]
impl InferenceEngine for UpstreamEngine {
    async fn generate(
        &self,
        prompt: &str,
        params: SamplingParams,
    ) -> Result<Generation, EngineError> {
        let body = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
        };
        let response = self
            .authorized(self.client.post(format!("{}/completions", self.base_url)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status { code: status.as_u16(), body });
        }

        let completion: CompletionResponse = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(EngineError::EmptyCompletion)?;
        let (prompt_tokens, completion_tokens) =
            completion.usage.map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
        Ok(Generation { text, prompt_tokens, completion_tokens })
    }
}
