//! Inference engine seam.

use async_trait::async_trait;
use thiserror::Error;

/// Sampling controls forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// One completion with token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("backend returned no completion")]
    EmptyCompletion,
    #[error("backend not ready after {attempts} attempts: {last_error}")]
    NotReady { attempts: u32, last_error: String },
}

/// A loaded model that turns a rendered prompt into text.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: SamplingParams,
    ) -> Result<Generation, EngineError>;
}
