use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use xiyan_core::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use xiyan_llm::{ChatCompletionResponse, ChatRequest, Choice, ResponseMessage, Role, Usage};

use crate::AppState;
use crate::api_error::ApiError;
use crate::engine::SamplingParams;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"status": "healthy", "model_loaded": state.is_loaded().await}))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": state.model_name, "object": "model", "owned_by": "xiyan"}]
    }))
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    let engine = state.engine().await.ok_or(ApiError::ModelNotLoaded)?;
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_owned()));
    }
    if request.stream == Some(true) {
        tracing::debug!("stream=true requested, answering non-streamed");
    }

    let params = SamplingParams {
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: request.top_p.unwrap_or(DEFAULT_TOP_P),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    };
    let prompt = state.template.render(&request.messages);

    let started = std::time::Instant::now();
    let generation = engine.generate(&prompt, params).await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis(),
        prompt_tokens = generation.prompt_tokens,
        completion_tokens = generation.completion_tokens,
        "Chat completion generated"
    );

    let created = chrono::Utc::now().timestamp();
    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{created}"),
        object: "chat.completion".to_owned(),
        created,
        model: request.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage { role: Some(Role::Assistant), content: generation.text },
            finish_reason: Some("stop".to_owned()),
        }],
        usage: Some(Usage {
            prompt_tokens: generation.prompt_tokens,
            completion_tokens: generation.completion_tokens,
            total_tokens: generation.prompt_tokens.saturating_add(generation.completion_tokens),
        }),
    }))
}
