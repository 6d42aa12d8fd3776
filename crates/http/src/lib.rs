//! OpenAI-compatible model API for xiyan-sql.
//!
//! Serves `/v1/chat/completions` by rendering the conversation through a chat
//! template and handing it to an [`InferenceEngine`], which loads in the
//! background while the server already answers `/health`.

#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::single_call_fn, reason = "HTTP handlers are called once from router")]

pub mod api_error;
pub mod engine;
mod handlers;
mod template;
mod upstream;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

pub use api_error::ApiError;
pub use engine::{EngineError, Generation, InferenceEngine, SamplingParams};
pub use template::ChatTemplate;
pub use upstream::UpstreamEngine;

pub struct AppState {
    engine: RwLock<Option<Arc<dyn InferenceEngine>>>,
    pub template: ChatTemplate,
    /// Reported by `/v1/models`.
    pub model_name: String,
}

impl AppState {
    #[must_use]
    pub fn new(template: ChatTemplate, model_name: impl Into<String>) -> Self {
        Self { engine: RwLock::new(None), template, model_name: model_name.into() }
    }

    pub async fn set_engine(&self, engine: Arc<dyn InferenceEngine>) {
        *self.engine.write().await = Some(engine);
    }

    pub async fn engine(&self) -> Option<Arc<dyn InferenceEngine>> {
        self.engine.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.engine.read().await.is_some()
    }

    /// Runs `load` on a background task and installs the engine it yields.
    /// A failed load is logged and leaves the API answering 503.
    pub fn spawn_loader<F>(self: &Arc<Self>, load: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<Arc<dyn InferenceEngine>, EngineError>> + Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let started = std::time::Instant::now();
            tracing::info!("Loading inference engine...");
            match load.await {
                Ok(engine) => {
                    state.set_engine(engine).await;
                    tracing::info!(
                        "Inference engine loaded in {:.2}s",
                        started.elapsed().as_secs_f64()
                    );
                },
                Err(e) => tracing::error!(error = %e, "Inference engine failed to load"),
            }
        })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
