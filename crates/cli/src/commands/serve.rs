use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use xiyan_http::{AppState, ChatTemplate, EngineError, InferenceEngine, UpstreamEngine, create_router};

const READY_PROBE_DELAY: Duration = Duration::from_secs(5);

pub(crate) struct ServeArgs {
    pub host: String,
    pub port: u16,
    pub upstream: String,
    pub model: String,
    pub api_key: String,
    pub system: Option<String>,
    pub ready_attempts: u32,
}

pub(crate) async fn run(args: ServeArgs) -> Result<()> {
    let ServeArgs { host, port, upstream, model, api_key, system, ready_attempts } = args;
    let state = Arc::new(AppState::new(ChatTemplate::new(system), model.clone()));

    state.spawn_loader(async move {
        let engine = UpstreamEngine::new(&upstream, &model, &api_key)?;
        engine.wait_until_ready(ready_attempts, READY_PROBE_DELAY).await?;
        Ok::<_, EngineError>(Arc::new(engine) as Arc<dyn InferenceEngine>)
    });

    let router = create_router(state);
    let addr = format!("{host}:{port}");
    tracing::info!("Starting model API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
