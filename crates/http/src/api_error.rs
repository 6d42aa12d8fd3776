//! Typed API error for HTTP handlers.
//!
//! Renders as `{"detail": "message"}`, the error shape OpenAI-compatible
//! clients already understand.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::engine::EngineError;

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request: invalid input from caller.
    BadRequest(String),
    /// 503 Service Unavailable: the engine has not finished loading.
    ModelNotLoaded,
    /// 500 Internal Server Error: inference failed; the detail is returned.
    Inference(EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ModelNotLoaded => {
                (StatusCode::SERVICE_UNAVAILABLE, "模型尚未加载完成".to_owned())
            },
            Self::Inference(err) => {
                tracing::error!(error = %err, "inference failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("推理过程出错: {err}"))
            },
        };
        let body = serde_json::json!({"detail": message});
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Inference(err)
    }
}
