//! Error types for the HTTP boundary, with an `IntoResponse` impl that maps
//! each variant to the status code spec.md's endpoint table expects.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("task not found: {0}")]
    NotFound(uuid::Uuid),

    #[error(transparent)]
    Runner(#[from] yieldos_runner::RunnerError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::NotFound(id) => (StatusCode::NOT_FOUND, format!("task not found: {id}")),
            WebError::Runner(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
