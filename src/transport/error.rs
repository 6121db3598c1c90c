//! Errors returned by HTTP handlers as `{"error": ...}` bodies

use crate::llm::LlmError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Shown to clients for any provider failure; details stay in the log
pub const PROVIDER_FAILURE_MESSAGE: &str = "The model provider could not complete the request";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is not something we can answer
    #[error("{0}")]
    BadRequest(String),

    /// The provider failed before any output was streamed
    #[error("provider error: {0:#}")]
    Provider(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short classification of a provider failure, for logs
    pub fn provider_kind(&self) -> Option<&'static str> {
        match self {
            ApiError::Provider(e) => Some(
                e.downcast_ref::<LlmError>()
                    .map(LlmError::kind)
                    .unwrap_or("other"),
            ),
            ApiError::BadRequest(_) => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::BadRequest(message) => {
                tracing::info!("Rejected chat request: {}", message);
                message.clone()
            }
            ApiError::Provider(e) => {
                tracing::error!(
                    kind = self.provider_kind().unwrap_or("other"),
                    "Chat request failed: {:#}",
                    e
                );
                PROVIDER_FAILURE_MESSAGE.to_string()
            }
        };

        (self.status(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}
