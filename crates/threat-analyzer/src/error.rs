//! Analyzer error taxonomy and HTTP mapping.
//!
//! Input rejections (type, size, guardrail) map to 400; an exhausted
//! provider chain maps to 500 carrying the per-engine errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use threat_shared::ErrorBody;

use crate::llm::EngineError;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Invalid file type: {content_type}. Allowed: {allowed}")]
    InvalidFileType {
        content_type: String,
        allowed: String,
    },

    #[error("Empty image content")]
    EmptyImage,

    #[error("File too large. Maximum: {max_mb}MB")]
    FileTooLarge { max_mb: u64 },

    #[error("{reason}")]
    GuardrailRejected { reason: String },

    #[error("All LLM providers failed")]
    AllProvidersFailed { engine_errors: Vec<EngineError> },

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AnalyzerError {
    fn into_response(self) -> Response {
        match self {
            AnalyzerError::InvalidFileType { .. }
            | AnalyzerError::EmptyImage
            | AnalyzerError::FileTooLarge { .. }
            | AnalyzerError::GuardrailRejected { .. }
            | AnalyzerError::MalformedUpload(_) => {
                let body = ErrorBody::new(self.to_string());
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AnalyzerError::AllProvidersFailed { engine_errors } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "detail": "All LLM providers failed",
                    "engine_errors": engine_errors,
                })),
            )
                .into_response(),
            AnalyzerError::Internal(e) => {
                let body = ErrorBody::new(e.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
