//! JSON error envelope shared by both HTTP surfaces.

use serde::Serialize;
use serde_json::Value;

/// Error body returned on 4xx/5xx: `{detail}` or `{detail, details}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            details: None,
        }
    }

    pub fn with_details(detail: impl Into<String>, details: Value) -> Self {
        Self {
            detail: detail.into(),
            details: Some(details),
        }
    }
}
