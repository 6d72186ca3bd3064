//! Analyzer HTTP surface: one endpoint turning a file upload into a full
//! threat report.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use tracing::info;

use crate::config::Settings;
use crate::error::AnalyzerError;
use crate::schemas::AnalysisResponse;
use crate::service::ThreatModelService;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub service: Arc<ThreatModelService>,
}

/// API router for the analyzer. The body limit is set above the configured
/// upload maximum so oversize uploads reach the 400 handler instead of
/// being cut off by the framework.
pub fn api_router(state: AppState) -> Router {
    let body_limit = (state.settings.max_upload_size_bytes() as usize).saturating_mul(2);
    Router::new()
        .route("/api/v1/threat-model/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// `POST /api/v1/threat-model/analyze`: multipart `file` plus the reserved
/// `confidence`/`iou` form fields.
async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AnalyzerError> {
    let mut file_bytes = None;
    let mut file_content_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalyzerError::MalformedUpload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_content_type = field.content_type().map(str::to_string);
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AnalyzerError::MalformedUpload(e.to_string()))?,
                );
            }
            // Reserved detection thresholds; accepted and ignored.
            Some("confidence") | Some("iou") => {
                let _ = field.text().await;
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let contents =
        file_bytes.ok_or_else(|| AnalyzerError::MalformedUpload("missing file field".into()))?;

    let content_type = file_content_type.unwrap_or_default();
    if !state.settings.allowed_image_types.contains(&content_type) {
        return Err(AnalyzerError::InvalidFileType {
            content_type,
            allowed: state.settings.allowed_image_types.join(", "),
        });
    }
    if contents.is_empty() {
        return Err(AnalyzerError::EmptyImage);
    }
    if contents.len() as u64 > state.settings.max_upload_size_bytes() {
        return Err(AnalyzerError::FileTooLarge {
            max_mb: state.settings.max_upload_size_mb,
        });
    }

    info!("Running analysis: size={} bytes", contents.len());
    let response = state.service.run_full_analysis(&contents).await?;
    Ok(Json(response))
}
