//! Analyses HTTP surface: upload, listing, detail, image, and logs.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::OrchestratorState;

use super::model::AnalysisStatus;
use super::repository::{AnalysisFilter, AnalysisRepository};
use super::schemas::{
    AnalysisCreateResponse, AnalysisDetailResponse, AnalysisListItem, AnalysisPage, ListQuery,
    LogsResponse,
};
use super::storage::{media_type_for_path, sniff_content_type};
use super::validator::validate_upload;

pub fn analyses_router(state: OrchestratorState) -> Router {
    let body_limit = (state.settings.max_upload_size_bytes() as usize).saturating_mul(2);
    Router::new()
        .route("/analyses", post(create_analysis).get(list_analyses))
        .route("/analyses/:id", get(get_analysis))
        .route("/analyses/:id/image", get(get_analysis_image))
        .route("/analyses/:id/logs", get(get_analysis_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// `POST /api/v1/analyses`: multipart upload creating a queued analysis.
async fn create_analysis(
    State(state): State<OrchestratorState>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let mut file_bytes = None;
    let mut declared_type = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            declared_type = field.content_type().map(str::to_string);
            file_bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::BadRequest(e.to_string()))?,
            );
        } else {
            let _ = field.bytes().await;
        }
    }

    let bytes =
        file_bytes.ok_or_else(|| ServiceError::BadRequest("missing file field".to_string()))?;
    // Fall back to magic-byte sniffing when the client sent no type.
    let content_type =
        declared_type.unwrap_or_else(|| sniff_content_type(&bytes).to_string());
    validate_upload(Some(&content_type), bytes.len() as u64, &state.settings)?;

    let image_path = state.storage.save(&bytes, &content_type).await?;
    let analysis = AnalysisRepository::create(&state.pool, &image_path).await?;
    info!("Created analysis {} ({})", analysis.code, analysis.id);

    let body = AnalysisCreateResponse::from_analysis(&analysis);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `GET /api/v1/analyses`: filtered, paginated listing.
async fn list_analyses(
    State(state): State<OrchestratorState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AnalysisPage>, ServiceError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<AnalysisStatus>()
                .map_err(ServiceError::BadRequest)
        })
        .transpose()?;

    let filter = AnalysisFilter {
        code: query.code,
        status,
        created_at_from: query.created_at_from,
        created_at_to: query.created_at_to,
    };
    let page = query.page.unwrap_or(1).max(1);
    let size = query.size.unwrap_or(20).clamp(1, 100);

    let (analyses, total) = AnalysisRepository::list_all(&state.pool, &filter, page, size).await?;
    let items = analyses.iter().map(AnalysisListItem::from_analysis).collect();
    Ok(Json(AnalysisPage {
        items,
        total,
        page,
        size,
    }))
}

/// `GET /api/v1/analyses/{id}`: full detail.
async fn get_analysis(
    State(state): State<OrchestratorState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisDetailResponse>, ServiceError> {
    let analysis = AnalysisRepository::get_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Analysis not found".to_string()))?;
    Ok(Json(AnalysisDetailResponse::from_analysis(analysis)))
}

/// `GET /api/v1/analyses/{id}/image`: raw bytes with the inferred type.
async fn get_analysis_image(
    State(state): State<OrchestratorState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let image_path = AnalysisRepository::get_image_path(&state.pool, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Analysis not found".to_string()))?;

    let bytes = state
        .storage
        .read(&image_path)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Image file not found".to_string()))?;

    let media_type = media_type_for_path(&state.storage.full_path(&image_path));
    Ok(([(header::CONTENT_TYPE, media_type)], bytes).into_response())
}

/// `GET /api/v1/analyses/{id}/logs`: the processing log as one string.
async fn get_analysis_logs(
    State(state): State<OrchestratorState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LogsResponse>, ServiceError> {
    let analysis = AnalysisRepository::get_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Analysis not found".to_string()))?;
    Ok(Json(LogsResponse {
        logs: analysis.processing_logs.unwrap_or_default(),
    }))
}
