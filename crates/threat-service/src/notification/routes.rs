//! Notifications HTTP surface.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::OrchestratorState;

use super::repository::NotificationRepository;
use super::schemas::{NotificationResponse, NotificationUnreadResponse};

pub fn notifications_router(state: OrchestratorState) -> Router {
    Router::new()
        .route("/notifications/unread", get(get_unread))
        .route("/notifications/:id/read", post(mark_read))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UnreadQuery {
    limit: Option<i64>,
}

/// `GET /api/v1/notifications/unread`: unread alerts, newest first.
async fn get_unread(
    State(state): State<OrchestratorState>,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<NotificationUnreadResponse>, ServiceError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let notifications = NotificationRepository::list_unread(&state.pool, limit).await?;
    Ok(Json(NotificationUnreadResponse {
        unread_count: notifications.len(),
        notifications: notifications
            .iter()
            .map(NotificationResponse::from_notification)
            .collect(),
    }))
}

/// `POST /api/v1/notifications/{id}/read`: 204 on success, 404 if unknown.
async fn mark_read(
    State(state): State<OrchestratorState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    if NotificationRepository::mark_read(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound("Notification not found".to_string()))
    }
}
