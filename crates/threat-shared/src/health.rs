//! Standard health endpoints for both services.
//!
//! `/health` reports overall status (including the database when a pool is
//! supplied), `/health/ready` gates readiness on database connectivity, and
//! `/health/live` is an unconditional liveness probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::db::db_check;

#[derive(Clone)]
struct HealthState {
    system_name: String,
    version: String,
    pool: Option<PgPool>,
}

impl HealthState {
    fn environment(&self) -> String {
        crate::config::env_or("ENVIRONMENT", "development")
    }
}

/// Build the health router. Pass a pool to include database connectivity in
/// the checks; pass `None` for services without persistent state.
pub fn health_router(
    system_name: impl Into<String>,
    version: impl Into<String>,
    pool: Option<PgPool>,
) -> Router {
    let state = HealthState {
        system_name: system_name.into(),
        version: version.into(),
        pool,
    };
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> Response {
    let database = match &state.pool {
        Some(pool) => {
            if db_check(pool).await {
                "healthy".to_string()
            } else {
                "unhealthy: connection check failed".to_string()
            }
        }
        None => "not_required".to_string(),
    };
    let status = if database.starts_with("unhealthy") {
        "degraded"
    } else {
        "healthy"
    };
    Json(json!({
        "status": status,
        "system_name": state.system_name,
        "system_version": state.version,
        "environment": state.environment(),
        "timestamp": Utc::now().to_rfc3339(),
        "database": database,
    }))
    .into_response()
}

async fn ready(State(state): State<HealthState>) -> Response {
    if let Some(pool) = &state.pool {
        if !db_check(pool).await {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "system_name": state.system_name,
                    "error": "database connection check failed",
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response();
        }
    }
    Json(json!({
        "status": "ready",
        "system_name": state.system_name,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn live(State(state): State<HealthState>) -> Response {
    Json(json!({
        "status": "alive",
        "system_name": state.system_name,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_without_database() {
        let router = health_router("Test Service", "1.0.0", None);
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "not_required");
        assert_eq!(body["system_name"], "Test Service");
    }

    #[tokio::test]
    async fn test_ready_without_database() {
        let router = health_router("Test Service", "1.0.0", None);
        let (status, body) = get_json(router, "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_live_is_unconditional() {
        let router = health_router("Test Service", "1.0.0", None);
        let (status, body) = get_json(router, "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }
}
