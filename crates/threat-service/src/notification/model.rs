//! Notification entity - alert when an analysis is completed.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A user alert with a weak back-reference to its analysis. Deleted only
/// via the cascade when the referenced analysis is deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub link: String,
    pub created_at: DateTime<Utc>,
}
