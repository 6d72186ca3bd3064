//! Repository for notification database operations.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::model::Notification;

pub struct NotificationRepository;

impl NotificationRepository {
    /// Create a new notification (unread).
    pub async fn create(
        pool: &PgPool,
        analysis_id: Uuid,
        title: &str,
        message: &str,
        link: &str,
    ) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, analysis_id, title, message, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, analysis_id, title, message, is_read, link, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(analysis_id)
        .bind(title)
        .bind(message)
        .bind(link)
        .fetch_one(pool)
        .await
        .context("Failed to create notification")
    }

    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, analysis_id, title, message, is_read, link, created_at \
             FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch notification")
    }

    /// Unread notifications, newest first.
    pub async fn list_unread(pool: &PgPool, limit: i64) -> Result<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, analysis_id, title, message, is_read, link, created_at \
             FROM notifications WHERE is_read = FALSE \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list unread notifications")
    }

    /// Flip unread -> read. Returns false when the id is unknown.
    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<bool> {
        let outcome = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to mark notification as read")?;
        Ok(outcome.rows_affected() == 1)
    }
}
