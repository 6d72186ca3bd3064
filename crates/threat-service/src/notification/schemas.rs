//! Response payloads for the notifications endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::Notification;

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub analysis_id: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationResponse {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            analysis_id: notification.analysis_id.to_string(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            is_read: notification.is_read,
            link: notification.link.clone(),
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationUnreadResponse {
    pub unread_count: usize,
    pub notifications: Vec<NotificationResponse>,
}
