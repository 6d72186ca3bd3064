//! Notifications: user-visible alerts created when an analysis completes.

pub mod model;
pub mod repository;
pub mod routes;
pub mod schemas;

pub use model::Notification;
pub use repository::NotificationRepository;
