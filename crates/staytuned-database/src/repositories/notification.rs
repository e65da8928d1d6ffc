//! Notification record persistence.

use async_trait::async_trait;
use sqlx::PgPool;

use staytuned_core::error::{AppError, ErrorKind};
use staytuned_core::result::AppResult;
use staytuned_core::traits::NotificationStore;
use staytuned_core::types::NewNotification;

/// Inserts rows into the `notifications` table.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn persist_notification(&self, notification: &NewNotification) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notifications (user_id, channel_id, post_id, type, title, message) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(notification.user_id)
        .bind(notification.channel_id)
        .bind(notification.post_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create notification", e))?;
        Ok(())
    }
}
