//! Subscription lookups.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use staytuned_core::error::{AppError, ErrorKind};
use staytuned_core::result::AppResult;
use staytuned_core::traits::SubscriptionStore;
use staytuned_core::types::{ChannelId, NotificationLevel, Subscriber, UserId};

/// Read-only queries over the `subscriptions` table.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn subscribers_of(&self, channel_id: ChannelId) -> AppResult<Vec<Subscriber>> {
        let rows: Vec<(UserId, String)> = sqlx::query_as(
            "SELECT user_id, notification_level FROM subscriptions WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load subscribers", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|(user_id, level)| match level.parse::<NotificationLevel>() {
                Ok(level) => Some(Subscriber::new(user_id, level)),
                Err(_) => {
                    warn!(%channel_id, %user_id, level = %level, "Skipping subscription with unknown level");
                    None
                }
            })
            .collect())
    }

    async fn is_subscribed(&self, user_id: UserId, channel_id: ChannelId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND channel_id = $2)",
        )
        .bind(user_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check subscription", e))
    }

    async fn channels_of(&self, user_id: UserId) -> AppResult<Vec<ChannelId>> {
        sqlx::query_scalar::<_, ChannelId>(
            "SELECT channel_id FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list user subscriptions", e)
        })
    }
}
