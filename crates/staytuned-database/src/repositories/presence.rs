//! Presence mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use staytuned_core::error::{AppError, ErrorKind};
use staytuned_core::result::AppResult;
use staytuned_core::traits::PresenceStore;
use staytuned_core::types::{PresenceStatus, UserId};

/// Writes `status` and `last_seen` on the `users` table.
#[derive(Debug, Clone)]
pub struct PresenceRepository {
    pool: PgPool,
}

impl PresenceRepository {
    /// Create a new presence repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceStore for PresenceRepository {
    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> AppResult<()> {
        // A write older than the stored last_seen is stale and skipped.
        sqlx::query(
            "UPDATE users SET status = $1, last_seen = $2 \
             WHERE id = $3 AND (last_seen IS NULL OR last_seen <= $2)",
        )
        .bind(status.as_str())
        .bind(last_seen)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update presence", e))?;
        Ok(())
    }
}
