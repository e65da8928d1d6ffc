//! Durable presence mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::{PresenceStatus, UserId};

/// Mirrors presence transitions so read APIs can report a best-effort
/// status for users the real-time process has not seen recently.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug + 'static {
    /// Store the user's latest status and last-seen time.
    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> AppResult<()>;
}
