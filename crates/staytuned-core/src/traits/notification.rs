//! Durable notification persistence capability.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::NewNotification;

/// Writes missed-delivery notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist one notification record.
    async fn persist_notification(&self, notification: &NewNotification) -> AppResult<()>;
}
