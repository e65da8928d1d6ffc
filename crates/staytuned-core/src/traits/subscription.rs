//! Read-only access to durable channel subscriptions.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ChannelId, Subscriber, UserId};

/// Query surface over the authoritative subscription list.
#[async_trait]
pub trait SubscriptionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Every durable subscriber of `channel_id` with their notification level.
    async fn subscribers_of(&self, channel_id: ChannelId) -> AppResult<Vec<Subscriber>>;

    /// Whether `user_id` is currently subscribed to `channel_id`.
    async fn is_subscribed(&self, user_id: UserId, channel_id: ChannelId) -> AppResult<bool>;

    /// Every channel `user_id` is subscribed to.
    async fn channels_of(&self, user_id: UserId) -> AppResult<Vec<ChannelId>>;
}
