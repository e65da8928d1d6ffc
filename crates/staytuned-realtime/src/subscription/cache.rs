//! Read-through cache in front of a [`SubscriptionStore`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, warn};

use staytuned_core::config::SubscriptionCacheConfig;
use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::traits::SubscriptionStore;
use staytuned_core::types::{ChannelId, Subscriber, UserId};

/// Caches subscriber lists, membership checks and per-user channel lists.
///
/// Concurrent misses for the same key share one store query. Errors are
/// never cached.
#[derive(Clone)]
pub struct CachedSubscriptionStore {
    inner: Arc<dyn SubscriptionStore>,
    subscribers: Cache<ChannelId, Arc<Vec<Subscriber>>>,
    memberships: Cache<(UserId, ChannelId), bool>,
    channels: Cache<UserId, Arc<Vec<ChannelId>>>,
}

impl std::fmt::Debug for CachedSubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSubscriptionStore")
            .field("subscribers", &self.subscribers.entry_count())
            .field("memberships", &self.memberships.entry_count())
            .field("channels", &self.channels.entry_count())
            .finish()
    }
}

fn unshare(err: Arc<AppError>) -> AppError {
    (*err).clone()
}

impl CachedSubscriptionStore {
    /// Wrap `inner` with caches sized by `config`.
    pub fn new(inner: Arc<dyn SubscriptionStore>, config: &SubscriptionCacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        Self {
            inner,
            subscribers: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(ttl)
                .build(),
            memberships: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            channels: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Forget everything cached about a channel's subscribers.
    pub async fn invalidate_channel(&self, channel_id: ChannelId) {
        self.subscribers.invalidate(&channel_id).await;
        if let Err(e) = self
            .memberships
            .invalidate_entries_if(move |(_, channel), _| *channel == channel_id)
        {
            warn!(%channel_id, error = %e, "Membership invalidation rejected, clearing all");
            self.memberships.invalidate_all();
        }
        debug!(%channel_id, "Subscription cache invalidated for channel");
    }

    /// Forget everything cached about a user's subscriptions.
    pub async fn invalidate_user(&self, user_id: UserId) {
        self.channels.invalidate(&user_id).await;
        if let Err(e) = self
            .memberships
            .invalidate_entries_if(move |(user, _), _| *user == user_id)
        {
            warn!(%user_id, error = %e, "Membership invalidation rejected, clearing all");
            self.memberships.invalidate_all();
        }
        debug!(%user_id, "Subscription cache invalidated for user");
    }

    /// Forget everything.
    pub fn invalidate_all(&self) {
        self.subscribers.invalidate_all();
        self.memberships.invalidate_all();
        self.channels.invalidate_all();
    }
}

#[async_trait]
impl SubscriptionStore for CachedSubscriptionStore {
    async fn subscribers_of(&self, channel_id: ChannelId) -> AppResult<Vec<Subscriber>> {
        let subscribers = self
            .subscribers
            .try_get_with(channel_id, async {
                self.inner.subscribers_of(channel_id).await.map(Arc::new)
            })
            .await
            .map_err(unshare)?;
        Ok(subscribers.as_ref().clone())
    }

    async fn is_subscribed(&self, user_id: UserId, channel_id: ChannelId) -> AppResult<bool> {
        self.memberships
            .try_get_with((user_id, channel_id), async {
                self.inner.is_subscribed(user_id, channel_id).await
            })
            .await
            .map_err(unshare)
    }

    async fn channels_of(&self, user_id: UserId) -> AppResult<Vec<ChannelId>> {
        let channels = self
            .channels
            .try_get_with(user_id, async {
                self.inner.channels_of(user_id).await.map(Arc::new)
            })
            .await
            .map_err(unshare)?;
        Ok(channels.as_ref().clone())
    }
}
