//! In-memory capability fakes with failure injection, for unit and
//! downstream crate tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use staytuned_core::config::RealtimeConfig;
use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::traits::{NotificationStore, PresenceStore, SubscriptionStore, TokenVerifier};
use staytuned_core::types::{
    ChannelId, NewNotification, NotificationLevel, PresenceStatus, Subscriber, UserId,
    UserIdentity,
};

use crate::server::{EngineDeps, RealtimeEngine};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscription, notification and presence store backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscriptions: Mutex<HashMap<ChannelId, Vec<Subscriber>>>,
    notifications: Mutex<Vec<NewNotification>>,
    presence: Mutex<Vec<(UserId, PresenceStatus, DateTime<Utc>)>>,
    /// User → number of upcoming notification writes that fail.
    failing_writes: Mutex<HashMap<UserId, u32>>,
    notifications_down: AtomicBool,
    subscriptions_down: AtomicBool,
    subscription_delay: Mutex<Option<Duration>>,
    subscription_queries: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe `user_id` to `channel_id`, replacing any previous level.
    pub fn subscribe(&self, user_id: UserId, channel_id: ChannelId, level: NotificationLevel) {
        let mut subscriptions = lock(&self.subscriptions);
        let subscribers = subscriptions.entry(channel_id).or_default();
        subscribers.retain(|s| s.user_id != user_id);
        subscribers.push(Subscriber::new(user_id, level));
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, user_id: UserId, channel_id: ChannelId) {
        if let Some(subscribers) = lock(&self.subscriptions).get_mut(&channel_id) {
            subscribers.retain(|s| s.user_id != user_id);
        }
    }

    /// Make the next `times` notification writes for `user_id` fail.
    pub fn fail_notifications_for(&self, user_id: UserId, times: u32) {
        lock(&self.failing_writes).insert(user_id, times);
    }

    /// Make every notification write fail until reset.
    pub fn set_notifications_down(&self, down: bool) {
        self.notifications_down.store(down, Ordering::SeqCst);
    }

    /// Make every subscription query fail until reset.
    pub fn set_subscriptions_down(&self, down: bool) {
        self.subscriptions_down.store(down, Ordering::SeqCst);
    }

    /// Delay every subscription query by `delay`, or stop delaying.
    pub fn set_subscription_delay(&self, delay: Option<Duration>) {
        *lock(&self.subscription_delay) = delay;
    }

    /// Every notification written so far.
    pub fn notifications(&self) -> Vec<NewNotification> {
        lock(&self.notifications).clone()
    }

    /// Notifications written for one user.
    pub fn notifications_for(&self, user_id: UserId) -> Vec<NewNotification> {
        lock(&self.notifications)
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Presence writes for one user, oldest first.
    pub fn presence_writes(&self, user_id: UserId) -> Vec<PresenceStatus> {
        lock(&self.presence)
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .map(|(_, status, _)| *status)
            .collect()
    }

    /// Number of queries that reached this store.
    pub fn subscription_queries(&self) -> u64 {
        self.subscription_queries.load(Ordering::SeqCst)
    }

    async fn query(&self) -> AppResult<()> {
        self.subscription_queries.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.subscription_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.subscriptions_down.load(Ordering::SeqCst) {
            return Err(AppError::database("subscription store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn subscribers_of(&self, channel_id: ChannelId) -> AppResult<Vec<Subscriber>> {
        self.query().await?;
        Ok(lock(&self.subscriptions)
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_subscribed(&self, user_id: UserId, channel_id: ChannelId) -> AppResult<bool> {
        self.query().await?;
        Ok(lock(&self.subscriptions)
            .get(&channel_id)
            .is_some_and(|subs| subs.iter().any(|s| s.user_id == user_id)))
    }

    async fn channels_of(&self, user_id: UserId) -> AppResult<Vec<ChannelId>> {
        self.query().await?;
        Ok(lock(&self.subscriptions)
            .iter()
            .filter(|(_, subs)| subs.iter().any(|s| s.user_id == user_id))
            .map(|(channel_id, _)| *channel_id)
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn persist_notification(&self, notification: &NewNotification) -> AppResult<()> {
        if self.notifications_down.load(Ordering::SeqCst) {
            return Err(AppError::database("notification store unavailable"));
        }
        {
            let mut failing = lock(&self.failing_writes);
            if let Some(remaining) = failing.get_mut(&notification.user_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::database("injected write failure"));
                }
            }
        }
        lock(&self.notifications).push(notification.clone());
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> AppResult<()> {
        lock(&self.presence).push((user_id, status, last_seen));
        Ok(())
    }
}

/// Token verifier that accepts tokens it has issued.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: Mutex<HashMap<String, UserIdentity>>,
}

impl StaticTokenVerifier {
    /// Create a verifier that knows no tokens.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Issue a token for a new user.
    pub fn issue(&self, username: &str) -> (String, UserIdentity) {
        let identity = UserIdentity {
            user_id: UserId::new(),
            username: username.to_string(),
        };
        (self.issue_for(&identity), identity)
    }

    /// Issue another token for an existing identity (another device).
    pub fn issue_for(&self, identity: &UserIdentity) -> String {
        let token = format!("token-{}", uuid::Uuid::new_v4());
        lock(&self.tokens).insert(token.clone(), identity.clone());
        token
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<UserIdentity> {
        lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::authentication("Invalid token"))
    }
}

/// An engine wired to in-memory fakes.
#[derive(Debug, Clone)]
pub struct TestHarness {
    /// The engine under test.
    pub engine: RealtimeEngine,
    /// Backing store for every durable capability.
    pub store: Arc<MemoryStore>,
    /// Token issuer/verifier.
    pub tokens: Arc<StaticTokenVerifier>,
}

impl TestHarness {
    /// Build an engine with `config` and fast durable retries.
    pub fn new(mut config: RealtimeConfig) -> Self {
        config.notifications.retry_backoff_ms = 0;
        config.notifications.write_timeout_ms = 500;

        let store = MemoryStore::new();
        let tokens = StaticTokenVerifier::new();
        let engine = RealtimeEngine::new(
            config,
            EngineDeps {
                verifier: tokens.clone(),
                subscriptions: store.clone(),
                notifications: store.clone(),
                presence: store.clone(),
            },
        );
        Self {
            engine,
            store,
            tokens,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new(RealtimeConfig::default())
    }
}
