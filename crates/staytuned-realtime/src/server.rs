//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use staytuned_core::config::RealtimeConfig;
use staytuned_core::result::AppResult;
use staytuned_core::traits::{NotificationStore, PresenceStore, SubscriptionStore, TokenVerifier};
use staytuned_core::types::{ChannelId, UserId};

use crate::dispatch::{ChannelEvent, DeliveryReport, FanoutDispatcher};
use crate::gateway::{Gateway, run_idle_sweeper};
use crate::metrics::health::StoreHealthSnapshot;
use crate::metrics::{EngineMetrics, MetricsSnapshot, StoreHealth};
use crate::presence::PresenceAggregator;
use crate::retry::RetryPolicy;
use crate::room::RoomDirectory;
use crate::session::SessionRegistry;
use crate::subscription::CachedSubscriptionStore;

/// External capabilities the engine is built on.
#[derive(Debug, Clone)]
pub struct EngineDeps {
    /// Handshake token verification.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Subscription lookups. Wrapped in a cache by the engine.
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Durable notification writes.
    pub notifications: Arc<dyn NotificationStore>,
    /// Durable presence writes.
    pub presence: Arc<dyn PresenceStore>,
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Live sessions.
    pub sessions: usize,
    /// Users with at least one live session.
    pub users: usize,
    /// Non-empty rooms.
    pub rooms: usize,
    /// Rooms created since start.
    pub rooms_created: u64,
    /// Users with a presence record.
    pub online_users: usize,
    /// Counters.
    pub metrics: MetricsSnapshot,
    /// Durable store availability.
    pub store: StoreHealthSnapshot,
}

/// Central real-time engine that coordinates all subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Live sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Channel rooms.
    pub rooms: Arc<RoomDirectory>,
    /// Per-user presence.
    pub presence: Arc<PresenceAggregator>,
    /// Channel event fan-out.
    pub dispatcher: Arc<FanoutDispatcher>,
    /// Session lifecycle and inbound commands.
    pub gateway: Arc<Gateway>,
    /// Cached subscription lookups.
    pub subscriptions: Arc<CachedSubscriptionStore>,
    /// Counters.
    pub metrics: Arc<EngineMetrics>,
    /// Durable store availability.
    pub store_health: Arc<StoreHealth>,
    config: RealtimeConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("sessions", &self.sessions.session_count())
            .field("rooms", &self.rooms.room_count())
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl RealtimeEngine {
    /// Wire every subsystem over the given capabilities.
    pub fn new(config: RealtimeConfig, deps: EngineDeps) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let store_health = Arc::new(StoreHealth::new(
            config.notifications.degraded_after_failures,
        ));
        let write_policy = RetryPolicy::from_config(&config.notifications);

        let sessions = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomDirectory::new());
        let subscriptions = Arc::new(CachedSubscriptionStore::new(
            deps.subscriptions,
            &config.subscription_cache,
        ));
        let presence = Arc::new(PresenceAggregator::new(
            &config.presence,
            sessions.clone(),
            deps.presence,
            write_policy.single_attempt(),
            store_health.clone(),
            metrics.clone(),
        ));
        let dispatcher = Arc::new(FanoutDispatcher::new(
            sessions.clone(),
            rooms.clone(),
            subscriptions.clone(),
            deps.notifications,
            write_policy,
            metrics.clone(),
            store_health.clone(),
        ));
        let gateway = Arc::new(Gateway::new(
            config.clone(),
            deps.verifier,
            sessions.clone(),
            rooms.clone(),
            presence.clone(),
            dispatcher.clone(),
            subscriptions.clone(),
            store_health.clone(),
            metrics.clone(),
        ));

        info!(
            queue_size = config.outbound_queue_size,
            idle_timeout_seconds = config.idle_timeout_seconds,
            max_attempts = write_policy.max_attempts,
            "Real-time engine initialized"
        );

        Self {
            sessions,
            rooms,
            presence,
            dispatcher,
            gateway,
            subscriptions,
            metrics,
            store_health,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Publish a committed channel event.
    pub async fn publish(
        &self,
        channel_id: ChannelId,
        event: ChannelEvent,
    ) -> AppResult<DeliveryReport> {
        self.dispatcher.publish(channel_id, event).await
    }

    /// Drop cached subscription data after the CRUD layer changed it.
    pub async fn subscriptions_changed(&self, user_id: Option<UserId>, channel_id: Option<ChannelId>) {
        match (user_id, channel_id) {
            (None, None) => self.subscriptions.invalidate_all(),
            (user_id, channel_id) => {
                if let Some(user_id) = user_id {
                    self.subscriptions.invalidate_user(user_id).await;
                }
                if let Some(channel_id) = channel_id {
                    self.subscriptions.invalidate_channel(channel_id).await;
                }
            }
        }
    }

    /// Start background tasks.
    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(run_idle_sweeper(
            self.gateway.clone(),
            self.config.sweep_interval(),
            self.shutdown.clone(),
        ))
    }

    /// Token cancelled when the engine shuts down. Connection tasks select
    /// on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop background tasks and disconnect every session.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.shutdown.cancel();
        let closed = self.gateway.close_all().await;
        info!(closed, "Real-time engine shut down");
    }

    /// Current statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            sessions: self.sessions.session_count(),
            users: self.sessions.user_count(),
            rooms: self.rooms.room_count(),
            rooms_created: self.rooms.rooms_created(),
            online_users: self.presence.online_count(),
            metrics: self.metrics.snapshot(),
            store: self.store_health.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn shutdown_cancels_and_closes_sessions() {
        let h = TestHarness::default();
        let (token, _) = h.tokens.issue("alice");
        let conn = h
            .engine
            .gateway
            .accept(crate::gateway::Handshake {
                authorization: None,
                token: Some(&token),
            })
            .await
            .expect("accept");

        let sweeper = h.engine.start();
        h.engine.shutdown().await;

        assert!(h.engine.shutdown_token().is_cancelled());
        assert!(!conn.session.is_alive());
        assert_eq!(h.engine.stats().sessions, 0);
        sweeper.await.expect("sweeper exits");
    }
}
