//! Connection lifecycle: accept, disconnect, idle eviction and shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use staytuned_core::config::RealtimeConfig;
use staytuned_core::error::{AppError, ErrorKind};
use staytuned_core::result::AppResult;
use staytuned_core::traits::{SubscriptionStore, TokenVerifier};
use staytuned_core::types::{SessionId, UserIdentity};

use crate::dispatch::FanoutDispatcher;
use crate::message::types::OutboundMessage;
use crate::metrics::{EngineMetrics, StoreHealth};
use crate::presence::PresenceAggregator;
use crate::room::RoomDirectory;
use crate::session::{Session, SessionRegistry};

use super::authenticator::Handshake;

/// An accepted connection, handed to the socket task.
#[derive(Debug)]
pub struct Connection {
    /// The registered session.
    pub session: Arc<Session>,
    /// Receiving half of the session's outbound queue.
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

/// Owns the session lifecycle and routes inbound commands.
pub struct Gateway {
    pub(super) verifier: Arc<dyn TokenVerifier>,
    pub(super) sessions: Arc<SessionRegistry>,
    pub(super) rooms: Arc<RoomDirectory>,
    pub(super) presence: Arc<PresenceAggregator>,
    pub(super) dispatcher: Arc<FanoutDispatcher>,
    pub(super) subscriptions: Arc<dyn SubscriptionStore>,
    pub(super) health: Arc<StoreHealth>,
    pub(super) metrics: Arc<EngineMetrics>,
    pub(super) config: RealtimeConfig,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("sessions", &self.sessions.session_count())
            .field("rooms", &self.rooms.room_count())
            .finish()
    }
}

impl Gateway {
    /// Create a gateway over shared engine state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RealtimeConfig,
        verifier: Arc<dyn TokenVerifier>,
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomDirectory>,
        presence: Arc<PresenceAggregator>,
        dispatcher: Arc<FanoutDispatcher>,
        subscriptions: Arc<dyn SubscriptionStore>,
        health: Arc<StoreHealth>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            verifier,
            sessions,
            rooms,
            presence,
            dispatcher,
            subscriptions,
            health,
            metrics,
            config,
        }
    }

    /// Authenticate a handshake and bring the session online: register it,
    /// join the rooms of every subscribed channel, then update presence.
    ///
    /// If the user's channels cannot be loaded the connection is still
    /// accepted with no rooms joined. All awaits that can stall happen before
    /// the session is registered, so dropping this future never leaves a
    /// session without its presence count.
    pub async fn accept(&self, handshake: Handshake<'_>) -> AppResult<Connection> {
        let identity = match self.authenticate(handshake).await {
            Ok(identity) => identity,
            Err(e) => {
                self.metrics.auth_failed();
                warn!(error = %e, "WebSocket handshake rejected");
                return Err(e);
            }
        };

        let channels = match self.subscriptions.channels_of(identity.user_id).await {
            Ok(channels) => {
                self.health.record_success();
                channels
            }
            Err(e) => {
                if e.is_store_fault() {
                    self.health.record_failure();
                }
                warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Could not load subscribed channels, connecting without rooms"
                );
                Vec::new()
            }
        };

        let (session, outbound) = Session::new(identity, self.config.outbound_queue_size);
        let session = Arc::new(session);
        self.sessions.register(session.clone())?;
        self.metrics.session_opened();

        let joined = channels
            .into_iter()
            .filter(|channel_id| self.rooms.join(*channel_id, session.id))
            .count();

        self.presence.on_session_added(session.user_id).await;

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            username = %session.username,
            rooms = joined,
            "Session connected"
        );

        Ok(Connection { session, outbound })
    }

    /// Tear a session down. Safe to call more than once and from any path;
    /// only the call that removes the session updates presence.
    pub async fn disconnect(&self, session_id: SessionId) -> bool {
        if let Some(session) = self.sessions.lookup(&session_id) {
            session.close();
        }
        let rooms = self.rooms.leave_all(session_id);

        let Some(session) = self.sessions.remove(&session_id) else {
            debug!(%session_id, "Session already disconnected");
            return false;
        };
        self.metrics.session_closed();
        self.presence.on_session_removed(session.user_id).await;

        info!(
            %session_id,
            user_id = %session.user_id,
            rooms_left = rooms.len(),
            "Session disconnected"
        );
        true
    }

    /// Disconnect sessions idle for longer than `idle_timeout`.
    pub async fn reap_idle(&self, idle_timeout: Duration) -> Vec<SessionId> {
        let idle = chrono::Duration::from_std(idle_timeout).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(idle).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.reap_idle_before(cutoff).await
    }

    /// Disconnect sessions whose last activity is before `cutoff`, along
    /// with sessions already marked dead.
    pub async fn reap_idle_before(&self, cutoff: DateTime<Utc>) -> Vec<SessionId> {
        let mut reaped = Vec::new();
        for session in self.sessions.all_sessions() {
            let last_activity = session.last_activity().await;
            if session.is_alive() && last_activity >= cutoff {
                continue;
            }
            debug!(
                session_id = %session.id,
                user_id = %session.user_id,
                %last_activity,
                "Evicting idle session"
            );
            if self.disconnect(session.id).await {
                self.metrics.session_reaped();
                reaped.push(session.id);
            }
        }
        reaped
    }

    /// One sweeper pass.
    pub async fn sweep(&self) -> Vec<SessionId> {
        let reaped = self.reap_idle(self.config.idle_timeout()).await;
        self.presence.prune_recent();
        reaped
    }

    /// Disconnect every session. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let mut closed = 0;
        for session in self.sessions.all_sessions() {
            if self.disconnect(session.id).await {
                closed += 1;
            }
        }
        info!(closed, "All sessions closed");
        closed
    }

    async fn authenticate(&self, handshake: Handshake<'_>) -> AppResult<UserIdentity> {
        let token = handshake.credential()?;
        self.verifier.verify(token).await.map_err(|e| match e.kind {
            ErrorKind::Authentication => e,
            _ => AppError::with_source(
                ErrorKind::Authentication,
                "Token could not be verified",
                e,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use staytuned_core::types::{ChannelId, NotificationLevel, PresenceStatus, UserId};

    use super::*;
    use crate::testing::TestHarness;

    fn presence_of(
        rx: &mut mpsc::Receiver<OutboundMessage>,
        user_id: UserId,
    ) -> Vec<PresenceStatus> {
        let mut statuses = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let OutboundMessage::UserPresence(e) = msg {
                if e.user_id == user_id {
                    statuses.push(e.status);
                }
            }
        }
        statuses
    }

    async fn connect(h: &TestHarness, token: &str) -> Connection {
        h.engine
            .gateway
            .accept(Handshake {
                authorization: None,
                token: Some(token),
            })
            .await
            .expect("accept")
    }

    #[tokio::test]
    async fn rejects_missing_and_unknown_tokens() {
        let h = TestHarness::default();
        let gateway = &h.engine.gateway;

        let missing = gateway.accept(Handshake::default()).await.unwrap_err();
        assert_eq!(missing.kind, ErrorKind::Authentication);

        let unknown = gateway
            .accept(Handshake {
                authorization: Some("Bearer forged"),
                token: None,
            })
            .await
            .unwrap_err();
        assert_eq!(unknown.kind, ErrorKind::Authentication);

        assert_eq!(h.engine.metrics.auth_failures.load(Ordering::Relaxed), 2);
        assert_eq!(h.engine.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn accept_joins_subscribed_rooms_and_announces_presence() {
        let h = TestHarness::default();
        let (watcher_token, _) = h.tokens.issue("watcher");
        let mut watcher = connect(&h, &watcher_token).await;

        let (token, alice) = h.tokens.issue("alice");
        let channel = ChannelId::new();
        h.store.subscribe(alice.user_id, channel, NotificationLevel::All);

        let conn = connect(&h, &token).await;
        assert!(h.engine.rooms.is_member(&channel, &conn.session.id));
        assert_eq!(conn.session.username, "alice");
        assert_eq!(
            presence_of(&mut watcher.outbound, alice.user_id),
            vec![PresenceStatus::Online]
        );
    }

    #[tokio::test]
    async fn accept_survives_subscription_outage() {
        let h = TestHarness::default();
        let (token, _) = h.tokens.issue("alice");
        h.store.set_subscriptions_down(true);

        let conn = connect(&h, &token).await;
        assert!(h.engine.rooms.rooms_of(&conn.session.id).is_empty());
        assert_eq!(h.engine.store_health.snapshot().consecutive_failures, 1);
        assert_eq!(h.engine.sessions.session_count(), 1);
    }

    #[tokio::test]
    async fn dropped_accept_does_not_steal_presence() {
        let h = TestHarness::default();
        let (phone_token, alice) = h.tokens.issue("alice");
        let laptop_token = h.tokens.issue_for(&alice);
        let phone = connect(&h, &phone_token).await;

        h.engine.subscriptions.invalidate_user(alice.user_id).await;
        h.store.set_subscription_delay(Some(Duration::from_secs(10)));
        let laptop = tokio::time::timeout(
            Duration::from_millis(50),
            h.engine.gateway.accept(Handshake {
                authorization: None,
                token: Some(&laptop_token),
            }),
        )
        .await;
        assert!(laptop.is_err());

        assert_eq!(h.engine.sessions.sessions_for_user(&alice.user_id).len(), 1);
        assert_eq!(
            h.engine.presence.record(&alice.user_id).map(|r| r.session_count),
            Some(1)
        );

        h.store.set_subscription_delay(None);
        assert_eq!(h.engine.gateway.sweep().await, Vec::<SessionId>::new());
        assert!(phone.session.is_alive());
        assert_eq!(h.engine.presence.current_status(&alice.user_id), PresenceStatus::Online);
    }

    #[tokio::test]
    async fn duplicate_disconnect_is_a_no_op() {
        let h = TestHarness::default();
        let (watcher_token, _) = h.tokens.issue("watcher");
        let mut watcher = connect(&h, &watcher_token).await;

        let (token, alice) = h.tokens.issue("alice");
        let channel = ChannelId::new();
        h.store.subscribe(alice.user_id, channel, NotificationLevel::All);
        let conn = connect(&h, &token).await;

        assert!(h.engine.gateway.disconnect(conn.session.id).await);
        assert!(!h.engine.gateway.disconnect(conn.session.id).await);

        assert!(!conn.session.is_alive());
        assert_eq!(h.engine.rooms.member_count(&channel), 0);
        assert_eq!(
            presence_of(&mut watcher.outbound, alice.user_id),
            vec![PresenceStatus::Online, PresenceStatus::Offline]
        );
        assert_eq!(
            h.store.presence_writes(alice.user_id),
            vec![PresenceStatus::Online, PresenceStatus::Offline]
        );
    }

    #[tokio::test]
    async fn second_device_keeps_user_online() {
        let h = TestHarness::default();
        let (token, alice) = h.tokens.issue("alice");
        let phone = connect(&h, &token).await;
        let laptop = connect(&h, &h.tokens.issue_for(&alice)).await;

        h.engine.gateway.disconnect(phone.session.id).await;
        assert_eq!(h.engine.presence.current_status(&alice.user_id), PresenceStatus::Online);

        h.engine.gateway.disconnect(laptop.session.id).await;
        assert_eq!(h.engine.presence.current_status(&alice.user_id), PresenceStatus::Offline);
    }

    #[tokio::test]
    async fn reaps_only_stale_sessions() {
        let h = TestHarness::default();
        let (token, _) = h.tokens.issue("alice");
        let conn = connect(&h, &token).await;

        let none = h.engine.gateway.reap_idle(Duration::from_secs(3600)).await;
        assert!(none.is_empty());

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let reaped = h.engine.gateway.reap_idle_before(cutoff).await;
        assert_eq!(reaped, vec![conn.session.id]);
        assert!(h.engine.sessions.lookup(&conn.session.id).is_none());
        assert_eq!(h.engine.metrics.sessions_reaped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn close_all_disconnects_everyone() {
        let h = TestHarness::default();
        let mut conns = Vec::new();
        for name in ["a", "b", "c"] {
            let (token, _) = h.tokens.issue(name);
            conns.push(connect(&h, &token).await);
        }

        assert_eq!(h.engine.gateway.close_all().await, 3);
        assert_eq!(h.engine.sessions.session_count(), 0);
        assert_eq!(h.engine.presence.online_count(), 0);
        assert!(conns.iter().all(|c| !c.session.is_alive()));
    }
}
