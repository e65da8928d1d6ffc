//! Fan-out dispatcher. Routes committed channel events to live room members
//! and persists notifications for eligible subscribers who missed them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use staytuned_core::result::AppResult;
use staytuned_core::traits::{NotificationStore, SubscriptionStore};
use staytuned_core::types::{ChannelId, UserId};

use crate::message::types::{NotificationEvent, OutboundMessage, UserTypingEvent};
use crate::metrics::{EngineMetrics, StoreHealth};
use crate::retry::RetryPolicy;
use crate::room::RoomDirectory;
use crate::session::{SendOutcome, Session, SessionRegistry};

use super::eligibility::eligible_users;
use super::event::ChannelEvent;
use super::formatter::NotificationTemplate;
use super::lanes::ChannelLanes;
use super::report::{DeliveryReport, NotificationFailure};

/// Delivers channel events to live sessions and the durable store.
pub struct FanoutDispatcher {
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomDirectory>,
    subscriptions: Arc<dyn SubscriptionStore>,
    notifications: Arc<dyn NotificationStore>,
    lanes: ChannelLanes,
    write_policy: RetryPolicy,
    metrics: Arc<EngineMetrics>,
    health: Arc<StoreHealth>,
}

impl std::fmt::Debug for FanoutDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutDispatcher")
            .field("write_policy", &self.write_policy)
            .finish_non_exhaustive()
    }
}

/// Outcome of one recipient's durable write.
enum Persisted {
    Written { pushed: usize },
    Failed(NotificationFailure),
}

impl FanoutDispatcher {
    /// Create a dispatcher.
    pub fn new(
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomDirectory>,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<dyn NotificationStore>,
        write_policy: RetryPolicy,
        metrics: Arc<EngineMetrics>,
        health: Arc<StoreHealth>,
    ) -> Self {
        Self {
            sessions,
            rooms,
            subscriptions,
            notifications,
            lanes: ChannelLanes::new(),
            write_policy,
            metrics,
            health,
        }
    }

    /// Publish a committed event on a channel.
    ///
    /// Fails only if the subscriber list cannot be read. Durable write
    /// failures are reported in the returned [`DeliveryReport`].
    pub async fn publish(
        &self,
        channel_id: ChannelId,
        event: ChannelEvent,
    ) -> AppResult<DeliveryReport> {
        let kind = event.kind();
        let subscribers = match self.subscriptions.subscribers_of(channel_id).await {
            Ok(subscribers) => {
                self.health.record_success();
                subscribers
            }
            Err(e) => {
                if e.is_store_fault() {
                    self.health.record_failure();
                }
                warn!(%channel_id, ?kind, error = %e, "Cannot resolve subscribers, publish failed");
                return Err(e);
            }
        };
        let eligible = eligible_users(&subscribers, kind);

        let lane = self.lanes.lane(channel_id);
        let (mut report, missed) = {
            let mut guard = ChannelLanes::acquire(&lane);
            let seq = guard.next_seq();
            let mut report = DeliveryReport::new(channel_id, kind, seq);
            report.eligible_users = eligible.len();

            let live = self.live_sessions(channel_id, &eligible);
            let msg = event.to_outbound(channel_id, seq);
            for session in live.values().flatten() {
                match session.send(msg.clone()) {
                    SendOutcome::Queued => report.sessions_delivered += 1,
                    SendOutcome::Dropped | SendOutcome::Closed => report.sessions_dropped += 1,
                }
            }
            report.live_users = live.len();

            let missed: Vec<UserId> = eligible
                .iter()
                .filter(|user_id| !live.contains_key(user_id))
                .copied()
                .collect();
            (report, missed)
        };

        self.metrics.event_published();
        self.metrics
            .record_sends(report.sessions_delivered as u64, report.sessions_dropped as u64);

        if let Some(template) = event.notification_template(channel_id) {
            let seq = report.seq;
            let outcomes = join_all(
                missed
                    .iter()
                    .map(|user_id| self.persist_for(*user_id, &template, seq)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    Persisted::Written { pushed } => {
                        report.notifications_persisted += 1;
                        report.notifications_pushed += pushed;
                    }
                    Persisted::Failed(failure) => report.failures.push(failure),
                }
            }
            self.metrics.record_notifications(
                report.notifications_persisted as u64,
                report.failures.len() as u64,
            );
        }

        if report.is_partial_failure() {
            warn!(
                %channel_id,
                seq = report.seq,
                failed = report.failures.len(),
                persisted = report.notifications_persisted,
                "Fan-out completed with notification failures"
            );
        } else {
            info!(
                %channel_id,
                ?kind,
                seq = report.seq,
                eligible = report.eligible_users,
                live = report.live_users,
                delivered = report.sessions_delivered,
                dropped = report.sessions_dropped,
                persisted = report.notifications_persisted,
                "Event published"
            );
        }
        Ok(report)
    }

    /// Tell every other live session in the room that `origin` is typing.
    /// Returns the number of sessions the indicator was queued for.
    pub fn broadcast_typing(&self, channel_id: ChannelId, origin: &Session) -> usize {
        if !self.rooms.is_member(&channel_id, &origin.id) {
            debug!(session_id = %origin.id, %channel_id, "Typing outside a joined room ignored");
            return 0;
        }

        let msg = OutboundMessage::UserTyping(UserTypingEvent {
            user_id: origin.user_id,
            username: origin.username.clone(),
            channel_id,
        });
        let (mut queued, mut dropped) = (0, 0);
        for session_id in self.rooms.members(&channel_id) {
            if session_id == origin.id {
                continue;
            }
            let Some(session) = self.sessions.lookup(&session_id) else {
                continue;
            };
            match session.send(msg.clone()) {
                SendOutcome::Queued => queued += 1,
                SendOutcome::Dropped | SendOutcome::Closed => dropped += 1,
            }
        }
        self.metrics.record_sends(queued as u64, dropped);
        queued
    }

    /// Last sequence number issued on a channel.
    pub fn last_seq(&self, channel_id: &ChannelId) -> u64 {
        self.lanes.last_seq(channel_id)
    }

    /// Live sessions in the room belonging to eligible users, by user.
    fn live_sessions(
        &self,
        channel_id: ChannelId,
        eligible: &HashSet<UserId>,
    ) -> HashMap<UserId, Vec<Arc<Session>>> {
        let mut live: HashMap<UserId, Vec<Arc<Session>>> = HashMap::new();
        for session_id in self.rooms.members(&channel_id) {
            let Some(session) = self.sessions.lookup(&session_id) else {
                continue;
            };
            if !session.is_alive() || !eligible.contains(&session.user_id) {
                continue;
            }
            live.entry(session.user_id).or_default().push(session);
        }
        live
    }

    async fn persist_for(
        &self,
        user_id: UserId,
        template: &NotificationTemplate,
        seq: u64,
    ) -> Persisted {
        let record = template.for_user(user_id);
        let result = self
            .write_policy
            .run("persist_notification", || {
                self.notifications.persist_notification(&record)
            })
            .await;

        match result {
            Ok(()) => {
                self.health.record_success();
                let msg = OutboundMessage::Notification(NotificationEvent {
                    channel_id: record.channel_id,
                    post_id: record.post_id,
                    kind: record.kind,
                    title: record.title,
                    message: record.message,
                    seq,
                });
                let mut pushed = 0;
                for session in self.sessions.sessions_for_user(&user_id) {
                    if session.send(msg.clone()) == SendOutcome::Queued {
                        pushed += 1;
                    }
                }
                Persisted::Written { pushed }
            }
            Err(exhausted) => {
                if exhausted.error.is_store_fault() {
                    self.health.record_failure();
                }
                warn!(
                    %user_id,
                    channel_id = %template.channel_id,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "Notification not persisted"
                );
                Persisted::Failed(NotificationFailure {
                    user_id,
                    attempts: exhausted.attempts,
                    error: exhausted.error.message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use staytuned_core::error::ErrorKind;
    use staytuned_core::types::{NotificationKind, NotificationLevel, PostId, UserIdentity};

    use super::*;
    use crate::dispatch::event::{ChannelUpdated, PostPublished, ReactionAdded};
    use crate::gateway::{Connection, Handshake};
    use crate::testing::TestHarness;

    async fn connect(h: &TestHarness, identity: &UserIdentity) -> Connection {
        let header = format!("Bearer {}", h.tokens.issue_for(identity));
        h.engine
            .gateway
            .accept(Handshake {
                authorization: Some(&header),
                token: None,
            })
            .await
            .expect("accept")
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if !matches!(msg, OutboundMessage::UserPresence(_)) {
                out.push(msg);
            }
        }
        out
    }

    fn post(content: &str) -> ChannelEvent {
        let post_id = PostId::new();
        ChannelEvent::Post(PostPublished {
            post_id,
            channel_name: "Rust News".to_string(),
            content: content.to_string(),
            post: json!({ "id": post_id, "content": content }),
        })
    }

    fn reaction() -> ChannelEvent {
        ChannelEvent::Reaction(ReactionAdded {
            post_id: PostId::new(),
            channel_name: "Rust News".to_string(),
            reaction_type: "heart".to_string(),
            reaction: json!({ "type": "heart" }),
        })
    }

    fn user(h: &TestHarness, name: &str) -> UserIdentity {
        h.tokens.issue(name).1
    }

    #[tokio::test]
    async fn routes_by_level_and_liveness() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let alice = user(&h, "alice");
        let bob = user(&h, "bob");
        let carol = user(&h, "carol");
        h.store.subscribe(alice.user_id, channel, NotificationLevel::All);
        h.store.subscribe(bob.user_id, channel, NotificationLevel::None);
        h.store.subscribe(carol.user_id, channel, NotificationLevel::Important);

        let mut alice_phone = connect(&h, &alice).await;
        let mut alice_laptop = connect(&h, &alice).await;
        let mut bob_conn = connect(&h, &bob).await;

        let report = h.engine.publish(channel, reaction()).await.expect("publish");
        assert_eq!(report.eligible_users, 1);
        assert_eq!(report.live_users, 1);
        assert_eq!(report.sessions_delivered, 2);
        assert_eq!(report.notifications_persisted, 0);
        for rx in [&mut alice_phone.outbound, &mut alice_laptop.outbound] {
            let got = drain(rx);
            assert!(matches!(got.as_slice(), [OutboundMessage::NewReaction(e)] if e.seq == 1));
        }
        assert!(drain(&mut bob_conn.outbound).is_empty());
        assert!(h.store.notifications().is_empty());

        let report = h.engine.publish(channel, post("hello")).await.expect("publish");
        assert_eq!(report.seq, 2);
        assert_eq!(report.eligible_users, 2);
        assert_eq!(report.live_users, 1);
        assert_eq!(report.sessions_delivered, 2);
        assert_eq!(report.notifications_persisted, 1);
        assert!(!report.is_partial_failure());
        assert!(drain(&mut bob_conn.outbound).is_empty());

        let stored = h.store.notifications_for(carol.user_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, NotificationKind::NewPost);
        assert_eq!(stored[0].title, "New post in Rust News");
        assert_eq!(stored[0].message, "hello");
        assert!(h.store.notifications_for(alice.user_id).is_empty());
        assert!(h.store.notifications_for(bob.user_id).is_empty());
    }

    #[tokio::test]
    async fn user_outside_the_room_gets_record_and_push() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let dave = user(&h, "dave");
        h.store.subscribe(dave.user_id, channel, NotificationLevel::All);
        let mut conn = connect(&h, &dave).await;
        h.engine.rooms.leave(channel, conn.session.id);

        let report = h.engine.publish(channel, reaction()).await.expect("publish");
        assert_eq!(report.live_users, 0);
        assert_eq!(report.notifications_persisted, 1);
        assert_eq!(report.notifications_pushed, 1);

        let got = drain(&mut conn.outbound);
        match got.as_slice() {
            [OutboundMessage::Notification(n)] => {
                assert_eq!(n.kind, NotificationKind::NewReaction);
                assert_eq!(n.message, "heart");
                assert_eq!(n.seq, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_once_then_reports_partial_failure() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let flaky = user(&h, "flaky");
        let broken = user(&h, "broken");
        h.store.subscribe(flaky.user_id, channel, NotificationLevel::All);
        h.store.subscribe(broken.user_id, channel, NotificationLevel::All);
        h.store.fail_notifications_for(flaky.user_id, 1);
        h.store.fail_notifications_for(broken.user_id, 2);

        let report = h.engine.publish(channel, post("hi")).await.expect("publish");
        assert_eq!(report.notifications_persisted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, broken.user_id);
        assert_eq!(report.failures[0].attempts, 2);
        assert_eq!(h.store.notifications_for(flaky.user_id).len(), 1);
        assert!(h.store.notifications_for(broken.user_id).is_empty());

        let err = report.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeliveryPartialFailure);
    }

    #[tokio::test]
    async fn subscriber_lookup_failure_fails_publish() {
        let h = TestHarness::default();
        h.store.set_subscriptions_down(true);

        let err = h
            .engine
            .publish(ChannelId::new(), post("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Database);
        assert_eq!(h.engine.store_health.snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn channel_updates_are_live_only() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let live = user(&h, "live");
        let away = user(&h, "away");
        h.store.subscribe(live.user_id, channel, NotificationLevel::All);
        h.store.subscribe(away.user_id, channel, NotificationLevel::All);
        let mut conn = connect(&h, &live).await;

        let event = ChannelEvent::ChannelUpdate(ChannelUpdated {
            channel: json!({ "name": "Renamed" }),
        });
        let report = h.engine.publish(channel, event).await.expect("publish");
        assert_eq!(report.sessions_delivered, 1);
        assert_eq!(report.notifications_persisted, 0);
        assert!(h.store.notifications().is_empty());
        assert!(matches!(
            drain(&mut conn.outbound).as_slice(),
            [OutboundMessage::ChannelUpdate(_)]
        ));
    }

    #[tokio::test]
    async fn reaped_session_is_not_targeted() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let alice = user(&h, "alice");
        h.store.subscribe(alice.user_id, channel, NotificationLevel::All);
        let mut conn = connect(&h, &alice).await;

        let cutoff = chrono::Utc::now() + chrono::Duration::seconds(1);
        h.engine.gateway.reap_idle_before(cutoff).await;

        let report = h.engine.publish(channel, post("missed")).await.expect("publish");
        assert_eq!(report.live_users, 0);
        assert_eq!(report.sessions_delivered, 0);
        assert_eq!(report.notifications_persisted, 1);
        assert!(drain(&mut conn.outbound).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_arrive_in_sequence_order() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let alice = user(&h, "alice");
        h.store.subscribe(alice.user_id, channel, NotificationLevel::All);
        let mut conn = connect(&h, &alice).await;

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let engine = h.engine.clone();
                tokio::spawn(async move { engine.publish(channel, post(&format!("#{i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("publish");
        }

        let seqs: Vec<u64> = drain(&mut conn.outbound)
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::NewPost(p) => Some(p.seq),
                _ => None,
            })
            .collect();
        assert_eq!(seqs, (1..=32).collect::<Vec<_>>());
        assert_eq!(h.engine.dispatcher.last_seq(&channel), 32);
    }

    #[tokio::test]
    async fn typing_requires_membership() {
        let h = TestHarness::default();
        let channel = ChannelId::new();
        let alice = user(&h, "alice");
        let bob = user(&h, "bob");
        h.store.subscribe(bob.user_id, channel, NotificationLevel::All);
        let outsider = connect(&h, &alice).await;
        let mut member = connect(&h, &bob).await;

        assert_eq!(h.engine.dispatcher.broadcast_typing(channel, &outsider.session), 0);
        assert!(drain(&mut member.outbound).is_empty());
    }
}
