//! Presence aggregator. One record per connected user, derived from the
//! count of their live sessions and their declared status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{debug, info, warn};

use staytuned_core::config::PresenceRealtimeConfig;
use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::traits::PresenceStore;
use staytuned_core::types::{PresenceStatus, UserId};

use crate::message::types::{OutboundMessage, UserPresenceEvent};
use crate::metrics::{EngineMetrics, StoreHealth};
use crate::retry::RetryPolicy;
use crate::session::{SendOutcome, SessionRegistry};

/// Live presence of a user with at least one session.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceRecord {
    /// User ID
    pub user_id: UserId,
    /// Declared status shared by all of the user's sessions
    pub status: PresenceStatus,
    /// Live session count, always at least 1 while the record exists
    pub session_count: usize,
    /// Last connect, disconnect or status change
    pub last_seen: DateTime<Utc>,
}

/// Durable write lane for one user.
///
/// Each transition stages its status under the record lock, replacing any
/// status not yet written. Writers take the lane one at a time and write
/// whatever is staged, so the store always ends at the latest transition.
#[derive(Debug, Default)]
struct WriteLane {
    staged: Mutex<Option<(PresenceStatus, DateTime<Utc>)>>,
    writer: tokio::sync::Mutex<()>,
}

impl WriteLane {
    fn staged(&self) -> MutexGuard<'_, Option<(PresenceStatus, DateTime<Utc>)>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derives and broadcasts each user's effective status.
///
/// Transitions are decided and broadcast under the user's record lock, so
/// every observer sees a user's transitions in the order they happened.
/// Durable writes go through the user's write lane in the same order.
pub struct PresenceAggregator {
    /// User ID → live record
    records: DashMap<UserId, PresenceRecord>,
    /// Explicit non-online statuses kept across full disconnects. Only
    /// filled when sticky status is on; one entry per user currently away
    /// or busy by choice.
    declared: DashMap<UserId, PresenceStatus>,
    /// User ID → pending durable write, removed once drained
    lanes: DashMap<UserId, Arc<WriteLane>>,
    /// Status at the last full disconnect, for the reconnect grace window
    recent: DashMap<UserId, (PresenceStatus, Instant)>,
    sessions: Arc<SessionRegistry>,
    store: Arc<dyn PresenceStore>,
    write_policy: RetryPolicy,
    health: Arc<StoreHealth>,
    metrics: Arc<EngineMetrics>,
    reconnect_grace: Duration,
    sticky_manual_status: bool,
}

impl std::fmt::Debug for PresenceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceAggregator")
            .field("online_users", &self.records.len())
            .field("reconnect_grace", &self.reconnect_grace)
            .finish()
    }
}

impl PresenceAggregator {
    /// Create an aggregator broadcasting through `sessions`.
    pub fn new(
        config: &PresenceRealtimeConfig,
        sessions: Arc<SessionRegistry>,
        store: Arc<dyn PresenceStore>,
        write_policy: RetryPolicy,
        health: Arc<StoreHealth>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            records: DashMap::new(),
            declared: DashMap::new(),
            lanes: DashMap::new(),
            recent: DashMap::new(),
            sessions,
            store,
            write_policy,
            health,
            metrics,
            reconnect_grace: Duration::from_secs(config.reconnect_grace_seconds),
            sticky_manual_status: config.sticky_manual_status,
        }
    }

    /// A session for `user_id` was registered. Returns the new status if the
    /// user just came online.
    pub async fn on_session_added(&self, user_id: UserId) -> Option<PresenceStatus> {
        let now = Utc::now();
        let came_online = {
            let mut record = self.records.entry(user_id).or_insert_with(|| PresenceRecord {
                user_id,
                status: PresenceStatus::Online,
                session_count: 0,
                last_seen: now,
            });
            record.session_count += 1;
            record.last_seen = now;
            if record.session_count == 1 {
                record.status = self.status_on_return(user_id);
                self.broadcast(user_id, record.status);
                Some((record.status, self.stage(user_id, record.status, now)))
            } else {
                debug!(%user_id, sessions = record.session_count, "Additional session for online user");
                None
            }
        };

        let (status, lane) = came_online?;
        info!(%user_id, %status, "User came online");
        self.flush(user_id, lane).await;
        Some(status)
    }

    /// A session for `user_id` was deregistered. Returns `true` if this was
    /// the user's last session and they are now offline.
    pub async fn on_session_removed(&self, user_id: UserId) -> bool {
        let now = Utc::now();
        let went_offline = match self.records.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.session_count = record.session_count.saturating_sub(1);
                record.last_seen = now;
                if record.session_count == 0 {
                    // Everything happens before the entry is released so a
                    // concurrent reconnect is ordered after this offline.
                    if !self.reconnect_grace.is_zero() {
                        self.recent
                            .insert(user_id, (record.status, Instant::now()));
                    }
                    self.broadcast(user_id, PresenceStatus::Offline);
                    let lane = self.stage(user_id, PresenceStatus::Offline, now);
                    entry.remove();
                    Some(lane)
                } else {
                    None
                }
            }
            Entry::Vacant(_) => {
                warn!(%user_id, "Session removed for user without a presence record");
                None
            }
        };

        let Some(lane) = went_offline else {
            return false;
        };
        info!(%user_id, "User went offline");
        self.flush(user_id, lane).await;
        true
    }

    /// Set the user's declared status. Fails with `InvalidStatus` for an
    /// unknown value, leaving the current status untouched.
    pub async fn set_status(&self, user_id: UserId, raw: &str) -> AppResult<PresenceStatus> {
        let status: PresenceStatus = raw.parse()?;
        let now = Utc::now();
        let lane = {
            let mut record = self
                .records
                .get_mut(&user_id)
                .ok_or_else(|| AppError::not_found(format!("User {user_id} is not connected")))?;
            record.status = status;
            record.last_seen = now;
            if self.sticky_manual_status {
                match status {
                    PresenceStatus::Online => {
                        self.declared.remove(&user_id);
                    }
                    other => {
                        self.declared.insert(user_id, other);
                    }
                }
            }
            self.broadcast(user_id, status);
            self.stage(user_id, status, now)
        };

        debug!(%user_id, %status, "Status updated");
        self.flush(user_id, lane).await;
        Ok(status)
    }

    /// Current effective status; `offline` for users with no live session.
    pub fn current_status(&self, user_id: &UserId) -> PresenceStatus {
        self.records
            .get(user_id)
            .map(|r| r.status)
            .unwrap_or(PresenceStatus::Offline)
    }

    /// Snapshot of the user's live record.
    pub fn record(&self, user_id: &UserId) -> Option<PresenceRecord> {
        self.records.get(user_id).map(|r| r.value().clone())
    }

    /// Number of users with at least one live session.
    pub fn online_count(&self) -> usize {
        self.records.len()
    }

    /// Drop reconnect-grace entries that have expired.
    pub fn prune_recent(&self) {
        let grace = self.reconnect_grace;
        self.recent
            .retain(|_, (_, disconnected_at)| disconnected_at.elapsed() < grace);
    }

    fn status_on_return(&self, user_id: UserId) -> PresenceStatus {
        let recent = self.recent.remove(&user_id).map(|(_, entry)| entry);
        if self.sticky_manual_status {
            if let Some(declared) = self.declared.get(&user_id) {
                return *declared;
            }
        }
        match recent {
            Some((status, disconnected_at)) if disconnected_at.elapsed() < self.reconnect_grace => {
                status
            }
            _ => PresenceStatus::Online,
        }
    }

    /// Tell every other user's sessions about a transition.
    fn broadcast(&self, user_id: UserId, status: PresenceStatus) {
        let msg = OutboundMessage::UserPresence(UserPresenceEvent { user_id, status });
        let (mut queued, mut dropped) = (0, 0);
        for session in self.sessions.all_sessions() {
            if session.user_id == user_id {
                continue;
            }
            match session.send(msg.clone()) {
                SendOutcome::Queued => queued += 1,
                SendOutcome::Dropped | SendOutcome::Closed => dropped += 1,
            }
        }
        self.metrics.presence_changed();
        self.metrics.record_sends(queued, dropped);
    }

    /// Stage a transition for the durable mirror. Called under the record
    /// lock so staging order matches transition order.
    fn stage(&self, user_id: UserId, status: PresenceStatus, at: DateTime<Utc>) -> Arc<WriteLane> {
        let lane = self.lanes.entry(user_id).or_default().value().clone();
        *lane.staged() = Some((status, at));
        lane
    }

    /// Write whatever is staged on the lane. A caller whose status was
    /// already written by an earlier writer finds nothing staged.
    async fn flush(&self, user_id: UserId, lane: Arc<WriteLane>) {
        {
            let _writer = lane.writer.lock().await;
            let staged = lane.staged().take();
            if let Some((status, at)) = staged {
                self.persist(user_id, status, at).await;
            }
        }
        drop(lane);
        self.lanes.remove_if(&user_id, |_, lane| {
            Arc::strong_count(lane) == 1 && lane.staged().is_none()
        });
    }

    async fn persist(&self, user_id: UserId, status: PresenceStatus, last_seen: DateTime<Utc>) {
        let result = self
            .write_policy
            .run("persist_presence", || {
                self.store.persist_presence(user_id, status, last_seen)
            })
            .await;

        match result {
            Ok(()) => self.health.record_success(),
            Err(exhausted) => {
                if exhausted.error.is_store_fault() {
                    self.health.record_failure();
                }
                warn!(
                    %user_id,
                    %status,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "Failed to persist presence"
                );
            }
        }
    }
}
