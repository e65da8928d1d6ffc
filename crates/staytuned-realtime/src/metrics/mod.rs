//! Realtime engine metrics.

pub mod health;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub use health::StoreHealth;

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total sessions accepted
    pub connections_total: AtomicU64,
    /// Sessions currently live
    pub connections_active: AtomicU64,
    /// Handshakes refused
    pub auth_failures: AtomicU64,
    /// Sessions evicted for inactivity
    pub sessions_reaped: AtomicU64,
    /// Inbound commands processed
    pub messages_received: AtomicU64,
    /// Outbound messages queued
    pub messages_sent: AtomicU64,
    /// Outbound messages dropped on a full or closed queue
    pub messages_dropped: AtomicU64,
    /// Channel events published
    pub events_published: AtomicU64,
    /// Durable notifications written
    pub notifications_persisted: AtomicU64,
    /// Durable notifications given up on
    pub notifications_failed: AtomicU64,
    /// Presence transitions broadcast
    pub presence_changes: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted session.
    pub fn session_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cleaned-up session.
    pub fn session_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a refused handshake.
    pub fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an idle eviction.
    pub fn session_reaped(&self) {
        self.sessions_reaped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound command.
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record outbound queue results.
    pub fn record_sends(&self, queued: u64, dropped: u64) {
        self.messages_sent.fetch_add(queued, Ordering::Relaxed);
        self.messages_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Record a published channel event.
    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record durable notification outcomes.
    pub fn record_notifications(&self, persisted: u64, failed: u64) {
        self.notifications_persisted
            .fetch_add(persisted, Ordering::Relaxed);
        self.notifications_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record a broadcast presence transition.
    pub fn presence_changed(&self) {
        self.presence_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            sessions_reaped: self.sessions_reaped.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            notifications_persisted: self.notifications_persisted.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            presence_changes: self.presence_changes.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total sessions accepted
    pub connections_total: u64,
    /// Sessions currently live
    pub connections_active: u64,
    /// Handshakes refused
    pub auth_failures: u64,
    /// Sessions evicted for inactivity
    pub sessions_reaped: u64,
    /// Inbound commands processed
    pub messages_received: u64,
    /// Outbound messages queued
    pub messages_sent: u64,
    /// Outbound messages dropped
    pub messages_dropped: u64,
    /// Channel events published
    pub events_published: u64,
    /// Durable notifications written
    pub notifications_persisted: u64,
    /// Durable notifications given up on
    pub notifications_failed: u64,
    /// Presence transitions broadcast
    pub presence_changes: u64,
}
