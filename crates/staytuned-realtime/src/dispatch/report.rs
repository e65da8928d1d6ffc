//! Outcome of a fan-out, returned to the publisher.

use serde::Serialize;

use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::types::{ChannelId, UserId};

use super::event::EventKind;

/// A durable notification that could not be written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFailure {
    /// Intended recipient.
    pub user_id: UserId,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Last error.
    pub error: String,
}

/// What a [`publish`](super::FanoutDispatcher::publish) did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Channel published to.
    pub channel_id: ChannelId,
    /// Event kind.
    pub kind: EventKind,
    /// Sequence number assigned to the event.
    pub seq: u64,
    /// Size of the eligible set.
    pub eligible_users: usize,
    /// Eligible users with at least one live session in the room.
    pub live_users: usize,
    /// Live messages queued.
    pub sessions_delivered: usize,
    /// Live messages dropped on a full or closed queue.
    pub sessions_dropped: usize,
    /// Durable notifications written.
    pub notifications_persisted: usize,
    /// `notification` events pushed to recipients connected outside the room.
    pub notifications_pushed: usize,
    /// Durable notifications that failed after retries.
    pub failures: Vec<NotificationFailure>,
}

impl DeliveryReport {
    /// Empty report for an event.
    pub fn new(channel_id: ChannelId, kind: EventKind, seq: u64) -> Self {
        Self {
            channel_id,
            kind,
            seq,
            eligible_users: 0,
            live_users: 0,
            sessions_delivered: 0,
            sessions_dropped: 0,
            notifications_persisted: 0,
            notifications_pushed: 0,
            failures: Vec::new(),
        }
    }

    /// Whether any durable notification failed.
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    /// The report, or a `DeliveryPartialFailure` error if any durable write
    /// failed.
    pub fn into_result(self) -> AppResult<Self> {
        if self.is_partial_failure() {
            return Err(AppError::delivery_partial_failure(format!(
                "{} of {} notifications for channel {} (seq {}) were not persisted",
                self.failures.len(),
                self.failures.len() + self.notifications_persisted,
                self.channel_id,
                self.seq
            )));
        }
        Ok(self)
    }
}
