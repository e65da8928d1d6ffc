//! A single live client connection.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use staytuned_core::types::{SessionId, UserId, UserIdentity};

use crate::message::types::OutboundMessage;

/// Result of queueing a message on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for the socket writer.
    Queued,
    /// The outbound queue was full; the message was discarded.
    Dropped,
    /// The session is closed or its writer has gone away.
    Closed,
}

/// One live connection and its per-connection state.
///
/// Owned by the gateway task that accepted it; the registry holds a shared
/// reference for lookups. Room membership is tracked by the room directory.
#[derive(Debug)]
pub struct Session {
    /// Unique connection ID
    pub id: SessionId,
    /// User who owns this connection
    pub user_id: UserId,
    /// Username (cached for typing indicators)
    pub username: String,
    /// Bounded outbound queue
    sender: mpsc::Sender<OutboundMessage>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Last inbound activity
    last_activity: RwLock<DateTime<Utc>>,
    /// Whether the connection is still alive
    alive: AtomicBool,
    /// Fired when the session must be torn down
    closed: CancellationToken,
}

impl Session {
    /// Create a session for a verified identity, returning it with the
    /// receiving half of its outbound queue.
    pub fn new(
        identity: UserIdentity,
        queue_size: usize,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let now = Utc::now();
        let session = Self {
            id: SessionId::new(),
            user_id: identity.user_id,
            username: identity.username,
            sender,
            connected_at: now,
            last_activity: RwLock::new(now),
            alive: AtomicBool::new(true),
            closed: CancellationToken::new(),
        };
        (session, receiver)
    }

    /// Queue a message without waiting. A full queue drops the new message so
    /// a slow client never blocks the sender.
    pub fn send(&self, msg: OutboundMessage) -> SendOutcome {
        if !self.is_alive() {
            return SendOutcome::Closed;
        }
        match self.sender.try_send(msg) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(
                    session_id = %self.id,
                    user_id = %self.user_id,
                    event = msg.event_name(),
                    "Outbound queue full, dropping message"
                );
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                SendOutcome::Closed
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead without signalling the connection task.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Mark the session dead and signal its connection task to close.
    pub fn close(&self) {
        self.mark_dead();
        self.closed.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Update last activity timestamp
    pub async fn touch(&self) {
        *self.last_activity.write().await = Utc::now();
    }

    /// Last inbound activity.
    pub async fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: UserId::new(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_newest_message() {
        let (session, mut rx) = Session::new(identity(), 1);

        assert_eq!(session.send(OutboundMessage::error("first")), SendOutcome::Queued);
        assert_eq!(session.send(OutboundMessage::error("second")), SendOutcome::Dropped);

        assert_eq!(rx.recv().await, Some(OutboundMessage::error("first")));
        assert!(rx.try_recv().is_err());
        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn dropped_receiver_marks_session_dead() {
        let (session, rx) = Session::new(identity(), 4);
        drop(rx);

        assert_eq!(session.send(OutboundMessage::ping()), SendOutcome::Closed);
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn close_stops_sends_and_wakes_waiters() {
        let (session, _rx) = Session::new(identity(), 4);
        session.close();

        session.closed().await;
        assert_eq!(session.send(OutboundMessage::ping()), SendOutcome::Closed);
    }

    #[tokio::test]
    async fn touch_advances_last_activity() {
        let (session, _rx) = Session::new(identity(), 4);
        let before = session.last_activity().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        session.touch().await;
        assert!(session.last_activity().await > before);
    }
}
