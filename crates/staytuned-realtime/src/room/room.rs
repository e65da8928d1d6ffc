//! A single channel room.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use staytuned_core::types::{ChannelId, SessionId};

/// The live sessions currently receiving events for one channel.
#[derive(Debug, Clone)]
pub struct Room {
    /// Channel this room mirrors.
    pub channel_id: ChannelId,
    /// Member sessions.
    members: HashSet<SessionId>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Creates an empty room.
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            members: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a member. Returns `false` if already present.
    pub fn join(&mut self, session_id: SessionId) -> bool {
        self.members.insert(session_id)
    }

    /// Removes a member. Returns `false` if absent.
    pub fn leave(&mut self, session_id: SessionId) -> bool {
        self.members.remove(&session_id)
    }

    /// Whether `session_id` is a member.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.contains(session_id)
    }

    /// Snapshot of member IDs.
    pub fn members(&self) -> Vec<SessionId> {
        self.members.iter().copied().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
