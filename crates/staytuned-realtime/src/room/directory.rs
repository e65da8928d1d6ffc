//! Room directory. Maps channels to the live sessions receiving their
//! events.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use staytuned_core::types::{ChannelId, SessionId};

use super::membership::MembershipIndex;
use super::room::Room;

/// Registry of all non-empty rooms, sharded by channel.
///
/// Lock order is always membership entry, then room shard.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    /// Channel ID → room.
    rooms: DashMap<ChannelId, Room>,
    /// Session ID → joined channels.
    membership: MembershipIndex,
    /// Rooms created since start.
    rooms_created: AtomicU64,
}

impl RoomDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to a channel's room, creating the room on first join.
    /// Returns `false` if the session was already a member.
    pub fn join(&self, channel_id: ChannelId, session_id: SessionId) -> bool {
        self.membership.insert_with(session_id, channel_id, || {
            self.rooms
                .entry(channel_id)
                .or_insert_with(|| {
                    self.rooms_created.fetch_add(1, Ordering::Relaxed);
                    debug!(%channel_id, "Room created");
                    Room::new(channel_id)
                })
                .join(session_id);
        })
    }

    /// Removes a session from a channel's room. Leaving a room the session
    /// never joined is a no-op returning `false`.
    pub fn leave(&self, channel_id: ChannelId, session_id: SessionId) -> bool {
        self.membership.remove_with(session_id, channel_id, || {
            self.remove_member(channel_id, session_id);
        })
    }

    /// Removes a session from every room it belongs to. Returns the channels
    /// it left.
    pub fn leave_all(&self, session_id: SessionId) -> Vec<ChannelId> {
        let channels = self.membership.remove_all(&session_id);
        for channel_id in &channels {
            self.remove_member(*channel_id, session_id);
        }
        channels.into_iter().collect()
    }

    /// Current members of a channel's room.
    pub fn members(&self, channel_id: &ChannelId) -> Vec<SessionId> {
        self.rooms
            .get(channel_id)
            .map(|room| room.members())
            .unwrap_or_default()
    }

    /// Channels whose rooms `session_id` has joined.
    pub fn rooms_of(&self, session_id: &SessionId) -> Vec<ChannelId> {
        self.membership.channels(session_id).into_iter().collect()
    }

    /// Whether `session_id` is in the room for `channel_id`.
    pub fn is_member(&self, channel_id: &ChannelId, session_id: &SessionId) -> bool {
        self.membership.contains(session_id, channel_id)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members in a channel's room.
    pub fn member_count(&self, channel_id: &ChannelId) -> usize {
        self.rooms.get(channel_id).map(|room| room.len()).unwrap_or(0)
    }

    /// Rooms created since start.
    pub fn rooms_created(&self) -> u64 {
        self.rooms_created.load(Ordering::Relaxed)
    }

    fn remove_member(&self, channel_id: ChannelId, session_id: SessionId) {
        if let Some(mut room) = self.rooms.get_mut(&channel_id) {
            room.leave(session_id);
        }
        // Checked again under the shard lock so a concurrent join is never lost.
        if self
            .rooms
            .remove_if(&channel_id, |_, room| room.is_empty())
            .is_some()
        {
            debug!(%channel_id, "Room removed");
        }
    }
}
