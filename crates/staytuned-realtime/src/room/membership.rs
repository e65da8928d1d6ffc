//! Per-session reverse index of joined rooms.

use std::collections::HashSet;

use dashmap::DashMap;

use staytuned_core::types::{ChannelId, SessionId};

/// Session ID → channels whose rooms it has joined.
///
/// The index entry for a session is locked while the directory updates the
/// matching room, so a join racing a leave of the same session cannot leave
/// the two maps disagreeing.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    by_session: DashMap<SessionId, HashSet<ChannelId>>,
}

impl MembershipIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `channel_id` for `session_id`, running `on_added` under the
    /// entry lock if it was not already recorded. Returns whether it was added.
    pub fn insert_with(
        &self,
        session_id: SessionId,
        channel_id: ChannelId,
        on_added: impl FnOnce(),
    ) -> bool {
        let mut channels = self.by_session.entry(session_id).or_default();
        if !channels.insert(channel_id) {
            return false;
        }
        on_added();
        true
    }

    /// Forgets `channel_id` for `session_id`, running `on_removed` under the
    /// entry lock if it was recorded. Returns whether it was removed.
    pub fn remove_with(
        &self,
        session_id: SessionId,
        channel_id: ChannelId,
        on_removed: impl FnOnce(),
    ) -> bool {
        let removed = match self.by_session.get_mut(&session_id) {
            Some(mut channels) => {
                let removed = channels.remove(&channel_id);
                if removed {
                    on_removed();
                }
                removed
            }
            None => false,
        };
        if removed {
            self.by_session
                .remove_if(&session_id, |_, channels| channels.is_empty());
        }
        removed
    }

    /// Removes and returns every channel recorded for `session_id`.
    pub fn remove_all(&self, session_id: &SessionId) -> HashSet<ChannelId> {
        self.by_session
            .remove(session_id)
            .map(|(_, channels)| channels)
            .unwrap_or_default()
    }

    /// Channels recorded for `session_id`.
    pub fn channels(&self, session_id: &SessionId) -> HashSet<ChannelId> {
        self.by_session
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Whether `session_id` has joined `channel_id`.
    pub fn contains(&self, session_id: &SessionId, channel_id: &ChannelId) -> bool {
        self.by_session
            .get(session_id)
            .is_some_and(|channels| channels.contains(channel_id))
    }
}
