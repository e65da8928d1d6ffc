//! Per-channel dispatch lanes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use staytuned_core::types::ChannelId;

/// One lock per channel holding its last issued sequence number.
///
/// Holding a lane serializes sequence allocation and live sends for that
/// channel so every session observes the channel's events in publish order.
/// Lanes never block on I/O; durable writes happen after release.
///
/// Lanes are never removed: a channel's sequence must keep increasing for
/// the life of the process, so the map holds one small entry per channel
/// that has ever been published to.
#[derive(Debug, Default)]
pub struct ChannelLanes {
    lanes: DashMap<ChannelId, Arc<Mutex<u64>>>,
}

/// A held lane.
pub struct LaneGuard<'a> {
    seq: MutexGuard<'a, u64>,
}

impl LaneGuard<'_> {
    /// Allocate the next sequence number for this channel.
    pub fn next_seq(&mut self) -> u64 {
        *self.seq += 1;
        *self.seq
    }
}

impl ChannelLanes {
    /// Create an empty set of lanes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lane for a channel, created on first use.
    pub fn lane(&self, channel_id: ChannelId) -> Arc<Mutex<u64>> {
        self.lanes.entry(channel_id).or_default().value().clone()
    }

    /// Lock a lane obtained from [`lane`](Self::lane).
    pub fn acquire(lane: &Mutex<u64>) -> LaneGuard<'_> {
        LaneGuard {
            seq: lane.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Last sequence number issued for a channel, 0 if none.
    pub fn last_seq(&self, channel_id: &ChannelId) -> u64 {
        self.lanes
            .get(channel_id)
            .map(|lane| *Self::acquire(lane.value()).seq)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_per_channel_and_increasing() {
        let lanes = ChannelLanes::new();
        let a = ChannelId::new();
        let b = ChannelId::new();

        let lane_a = lanes.lane(a);
        assert_eq!(ChannelLanes::acquire(&lane_a).next_seq(), 1);
        assert_eq!(ChannelLanes::acquire(&lane_a).next_seq(), 2);

        let lane_b = lanes.lane(b);
        assert_eq!(ChannelLanes::acquire(&lane_b).next_seq(), 1);

        assert_eq!(lanes.last_seq(&a), 2);
        assert_eq!(lanes.last_seq(&ChannelId::new()), 0);
    }
}
