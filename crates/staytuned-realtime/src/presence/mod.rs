//! Presence aggregation across a user's sessions.

pub mod aggregator;

pub use aggregator::{PresenceAggregator, PresenceRecord};
