//! Subscription lookups.

pub mod cache;

pub use cache::CachedSubscriptionStore;
