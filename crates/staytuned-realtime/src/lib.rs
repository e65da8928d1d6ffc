//! # staytuned-realtime
//!
//! Real-time presence and fan-out engine for StayTuned. Provides:
//!
//! - WebSocket session lifecycle with token authentication
//! - Channel rooms joined from the user's subscriptions
//! - Per-user presence aggregated across devices
//! - Ordered fan-out of channel events with durable notifications for
//!   subscribers who are not watching
//! - Idle session eviction and graceful shutdown

pub mod dispatch;
pub mod gateway;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod retry;
pub mod room;
pub mod server;
pub mod session;
pub mod subscription;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dispatch::{ChannelEvent, DeliveryReport, FanoutDispatcher};
pub use gateway::{Connection, Gateway, Handshake};
pub use presence::PresenceAggregator;
pub use room::RoomDirectory;
pub use server::{EngineDeps, EngineStats, RealtimeEngine};
pub use session::{Session, SessionRegistry};
pub use subscription::CachedSubscriptionStore;
