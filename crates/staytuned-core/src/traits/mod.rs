//! Capability traits the real-time engine consumes from the CRUD and
//! storage layer. Implementations live in other crates.

pub mod auth;
pub mod notification;
pub mod presence;
pub mod subscription;

pub use auth::TokenVerifier;
pub use notification::NotificationStore;
pub use presence::PresenceStore;
pub use subscription::SubscriptionStore;
