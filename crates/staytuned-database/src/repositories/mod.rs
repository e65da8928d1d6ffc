//! sqlx implementations of the real-time capability traits.

pub mod notification;
pub mod presence;
pub mod subscription;

pub use notification::NotificationRepository;
pub use presence::PresenceRepository;
pub use subscription::SubscriptionRepository;
