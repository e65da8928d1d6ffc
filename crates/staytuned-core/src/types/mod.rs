//! Core type definitions shared by every StayTuned crate.

pub mod id;
pub mod identity;
pub mod notification;
pub mod presence;
pub mod subscription;

pub use id::*;
pub use identity::UserIdentity;
pub use notification::{NewNotification, NotificationKind};
pub use presence::PresenceStatus;
pub use subscription::{NotificationLevel, Subscriber};
