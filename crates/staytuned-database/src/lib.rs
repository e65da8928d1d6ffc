//! # staytuned-database
//!
//! PostgreSQL connection management and the sqlx-backed implementations of
//! the capability traits the real-time engine consumes. The tables are
//! owned and migrated by the CRUD layer; this crate only queries them.

pub mod connection;
pub mod repositories;

pub use connection::{DatabasePool, Repositories};
pub use repositories::{NotificationRepository, PresenceRepository, SubscriptionRepository};
