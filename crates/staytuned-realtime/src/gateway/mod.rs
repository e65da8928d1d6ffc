//! Connection gateway.

pub mod authenticator;
pub mod commands;
pub mod heartbeat;
pub mod lifecycle;

pub use authenticator::Handshake;
pub use heartbeat::run_idle_sweeper;
pub use lifecycle::{Connection, Gateway};
