//! Channel rooms: which live sessions receive which channel's events.

pub mod directory;
pub mod membership;
pub mod room;

pub use directory::RoomDirectory;
pub use room::Room;
