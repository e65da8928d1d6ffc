//! Live sessions and the registry that indexes them.

pub mod handle;
pub mod registry;

pub use handle::{SendOutcome, Session};
pub use registry::SessionRegistry;
