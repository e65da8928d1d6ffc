//! Axum middleware stack.

pub mod cors;
pub mod internal;
pub mod logging;
