//! # staytuned-api
//!
//! HTTP layer for StayTuned built on Axum.
//!
//! Serves the WebSocket endpoint, health probes and the internal routes the
//! CRUD layer calls after it commits a change.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
