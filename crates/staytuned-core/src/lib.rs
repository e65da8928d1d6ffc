//! # staytuned-core
//!
//! Core crate for the StayTuned real-time engine. Contains the capability
//! traits the engine consumes from the CRUD/storage layer, configuration
//! schemas, typed identifiers, domain value types, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other StayTuned crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
