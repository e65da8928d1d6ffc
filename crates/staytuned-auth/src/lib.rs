//! # staytuned-auth
//!
//! Verification of the bearer tokens clients present when opening a
//! real-time connection. Tokens are issued by the CRUD layer; this crate
//! only checks them.
//!
//! ## Modules
//!
//! - `jwt`: HS256 claims decoding and the [`TokenVerifier`] implementation
//!
//! [`TokenVerifier`]: staytuned_core::traits::TokenVerifier

pub mod jwt;

pub use jwt::{Claims, JwtVerifier};
