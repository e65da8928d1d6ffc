//! JWT claims and verification.

pub mod claims;
pub mod verifier;

pub use claims::Claims;
pub use verifier::JwtVerifier;
