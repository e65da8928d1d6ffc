//! Credential verification capability.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::UserIdentity;

/// Verifies the opaque bearer credential a client presents at handshake.
///
/// Implementations must return an `Authentication` error for expired,
/// forged or unparseable tokens. Issuance is not part of this contract.
#[async_trait]
pub trait TokenVerifier: Send + Sync + std::fmt::Debug + 'static {
    /// Verify `token` and return the identity it carries.
    async fn verify(&self, token: &str) -> AppResult<UserIdentity>;
}
