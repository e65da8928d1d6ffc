//! Verified caller identity.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The identity a [`TokenVerifier`](crate::traits::TokenVerifier) extracts
/// from a valid credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// The authenticated user.
    pub user_id: UserId,
    /// Display name, echoed in typing indicators.
    pub username: String,
}
