//! JWT claims carried by CRUD-issued access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staytuned_core::types::{UserId, UserIdentity};

/// Claims payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the user ID. Tokens signed with a `userId` claim are
    /// accepted as well.
    #[serde(alias = "userId")]
    pub sub: Uuid,
    /// Username, echoed in typing indicators.
    pub username: String,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    /// Build claims for `user_id` valid for `ttl_seconds` from now.
    pub fn new(user_id: UserId, username: impl Into<String>, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.into_uuid(),
            username: username.into(),
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// Returns the user ID from the subject claim.
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.sub)
    }

    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// The identity these claims vouch for.
    pub fn into_identity(self) -> UserIdentity {
        UserIdentity {
            user_id: UserId::from_uuid(self.sub),
            username: self.username,
        }
    }
}
