//! HS256 access-token verification.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use staytuned_core::config::AuthConfig;
use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;
use staytuned_core::traits::TokenVerifier;
use staytuned_core::types::UserIdentity;

use super::claims::Claims;

/// Validates HS256 tokens signed with the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtVerifier {
    /// Creates a verifier from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token string.
    pub fn decode_claims(&self, token: &str) -> AppResult<Claims> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> AppResult<UserIdentity> {
        let claims = self.decode_claims(token)?;
        debug!(user_id = %claims.sub, expires_at = %claims.expires_at(), "Token verified");
        Ok(claims.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use staytuned_core::error::ErrorKind;
    use staytuned_core::types::UserId;

    use super::*;

    const SECRET: &str = "test-secret";

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&AuthConfig {
            jwt_secret: SECRET.to_string(),
            leeway_seconds: 0,
        })
    }

    fn sign<T: serde::Serialize>(claims: &T, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode")
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let user_id = UserId::new();
        let token = sign(&Claims::new(user_id, "alice", 300), SECRET);

        let identity = verifier().verify(&token).await.expect("valid token");
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn user_id_claim_is_accepted() {
        let user_id = UserId::new();
        let exp = chrono::Utc::now().timestamp() + 300;
        let token = sign(
            &json!({ "userId": user_id.to_string(), "username": "bob", "exp": exp }),
            SECRET,
        );

        let identity = verifier().verify(&token).await.expect("valid token");
        assert_eq!(identity.user_id, user_id);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let token = sign(&Claims::new(UserId::new(), "carol", -120), SECRET);

        let err = verifier().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "Token has expired");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let token = sign(&Claims::new(UserId::new(), "dave", 300), "other-secret");

        let err = verifier().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let err = verifier().verify("not.a.jwt").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
