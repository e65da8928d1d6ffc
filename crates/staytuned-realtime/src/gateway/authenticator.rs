//! Handshake credential extraction.

use staytuned_core::error::AppError;
use staytuned_core::result::AppResult;

/// Credentials presented by a connecting client.
#[derive(Debug, Clone, Copy, Default)]
pub struct Handshake<'a> {
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    /// `token` query parameter.
    pub token: Option<&'a str>,
}

impl<'a> Handshake<'a> {
    /// The bearer token, preferring the `Authorization` header over the
    /// query parameter.
    pub fn credential(&self) -> AppResult<&'a str> {
        if let Some(header) = self.authorization {
            return bearer_token(header)
                .ok_or_else(|| AppError::authentication("Malformed Authorization header"));
        }

        match self.token.map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            Some(_) => Err(AppError::authentication("Empty token")),
            None => Err(AppError::authentication("Authentication required")),
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
