//! Shared-secret guard for routes only the CRUD layer may call.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use staytuned_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the internal API key.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Rejects requests whose `x-internal-key` does not match the configured
/// key. An empty configured key rejects everything.
pub async fn require_internal_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.config.server.internal_api_key.as_str();
    let provided = request
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if !expected.is_empty() && key == expected => Ok(next.run(request).await),
        _ => {
            warn!(path = %request.uri().path(), "Internal route called without a valid key");
            Err(AppError::authentication("Invalid internal API key").into())
        }
    }
}
