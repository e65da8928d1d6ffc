//! Health check handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use staytuned_realtime::EngineStats;

use crate::state::AppState;

/// Liveness body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// Real-time engine health body.
#[derive(Debug, Serialize)]
pub struct RealtimeHealthResponse {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Engine statistics.
    #[serde(flatten)]
    pub stats: EngineStats,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/health/realtime
///
/// Answers 503 while the durable store is degraded.
pub async fn realtime_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<RealtimeHealthResponse>) {
    let stats = state.realtime.stats();
    let degraded = state.realtime.store_health.is_degraded();
    let (code, status) = if degraded {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };
    (code, Json(RealtimeHealthResponse { status, stats }))
}
