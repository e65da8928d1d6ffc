//! Route definitions for the StayTuned HTTP surface.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .route("/ws", get(handlers::ws::ws_upgrade))
        .nest("/api", health_routes())
        .nest("/internal", internal_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Liveness and engine health
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/realtime", get(handlers::health::realtime_health))
}

/// Routes for the CRUD layer, guarded by the internal API key
fn internal_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/channels/{channel_id}/events",
            post(handlers::internal::publish_event),
        )
        .route(
            "/subscriptions/changed",
            post(handlers::internal::subscriptions_changed),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::internal::require_internal_key,
        ))
}
