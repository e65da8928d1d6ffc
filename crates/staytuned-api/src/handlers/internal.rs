//! Routes the CRUD layer calls after committing a change.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use staytuned_core::types::{ChannelId, UserId};
use staytuned_realtime::{ChannelEvent, DeliveryReport};

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /internal/subscriptions/changed`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsChanged {
    /// User whose subscriptions changed.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Channel whose subscribers changed.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

/// POST /internal/channels/{channel_id}/events
///
/// Answers 200 with the delivery report, or 207 when some durable
/// notifications could not be written.
pub async fn publish_event(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Json(event): Json<ChannelEvent>,
) -> Result<(StatusCode, Json<DeliveryReport>), ApiError> {
    let report = state.realtime.publish(channel_id, event).await?;
    let status = if report.is_partial_failure() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

/// POST /internal/subscriptions/changed
pub async fn subscriptions_changed(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionsChanged>,
) -> StatusCode {
    state
        .realtime
        .subscriptions_changed(body.user_id, body.channel_id)
        .await;
    StatusCode::NO_CONTENT
}
