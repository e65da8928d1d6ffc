//! WebSocket upgrade handler and per-connection task.

use axum::extract::ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use staytuned_realtime::message::{OutboundMessage, encode_outbound};
use staytuned_realtime::{Connection, Handshake};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Access token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// GET /ws. Authenticates, then upgrades.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let handshake = Handshake {
        authorization: headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        token: query.token.as_deref(),
    };
    let connection = state.realtime.gateway.accept(handshake).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            state
                .realtime
                .gateway
                .disconnect(connection.session.id)
                .await;
            return Ok(rejection.into_response());
        }
    };

    let max_bytes = state.realtime.config().max_message_bytes;
    let session_id = connection.session.id;
    let gateway = state.realtime.gateway.clone();
    Ok(ws
        .max_message_size(max_bytes)
        .on_failed_upgrade(move |e| {
            warn!(%session_id, error = %e, "WebSocket upgrade failed");
            tokio::spawn(async move {
                gateway.disconnect(session_id).await;
            });
        })
        .on_upgrade(move |socket| run_connection(state, connection, socket)))
}

/// Drives one connection until the client leaves, the session is closed
/// by the engine, or the engine shuts down.
async fn run_connection(state: AppState, connection: Connection, socket: WebSocket) {
    let Connection {
        session,
        mut outbound,
    } = connection;
    let gateway = state.realtime.gateway.clone();
    let shutdown = state.realtime.shutdown_token();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping = time::interval(state.realtime.config().ping_interval());
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = session.closed() => break,
            _ = shutdown.cancelled() => break,
            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                match encode_outbound(&msg) {
                    Ok(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(session_id = %session.id, error = %e, "Dropping unencodable event"),
                }
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => gateway.handle_inbound(&session, text.as_str()).await,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => session.touch().await,
                Some(Ok(Message::Binary(_))) => {
                    session.send(OutboundMessage::error("Binary frames are not supported"));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(session_id = %session.id, error = %e, "WebSocket read failed");
                    break;
                }
            },
            _ = ping.tick() => {
                session.send(OutboundMessage::ping());
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = ws_tx.close().await {
        debug!(session_id = %session.id, error = %e, "WebSocket close failed");
    }
    gateway.disconnect(session.id).await;
}
