//! Inbound client commands.

use std::sync::Arc;

use tracing::{debug, warn};

use staytuned_core::types::ChannelId;

use crate::message::codec::decode_inbound;
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::session::Session;

use super::lifecycle::Gateway;

impl Gateway {
    /// Handle one text frame from a session. Bad input is answered with an
    /// `error` event; the connection stays open.
    pub async fn handle_inbound(&self, session: &Arc<Session>, raw: &str) {
        session.touch().await;
        self.metrics.message_received();

        match decode_inbound(raw, self.config.max_message_bytes) {
            Ok(command) => self.handle_command(session, command).await,
            Err(e) => {
                debug!(session_id = %session.id, error = %e, "Rejected inbound frame");
                session.send(OutboundMessage::error(e.message));
            }
        }
    }

    /// Execute a decoded command.
    pub async fn handle_command(&self, session: &Arc<Session>, command: InboundMessage) {
        match command {
            InboundMessage::JoinChannel(channel_id) => self.join_channel(session, channel_id).await,
            InboundMessage::LeaveChannel(channel_id) => {
                if self.rooms.leave(channel_id, session.id) {
                    debug!(session_id = %session.id, %channel_id, "Left room");
                }
            }
            InboundMessage::UserTyping(typing) => {
                self.dispatcher.broadcast_typing(typing.channel_id, session);
            }
            InboundMessage::UpdateStatus(status) => {
                if let Err(e) = self.presence.set_status(session.user_id, &status).await {
                    session.send(OutboundMessage::error(e.message));
                }
            }
            InboundMessage::Pong => {}
        }
    }

    /// Join a room the user is subscribed to. Requests for channels the user
    /// is not subscribed to are ignored.
    async fn join_channel(&self, session: &Arc<Session>, channel_id: ChannelId) {
        if !session.is_alive() || self.rooms.is_member(&channel_id, &session.id) {
            return;
        }

        match self.subscriptions.is_subscribed(session.user_id, channel_id).await {
            Ok(true) => {
                self.health.record_success();
                self.rooms.join(channel_id, session.id);
                // A disconnect closes the session before it leaves rooms, so
                // a join that lands after that cleanup sees it closed here.
                if !session.is_alive() {
                    self.rooms.leave(channel_id, session.id);
                    return;
                }
                debug!(session_id = %session.id, %channel_id, "Joined room");
            }
            Ok(false) => {
                self.health.record_success();
                debug!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    %channel_id,
                    "Join ignored, user is not subscribed"
                );
            }
            Err(e) => {
                if e.is_store_fault() {
                    self.health.record_failure();
                }
                warn!(session_id = %session.id, %channel_id, error = %e, "Subscription check failed");
                session.send(OutboundMessage::error("Unable to join channel right now"));
            }
        }
    }
}
