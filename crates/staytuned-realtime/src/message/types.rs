//! Inbound and outbound WebSocket message type definitions.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Payload fields are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use staytuned_core::types::{ChannelId, NotificationKind, PostId, PresenceStatus, UserId};

/// Commands sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Start receiving live events for a subscribed channel.
    JoinChannel(ChannelId),
    /// Stop receiving live events for a channel.
    LeaveChannel(ChannelId),
    /// The user is typing in a channel.
    UserTyping(TypingCommand),
    /// Change the user's presence status. Kept as a raw string so an
    /// unknown value can be reported back instead of failing decode.
    UpdateStatus(String),
    /// Application-level heartbeat reply.
    Pong,
}

/// Payload of `user_typing` sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingCommand {
    /// Channel the user is typing in.
    pub channel_id: ChannelId,
}

/// Events sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A post was published in a joined channel.
    NewPost(NewPostEvent),
    /// A reaction was added to a post in a joined channel.
    NewReaction(NewReactionEvent),
    /// A joined channel's metadata changed.
    ChannelUpdate(ChannelUpdateEvent),
    /// Another user's presence changed.
    UserPresence(UserPresenceEvent),
    /// Another session in a joined channel is typing.
    UserTyping(UserTypingEvent),
    /// Something happened in a followed channel this session is not in.
    Notification(NotificationEvent),
    /// A command from this session failed.
    Error(ErrorEvent),
    /// Server heartbeat.
    Ping(PingEvent),
}

/// `new_post` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostEvent {
    /// Channel the post belongs to.
    pub channel_id: ChannelId,
    /// The post as committed by the CRUD layer.
    pub post: serde_json::Value,
    /// Per-channel sequence number for duplicate suppression.
    pub seq: u64,
}

/// `new_reaction` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReactionEvent {
    /// Channel the post belongs to.
    pub channel_id: ChannelId,
    /// Post that received the reaction.
    pub post_id: PostId,
    /// The reaction as committed by the CRUD layer.
    pub reaction: serde_json::Value,
    /// Per-channel sequence number.
    pub seq: u64,
}

/// `channel_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUpdateEvent {
    /// Updated channel.
    pub channel_id: ChannelId,
    /// The channel as committed by the CRUD layer.
    pub channel: serde_json::Value,
    /// Per-channel sequence number.
    pub seq: u64,
}

/// `user_presence` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresenceEvent {
    /// User whose presence changed.
    pub user_id: UserId,
    /// New effective status.
    pub status: PresenceStatus,
}

/// `user_typing` payload sent to other room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingEvent {
    /// Typing user.
    pub user_id: UserId,
    /// Typing user's display name.
    pub username: String,
    /// Channel being typed in.
    pub channel_id: ChannelId,
}

/// `notification` payload, mirroring the durable record just written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Channel the event happened in.
    pub channel_id: ChannelId,
    /// Post the event refers to.
    pub post_id: PostId,
    /// Event kind.
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Body preview.
    pub message: String,
    /// Per-channel sequence number of the originating event.
    pub seq: u64,
}

/// `error` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Human-readable reason.
    pub message: String,
}

/// `ping` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingEvent {
    /// Server time the ping was sent.
    pub timestamp: DateTime<Utc>,
}

impl OutboundMessage {
    /// Build an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorEvent {
            message: message.into(),
        })
    }

    /// Build a `ping` event stamped with the current time.
    pub fn ping() -> Self {
        Self::Ping(PingEvent {
            timestamp: Utc::now(),
        })
    }

    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::NewPost(_) => "new_post",
            Self::NewReaction(_) => "new_reaction",
            Self::ChannelUpdate(_) => "channel_update",
            Self::UserPresence(_) => "user_presence",
            Self::UserTyping(_) => "user_typing",
            Self::Notification(_) => "notification",
            Self::Error(_) => "error",
            Self::Ping(_) => "ping",
        }
    }
}
