//! Channel events the CRUD layer publishes after commit.

use serde::{Deserialize, Serialize};

use staytuned_core::types::{ChannelId, NotificationKind, PostId};

use crate::message::types::{
    ChannelUpdateEvent, NewPostEvent, NewReactionEvent, OutboundMessage,
};

use super::formatter::{self, NotificationTemplate};

/// Event kinds, used for eligibility filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new post.
    Post,
    /// A reaction on a post.
    Reaction,
    /// Channel metadata changed. Live only, never persisted.
    ChannelUpdate,
}

impl EventKind {
    /// Durable record kind for subscribers who miss the live delivery, or
    /// `None` if the kind is live only.
    pub fn notification_kind(&self) -> Option<NotificationKind> {
        match self {
            Self::Post => Some(NotificationKind::NewPost),
            Self::Reaction => Some(NotificationKind::NewReaction),
            Self::ChannelUpdate => None,
        }
    }
}

/// A committed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPublished {
    /// Post ID
    pub post_id: PostId,
    /// Name of the channel, for notification titles
    pub channel_name: String,
    /// Post body, for notification previews
    pub content: String,
    /// Full post as returned by the CRUD API
    pub post: serde_json::Value,
}

/// A committed reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAdded {
    /// Post that was reacted to
    pub post_id: PostId,
    /// Name of the channel, for notification titles
    pub channel_name: String,
    /// Reaction type, e.g. `heart` or `fire`
    pub reaction_type: String,
    /// Full reaction as returned by the CRUD API
    pub reaction: serde_json::Value,
}

/// A committed channel update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUpdated {
    /// Full channel as returned by the CRUD API
    pub channel: serde_json::Value,
}

/// Input to [`FanoutDispatcher::publish`](super::FanoutDispatcher::publish).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// See [`PostPublished`].
    Post(PostPublished),
    /// See [`ReactionAdded`].
    Reaction(ReactionAdded),
    /// See [`ChannelUpdated`].
    ChannelUpdate(ChannelUpdated),
}

impl ChannelEvent {
    /// The event's kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Post(_) => EventKind::Post,
            Self::Reaction(_) => EventKind::Reaction,
            Self::ChannelUpdate(_) => EventKind::ChannelUpdate,
        }
    }

    /// Live message for room members.
    pub fn to_outbound(&self, channel_id: ChannelId, seq: u64) -> OutboundMessage {
        match self {
            Self::Post(p) => OutboundMessage::NewPost(NewPostEvent {
                channel_id,
                post: p.post.clone(),
                seq,
            }),
            Self::Reaction(r) => OutboundMessage::NewReaction(NewReactionEvent {
                channel_id,
                post_id: r.post_id,
                reaction: r.reaction.clone(),
                seq,
            }),
            Self::ChannelUpdate(c) => OutboundMessage::ChannelUpdate(ChannelUpdateEvent {
                channel_id,
                channel: c.channel.clone(),
                seq,
            }),
        }
    }

    /// Durable record contents for subscribers who miss the live delivery.
    pub fn notification_template(&self, channel_id: ChannelId) -> Option<NotificationTemplate> {
        match self {
            Self::Post(p) => Some(formatter::new_post(channel_id, p)),
            Self::Reaction(r) => Some(formatter::new_reaction(channel_id, r)),
            Self::ChannelUpdate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_internally_tagged_post() {
        let post_id = PostId::new();
        let event: ChannelEvent = serde_json::from_value(json!({
            "type": "post",
            "postId": post_id,
            "channelName": "Rust News",
            "content": "Hello",
            "post": { "id": post_id, "content": "Hello" }
        }))
        .expect("deserialize");

        assert_eq!(event.kind(), EventKind::Post);
        match event {
            ChannelEvent::Post(p) => assert_eq!(p.post_id, post_id),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn channel_update_is_live_only() {
        let event = ChannelEvent::ChannelUpdate(ChannelUpdated {
            channel: json!({ "name": "renamed" }),
        });
        assert_eq!(event.kind().notification_kind(), None);
        assert!(event.notification_template(ChannelId::new()).is_none());
    }
}
