//! Notification record text.

use staytuned_core::types::{ChannelId, NewNotification, NotificationKind, PostId, UserId};

use super::event::{PostPublished, ReactionAdded};

/// Longest message preview stored with a notification, in characters.
pub const PREVIEW_CHARS: usize = 100;

/// Recipient-independent part of a notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    /// Channel the event happened in.
    pub channel_id: ChannelId,
    /// Post the event refers to.
    pub post_id: PostId,
    /// Record kind.
    pub kind: NotificationKind,
    /// Headline.
    pub title: String,
    /// Preview.
    pub message: String,
}

impl NotificationTemplate {
    /// The record for one recipient.
    pub fn for_user(&self, user_id: UserId) -> NewNotification {
        NewNotification {
            user_id,
            channel_id: self.channel_id,
            post_id: self.post_id,
            kind: self.kind,
            title: self.title.clone(),
            message: self.message.clone(),
        }
    }
}

/// Record for a new post: `New post in {channel}` with a content preview.
pub fn new_post(channel_id: ChannelId, post: &PostPublished) -> NotificationTemplate {
    NotificationTemplate {
        channel_id,
        post_id: post.post_id,
        kind: NotificationKind::NewPost,
        title: format!("New post in {}", post.channel_name),
        message: preview(&post.content, PREVIEW_CHARS),
    }
}

/// Record for a reaction: `New reaction in {channel}` with the reaction type.
pub fn new_reaction(channel_id: ChannelId, reaction: &ReactionAdded) -> NotificationTemplate {
    NotificationTemplate {
        channel_id,
        post_id: reaction.post_id,
        kind: NotificationKind::NewReaction,
        title: format!("New reaction in {}", reaction.channel_name),
        message: reaction.reaction_type.clone(),
    }
}

/// First `max_chars` characters of `content`, never splitting a character.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview(&"a".repeat(150), 100).len(), 100);

        let emoji = "🔥".repeat(120);
        let cut = preview(&emoji, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(emoji.starts_with(&cut));
    }

    #[test]
    fn post_template_uses_channel_name_and_preview() {
        let channel_id = ChannelId::new();
        let post = PostPublished {
            post_id: PostId::new(),
            channel_name: "Rust News".to_string(),
            content: "x".repeat(300),
            post: json!({}),
        };

        let template = new_post(channel_id, &post);
        assert_eq!(template.title, "New post in Rust News");
        assert_eq!(template.message.len(), PREVIEW_CHARS);

        let user = UserId::new();
        let record = template.for_user(user);
        assert_eq!(record.user_id, user);
        assert_eq!(record.kind, NotificationKind::NewPost);
        assert_eq!(record.post_id, post.post_id);
    }
}
