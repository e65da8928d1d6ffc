//! Durable notification records written for subscribers who missed a live
//! delivery.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{ChannelId, PostId, UserId};

/// Kind column of a notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A post was published in a followed channel.
    NewPost,
    /// A reaction was added to a post in a followed channel.
    NewReaction,
}

impl NotificationKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new_post",
            Self::NewReaction => "new_reaction",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification record to be persisted for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    /// Recipient.
    pub user_id: UserId,
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
}
