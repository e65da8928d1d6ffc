//! Channel subscription preferences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::UserId;
use crate::error::AppError;

/// How much a subscriber wants to hear from a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Every event.
    All,
    /// Posts only.
    Important,
    /// Nothing, live or durable.
    None,
}

impl NotificationLevel {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Important => "important",
            Self::None => "none",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "important" => Ok(Self::Important),
            "none" => Ok(Self::None),
            other => Err(AppError::validation(format!(
                "Unknown notification level '{other}'"
            ))),
        }
    }
}

/// One durable subscriber of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// The subscribed user.
    pub user_id: UserId,
    /// Their notification preference for the channel.
    pub level: NotificationLevel,
}

impl Subscriber {
    /// Create a subscriber entry.
    pub fn new(user_id: UserId, level: NotificationLevel) -> Self {
        Self { user_id, level }
    }
}
