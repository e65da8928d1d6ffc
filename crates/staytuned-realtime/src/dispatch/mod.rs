//! Channel event fan-out.

pub mod dispatcher;
pub mod eligibility;
pub mod event;
pub mod formatter;
pub mod lanes;
pub mod report;

pub use dispatcher::FanoutDispatcher;
pub use event::{ChannelEvent, ChannelUpdated, EventKind, PostPublished, ReactionAdded};
pub use report::{DeliveryReport, NotificationFailure};
