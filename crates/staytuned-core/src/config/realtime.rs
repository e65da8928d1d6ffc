//! Real-time engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each session's outbound queue. Messages beyond it are
    /// dropped (newest first) rather than blocking the sender.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue_size: usize,
    /// Interval between server pings on each connection, in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// A session with no inbound activity for this long is evicted.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// How often the idle sweeper runs, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Largest inbound text frame accepted, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Presence aggregation settings.
    #[serde(default)]
    pub presence: PresenceRealtimeConfig,
    /// Subscription lookup cache settings.
    #[serde(default)]
    pub subscription_cache: SubscriptionCacheConfig,
    /// Durable notification write policy.
    #[serde(default)]
    pub notifications: NotificationRealtimeConfig,
}

/// Presence aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRealtimeConfig {
    /// Seconds after a full disconnect during which a reconnect restores the
    /// previous status instead of resetting to `online`. `0` disables it.
    #[serde(default)]
    pub reconnect_grace_seconds: u64,
    /// Keep an explicitly chosen `away`/`busy`/`offline` status across a
    /// full disconnect until the user changes it.
    #[serde(default = "default_true")]
    pub sticky_manual_status: bool,
}

/// Cache in front of the durable subscription store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCacheConfig {
    /// Entry time-to-live in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum entries per cached lookup.
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

/// Durable write policy for missed-delivery notifications and presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRealtimeConfig {
    /// Per-attempt write timeout in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Total attempts per record, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Consecutive durable failures before the store is reported degraded.
    #[serde(default = "default_degraded_after")]
    pub degraded_after_failures: u32,
}

impl RealtimeConfig {
    /// Ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds.max(1))
    }

    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds.max(1))
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_queue_size: default_outbound_queue(),
            ping_interval_seconds: default_ping_interval(),
            idle_timeout_seconds: default_idle_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
            max_message_bytes: default_max_message_bytes(),
            presence: PresenceRealtimeConfig::default(),
            subscription_cache: SubscriptionCacheConfig::default(),
            notifications: NotificationRealtimeConfig::default(),
        }
    }
}

impl Default for PresenceRealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_seconds: 0,
            sticky_manual_status: true,
        }
    }
}

impl Default for SubscriptionCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

impl Default for NotificationRealtimeConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            degraded_after_failures: default_degraded_after(),
        }
    }
}

fn default_outbound_queue() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    25
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_capacity() -> u64 {
    100_000
}

fn default_write_timeout() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    100
}

fn default_degraded_after() -> u32 {
    5
}
