//! Connection and timeout configuration for the gateway client.
//!
//! All knobs carry sane defaults and are overridable through `with_*`
//! setters or the timeout builder.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection-level options for the gateway WebSocket client.
///
/// These control reconnection behavior and the bounded outbound queue.
/// Separate from [`AmoraLinkTimeouts`], which control time limits.
///
/// # Example
///
/// ```rust
/// use amora_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(2000)
///     .with_max_reconnect_attempts(10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Reconnect automatically after a non-normal close.
    /// Default: true.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Base delay in milliseconds between reconnection attempts.
    /// Attempt `n` waits `reconnect_delay_ms * 2^(n-1)`.
    /// Default: 1000ms.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Ceiling for the exponential backoff delay.
    /// Default: 30000ms.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Number of reconnection attempts before giving up. After exhaustion
    /// the client stays closed until an explicit `connect()`.
    /// Default: 5.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Capacity of the outbound message queue. Inserting beyond capacity
    /// evicts the oldest queued message.
    /// Default: 100.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// How many times a queued message may fail to send before it is
    /// dropped. Default: 3.
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: u32,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_outbound_queue_capacity() -> usize {
    100
}

fn default_max_send_retries() -> u32 {
    3
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            max_reconnect_attempts: 5,
            outbound_queue_capacity: 100,
            max_send_retries: 3,
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect after a non-normal close.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the base delay between reconnection attempts (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum backoff delay (in milliseconds).
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the number of reconnection attempts before giving up.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the outbound queue capacity.
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    /// Set the per-message send retry budget.
    pub fn with_max_send_retries(mut self, retries: u32) -> Self {
        self.max_send_retries = retries;
        self
    }

    /// Backoff delay for a given attempt (1-based), doubling from the base
    /// and capped at `max_reconnect_delay_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self
            .reconnect_delay_ms
            .saturating_mul(2u64.saturating_pow(exp))
            .min(self.max_reconnect_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Timeout configuration for gateway client operations.
///
/// # Examples
///
/// ```rust
/// use amora_link::AmoraLinkTimeouts;
/// use std::time::Duration;
///
/// // Defaults (recommended)
/// let timeouts = AmoraLinkTimeouts::default();
///
/// // Custom connection deadline for slow networks
/// let timeouts = AmoraLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(30))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct AmoraLinkTimeouts {
    /// Deadline for establishing a connection (handshake included).
    /// Default: 10 seconds.
    pub connection_timeout: Duration,

    /// Interval between heartbeat ping frames while the connection is open.
    /// Set to 0 to disable the heartbeat.
    /// Default: 30 seconds.
    pub heartbeat_interval: Duration,

    /// The connection is considered dead when no pong has been observed for
    /// this long, and is torn down / reconnected.
    /// Default: 90 seconds.
    pub pong_timeout: Duration,
}

impl Default for AmoraLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(90),
        }
    }
}

impl AmoraLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> AmoraLinkTimeoutsBuilder {
        AmoraLinkTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(15),
        }
    }
}

/// Builder for custom [`AmoraLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct AmoraLinkTimeoutsBuilder {
    timeouts: AmoraLinkTimeouts,
}

impl AmoraLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: AmoraLinkTimeouts::default(),
        }
    }

    /// Set the connection-establishment deadline.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the heartbeat ping interval. Zero disables the heartbeat.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.timeouts.heartbeat_interval = interval;
        self
    }

    /// Set the pong staleness window.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> AmoraLinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ConnectionOptions::default();
        assert!(options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 1000);
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.outbound_queue_capacity, 100);
        assert_eq!(options.max_send_retries, 3);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let options = ConnectionOptions::default();
        assert_eq!(options.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(options.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(options.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(options.backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(options.backoff_delay(5), Duration::from_millis(16000));
    }

    #[test]
    fn backoff_is_capped() {
        let options = ConnectionOptions::default().with_max_reconnect_delay_ms(3000);
        assert_eq!(options.backoff_delay(3), Duration::from_millis(3000));
        assert_eq!(options.backoff_delay(30), Duration::from_millis(3000));
    }

    #[test]
    fn default_timeouts() {
        let timeouts = AmoraLinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(timeouts.pong_timeout, Duration::from_secs(90));
    }

    #[test]
    fn timeout_builder() {
        let timeouts = AmoraLinkTimeouts::builder()
            .connection_timeout(Duration::from_secs(60))
            .heartbeat_interval(Duration::from_secs(10))
            .pong_timeout(Duration::from_secs(45))
            .build();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(timeouts.pong_timeout, Duration::from_secs(45));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ConnectionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_reconnect_attempts, 5);
        assert!(options.auto_reconnect);
    }
}
