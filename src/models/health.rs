//! Derived connection health snapshot.

use crate::connection::ConnectionState;
use std::time::Duration;

/// A point-in-time view of connection health, recomputed on demand.
///
/// Transient connection trouble is surfaced here (and through the event
/// handlers) instead of as errors from the send paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Open, authenticated, and the heartbeat has seen a pong recently.
    pub healthy: bool,
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Time since the last pong frame, if one has ever been observed.
    pub time_since_last_pong: Option<Duration>,
    /// Reconnect attempts made in the current outage (0 when stable).
    pub reconnect_attempts: u32,
    /// Whether the client currently holds an authenticated session intent
    /// (cleared by `disconnect()` and terminal failures).
    pub is_authenticated: bool,
}
