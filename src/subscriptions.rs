//! Channel subscription bookkeeping.
//!
//! The ledger tracks the set of channels the client wants to be subscribed
//! to. Membership is reconnect-transparent: only an explicit unsubscribe or
//! disconnect removes a channel, and the full live set is replayed to the
//! gateway after every successful (re)connection. Server-side subscription
//! is idempotent per channel, so replay order is arbitrary.

use std::collections::BTreeSet;

/// The live set of channel subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionLedger {
    channels: BTreeSet<String>,
}

impl SubscriptionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel to the live set. Returns `false` if it was already
    /// present.
    pub fn insert(&mut self, channel: &str) -> bool {
        self.channels.insert(channel.to_string())
    }

    /// Remove a channel from the live set. Returns `true` if it was
    /// present.
    pub fn remove(&mut self, channel: &str) -> bool {
        self.channels.remove(channel)
    }

    /// Whether a channel is in the live set.
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// Snapshot of all live channels, for replay after a reconnect.
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    /// Drop every subscription. Called on explicit disconnect only.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// `true` when no channel is subscribed.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut ledger = SubscriptionLedger::new();
        assert!(ledger.insert("chat_42"));
        assert!(!ledger.insert("chat_42")); // already present
        assert!(ledger.contains("chat_42"));
        assert!(ledger.remove("chat_42"));
        assert!(!ledger.remove("chat_42"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn snapshot_holds_all_live_channels() {
        let mut ledger = SubscriptionLedger::new();
        ledger.insert("notifications");
        ledger.insert("chat_42");
        ledger.insert("user-updates");
        ledger.remove("user-updates");

        let channels = ledger.channels();
        assert_eq!(channels.len(), 2);
        assert!(channels.contains(&"notifications".to_string()));
        assert!(channels.contains(&"chat_42".to_string()));
    }

    #[test]
    fn clear_empties_the_ledger() {
        let mut ledger = SubscriptionLedger::new();
        ledger.insert("notifications");
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
