//! Channel naming for gateway subscriptions.

/// Per-user notification feed.
pub const CHANNEL_NOTIFICATIONS: &str = "notifications";

/// Profile and presence updates.
pub const CHANNEL_USER_UPDATES: &str = "user-updates";

/// Channel name for a chat conversation.
pub fn chat_channel(conversation_id: &str) -> String {
    format!("chat_{}", conversation_id)
}

/// Validate a channel name the way the gateway does: 1..=50 characters,
/// alphanumeric plus underscore and hyphen.
pub fn is_valid_channel_name(channel: &str) -> bool {
    if channel.is_empty() || channel.len() > 50 {
        return false;
    }
    channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_channel_format() {
        assert_eq!(chat_channel("42"), "chat_42");
    }

    #[test]
    fn channel_name_validation() {
        assert!(is_valid_channel_name("notifications"));
        assert!(is_valid_channel_name("chat_42"));
        assert!(is_valid_channel_name("user-updates"));
        assert!(!is_valid_channel_name(""));
        assert!(!is_valid_channel_name("chat 42"));
        assert!(!is_valid_channel_name(&"x".repeat(51)));
    }
}
