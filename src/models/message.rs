//! The typed message envelope exchanged with the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message-type tags understood by the gateway.
///
/// Client→server and server→client tags are disjoint namespaces by
/// convention; the dispatcher keys handler registrations on these strings.
pub mod message_type {
    // Client to server
    pub const CHAT: &str = "chat";
    pub const NOTIFICATION: &str = "notification";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const PING: &str = "ping";

    // Server to client
    pub const CHAT_MESSAGE: &str = "chat_message";
    pub const CHAT_ACK: &str = "chat_ack";
    pub const NOTIFICATION_READ: &str = "notification_marked_read";
    pub const ALL_NOTIFICATIONS_READ: &str = "all_notifications_marked_read";
    pub const SUBSCRIPTION_ACK: &str = "subscription_ack";
    pub const UNSUBSCRIPTION_ACK: &str = "unsubscription_ack";
    pub const PONG: &str = "pong";
    pub const CONNECTION_ACK: &str = "connection_ack";
    pub const ERROR: &str = "error";
}

/// A single gateway message, in either direction.
///
/// Immutable value: built once by a domain service or caller, then consumed
/// by the transport (outbound) or the dispatcher (inbound). `data` is an
/// opaque payload; the optional fields carry routing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedMessage {
    /// Message-type tag; one of the [`message_type`] constants.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Opaque payload. Subscribe/unsubscribe frames carry the channel name
    /// here as a bare string.
    #[serde(default)]
    pub data: Value,

    /// Target user, when routed point-to-point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Sending user, filled in by the gateway on server→client messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Conversation this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Message a reaction refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Reaction emoji.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl TypedMessage {
    /// Create a message with an empty object payload.
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            data: Value::Object(serde_json::Map::new()),
            to: None,
            from: None,
            conversation_id: None,
            message_id: None,
            emoji: None,
        }
    }

    /// Set the payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set the conversation routing field.
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Set the message-id routing field.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Set the emoji routing field.
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    /// A `{"type":"ping","data":{}}` heartbeat frame.
    pub fn ping() -> Self {
        Self::new(message_type::PING)
    }

    /// A subscribe frame for a channel. The gateway expects the channel
    /// name as a bare string in `data`.
    pub fn subscribe(channel: &str) -> Self {
        Self::new(message_type::SUBSCRIBE).with_data(Value::String(channel.to_string()))
    }

    /// An unsubscribe frame for a channel.
    pub fn unsubscribe(channel: &str) -> Self {
        Self::new(message_type::UNSUBSCRIBE).with_data(Value::String(channel.to_string()))
    }

    /// Parse an inbound frame.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Encode for the wire.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_frame_carries_channel_as_bare_string() {
        let frame = TypedMessage::subscribe("chat_42").encode().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["data"], "chat_42");
    }

    #[test]
    fn optional_routing_fields_are_omitted() {
        let frame = TypedMessage::ping().encode().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("to"));
        assert!(!obj.contains_key("conversation_id"));
        assert!(!obj.contains_key("emoji"));
    }

    #[test]
    fn parses_server_message_with_routing_fields() {
        let raw = json!({
            "type": "chat_message",
            "data": {"conversation_id": "42", "message": "hey", "from_user": "user_7"},
            "from": "user_7",
            "conversation_id": "42"
        })
        .to_string();

        let msg = TypedMessage::parse(&raw).unwrap();
        assert_eq!(msg.message_type, message_type::CHAT_MESSAGE);
        assert_eq!(msg.from.as_deref(), Some("user_7"));
        assert_eq!(msg.conversation_id.as_deref(), Some("42"));
        assert_eq!(msg.data["message"], "hey");
    }

    #[test]
    fn parse_rejects_malformed_frames() {
        assert!(TypedMessage::parse("not json").is_err());
        assert!(TypedMessage::parse("{\"data\": {}}").is_err()); // missing type
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let msg = TypedMessage::parse("{\"type\":\"pong\"}").unwrap();
        assert_eq!(msg.message_type, message_type::PONG);
        assert!(msg.data.is_null());
    }
}
