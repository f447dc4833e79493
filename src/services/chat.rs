//! Chat messaging over the gateway.

use crate::connection::GatewaySender;
use crate::models::{chat_channel, message_type, TypedMessage};
use serde_json::json;

/// Sends chat messages and reactions, and manages per-conversation
/// subscriptions.
#[derive(Debug, Clone)]
pub struct ChatService {
    sender: GatewaySender,
}

impl ChatService {
    pub(crate) fn new(sender: GatewaySender) -> Self {
        Self { sender }
    }

    /// Send a chat message to a conversation.
    ///
    /// Returns `true` when the frame was sent immediately; `false` when it
    /// was queued for delivery after the next successful (re)connect.
    pub async fn send_chat_message(&self, conversation_id: &str, message: &str) -> bool {
        let frame = TypedMessage::new(message_type::CHAT)
            .with_data(json!({
                "conversation_id": conversation_id,
                "message": message,
            }))
            .with_conversation_id(conversation_id);
        self.sender.send_message(frame).await
    }

    /// React to a message with an emoji. The gateway resolves the
    /// conversation from the message id.
    pub async fn add_reaction(&self, message_id: &str, emoji: &str) -> bool {
        self.send_reaction("add_reaction", message_id, emoji).await
    }

    /// Retract a previously added reaction.
    pub async fn remove_reaction(&self, message_id: &str, emoji: &str) -> bool {
        self.send_reaction("remove_reaction", message_id, emoji).await
    }

    async fn send_reaction(&self, action: &str, message_id: &str, emoji: &str) -> bool {
        let frame = TypedMessage::new(message_type::CHAT)
            .with_data(json!({
                "action": action,
                "message_id": message_id,
                "emoji": emoji,
            }))
            .with_message_id(message_id)
            .with_emoji(emoji);
        self.sender.send_message(frame).await
    }

    /// Subscribe to a conversation's live channel (`chat_<id>`). The
    /// subscription survives reconnects until explicitly removed.
    pub async fn subscribe_to_conversation(&self, conversation_id: &str) -> bool {
        self.sender.subscribe(&chat_channel(conversation_id)).await
    }

    /// Leave a conversation's live channel.
    pub async fn unsubscribe_from_conversation(&self, conversation_id: &str) -> bool {
        self.sender
            .unsubscribe(&chat_channel(conversation_id))
            .await
    }
}
