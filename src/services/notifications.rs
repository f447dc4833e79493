//! Notification read-state updates over the gateway.

use crate::connection::GatewaySender;
use crate::models::{message_type, TypedMessage, CHANNEL_NOTIFICATIONS};
use serde_json::json;

/// Marks notifications read and manages the notifications subscription.
#[derive(Debug, Clone)]
pub struct NotificationService {
    sender: GatewaySender,
}

impl NotificationService {
    pub(crate) fn new(sender: GatewaySender) -> Self {
        Self { sender }
    }

    /// Mark a single notification as read.
    ///
    /// Returns `true` when the frame was sent immediately; `false` when it
    /// was queued for delivery after the next successful (re)connect.
    pub async fn mark_notification_as_read(&self, notification_id: &str) -> bool {
        let frame = TypedMessage::new(message_type::NOTIFICATION).with_data(json!({
            "action": "mark_read",
            "notification_id": notification_id,
        }));
        self.sender.send_message(frame).await
    }

    /// Mark every notification as read.
    pub async fn mark_all_notifications_as_read(&self) -> bool {
        let frame = TypedMessage::new(message_type::NOTIFICATION).with_data(json!({
            "action": "mark_all_read",
        }));
        self.sender.send_message(frame).await
    }

    /// Subscribe to the notifications channel.
    pub async fn subscribe_to_notifications(&self) -> bool {
        self.sender.subscribe(CHANNEL_NOTIFICATIONS).await
    }

    /// Leave the notifications channel.
    pub async fn unsubscribe_from_notifications(&self) -> bool {
        self.sender.unsubscribe(CHANNEL_NOTIFICATIONS).await
    }
}
