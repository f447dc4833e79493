//! High-level gateway client facade.

use crate::{
    auth::{ArcCredentialProvider, Credentials, ResolvedAuth},
    config::{AmoraLinkTimeouts, ConnectionOptions},
    connection::{Connection, ConnectionState, GatewaySender},
    dispatcher::{MessageDispatcher, MessageHandler},
    error::{AmoraLinkError, Result},
    event_handlers::EventHandlers,
    models::{HealthSnapshot, TypedMessage, CHANNEL_USER_UPDATES},
    services::{ChatService, NotificationService},
    transport::{Transport, WsTransport},
};
use std::sync::Arc;

/// Client for Amora's realtime gateway.
///
/// One client owns one logical connection: a background task that
/// authenticates, reconnects with backoff, heartbeats, replays channel
/// subscriptions after every reconnect, and flushes messages queued while
/// offline. Everything here is a thin handle over that task, so the client
/// is cheap to share behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use amora_link::AmoraLinkClient;
///
/// # async fn run() -> Result<(), amora_link::AmoraLinkError> {
/// let client = AmoraLinkClient::builder()
///     .base_url("wss://gateway.amora.app")
///     .credentials("user_7", "access-token")
///     .build()?;
///
/// client.connect().await?;
/// client.add_message_handler("chat_message", std::sync::Arc::new(|data, _msg| {
///     println!("chat: {}", data);
/// }));
/// client.chat().send_chat_message("42", "hey!").await;
/// # Ok(())
/// # }
/// ```
pub struct AmoraLinkClient {
    connection: Connection,
    sender: GatewaySender,
    dispatcher: Arc<MessageDispatcher>,
    chat: ChatService,
    notifications: NotificationService,
}

impl AmoraLinkClient {
    /// Start building a client.
    pub fn builder() -> AmoraLinkClientBuilder {
        AmoraLinkClientBuilder::new()
    }

    /// Establish the gateway connection.
    ///
    /// Resolves credentials, opens the socket within the configured
    /// deadline, replays any subscriptions, and flushes queued messages.
    /// No-op when already open or connecting. Fails fast with an
    /// authentication error when no complete credentials are available.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Tear the connection down intentionally.
    ///
    /// Clears all channel subscriptions, then all message handlers, then
    /// closes the socket with a normal close code. Suppresses any pending
    /// reconnect. Idempotent. Messages already queued are kept and flushed
    /// if the client later reconnects.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Whether the connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Current lifecycle state of the connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Point-in-time health snapshot: liveness, time since the last pong,
    /// and reconnect bookkeeping.
    pub fn connection_health(&self) -> HealthSnapshot {
        self.connection.health()
    }

    /// Send a pre-built message. Returns `true` when sent immediately;
    /// `false` when it was queued for the next successful (re)connect.
    pub async fn send_message(&self, message: TypedMessage) -> bool {
        self.sender.send_message(message).await
    }

    /// Send a heartbeat ping out of band. A ping is only meaningful on a
    /// live connection, so when not connected this returns `false` without
    /// queueing anything.
    pub async fn ping(&self) -> bool {
        self.sender.send_transient(TypedMessage::ping()).await
    }

    /// Subscribe to a channel. The subscription survives reconnects until
    /// explicitly removed or the client disconnects.
    pub async fn subscribe(&self, channel: &str) -> bool {
        self.sender.subscribe(channel).await
    }

    /// Unsubscribe from a channel.
    pub async fn unsubscribe(&self, channel: &str) -> bool {
        self.sender.unsubscribe(channel).await
    }

    /// Subscribe to the current user's profile/match update channel.
    pub async fn subscribe_to_user_updates(&self) -> bool {
        self.sender.subscribe(CHANNEL_USER_UPDATES).await
    }

    /// Register a handler for a message type. Duplicates are allowed;
    /// handlers fire in registration order.
    pub fn add_message_handler(&self, message_type: &str, handler: MessageHandler) {
        self.dispatcher.add_handler(message_type, handler);
    }

    /// Remove a previously registered handler. Matching is by identity:
    /// pass the same `Arc` that was registered.
    pub fn remove_message_handler(&self, message_type: &str, handler: &MessageHandler) {
        self.dispatcher.remove_handler(message_type, handler);
    }

    /// Drop every registered message handler.
    pub fn clear_message_handlers(&self) {
        self.dispatcher.clear();
    }

    /// Chat messaging operations.
    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    /// Notification read-state operations.
    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Shorthand for [`ChatService::send_chat_message`].
    pub async fn send_chat_message(&self, conversation_id: &str, message: &str) -> bool {
        self.chat.send_chat_message(conversation_id, message).await
    }

    /// Shorthand for [`ChatService::add_reaction`].
    pub async fn add_reaction(&self, message_id: &str, emoji: &str) -> bool {
        self.chat.add_reaction(message_id, emoji).await
    }

    /// Shorthand for [`ChatService::remove_reaction`].
    pub async fn remove_reaction(&self, message_id: &str, emoji: &str) -> bool {
        self.chat.remove_reaction(message_id, emoji).await
    }

    /// Shorthand for [`ChatService::subscribe_to_conversation`].
    pub async fn subscribe_to_chat_conversation(&self, conversation_id: &str) -> bool {
        self.chat.subscribe_to_conversation(conversation_id).await
    }

    /// Shorthand for [`NotificationService::mark_notification_as_read`].
    pub async fn mark_notification_as_read(&self, notification_id: &str) -> bool {
        self.notifications
            .mark_notification_as_read(notification_id)
            .await
    }

    /// Shorthand for [`NotificationService::mark_all_notifications_as_read`].
    pub async fn mark_all_notifications_as_read(&self) -> bool {
        self.notifications.mark_all_notifications_as_read().await
    }

    /// Shorthand for [`NotificationService::subscribe_to_notifications`].
    pub async fn subscribe_to_notifications(&self) -> bool {
        self.notifications.subscribe_to_notifications().await
    }

    /// A cheap-to-clone sender for code that only needs to emit messages.
    pub fn sender(&self) -> GatewaySender {
        self.sender.clone()
    }
}

impl std::fmt::Debug for AmoraLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmoraLinkClient")
            .field("state", &self.connection_state())
            .finish()
    }
}

/// Builder for [`AmoraLinkClient`].
///
/// `base_url` is required; everything else has production defaults.
/// `build()` spawns the background connection task and therefore must be
/// called within a tokio runtime.
#[derive(Default)]
pub struct AmoraLinkClientBuilder {
    base_url: Option<String>,
    auth: Option<ResolvedAuth>,
    options: ConnectionOptions,
    timeouts: AmoraLinkTimeouts,
    event_handlers: EventHandlers,
    transport: Option<Arc<dyn Transport>>,
}

impl AmoraLinkClientBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway base URL (`http(s)` or `ws(s)`); the path is replaced with
    /// `/ws` and the token attached per attempt.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use fixed credentials.
    pub fn credentials(mut self, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth = Some(ResolvedAuth::Static(Some(Credentials::new(
            user_id, token,
        ))));
        self
    }

    /// Use a dynamic credential provider, consulted fresh on every
    /// connection attempt so refreshed tokens are picked up.
    pub fn auth_provider(mut self, provider: ArcCredentialProvider) -> Self {
        self.auth = Some(ResolvedAuth::Dynamic(provider));
        self
    }

    /// Override reconnect and queueing behavior.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the timeout profile.
    pub fn timeouts(mut self, timeouts: AmoraLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Register connection lifecycle callbacks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Swap the transport implementation. Intended for tests.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client and spawn its connection task.
    pub fn build(self) -> Result<AmoraLinkClient> {
        let base_url = self.base_url.ok_or_else(|| {
            AmoraLinkError::ConfigurationError("base_url is required".to_string())
        })?;
        if base_url.trim().is_empty() {
            return Err(AmoraLinkError::ConfigurationError(
                "base_url must not be empty".to_string(),
            ));
        }
        if self.options.outbound_queue_capacity == 0 {
            return Err(AmoraLinkError::ConfigurationError(
                "outbound_queue_capacity must be at least 1".to_string(),
            ));
        }

        let auth = self.auth.unwrap_or_default();
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));
        let dispatcher = Arc::new(MessageDispatcher::new());

        let connection = Connection::spawn(
            base_url,
            auth,
            self.options,
            self.timeouts,
            transport,
            dispatcher.clone(),
            self.event_handlers,
        );
        let sender = connection.sender();

        Ok(AmoraLinkClient {
            chat: ChatService::new(sender.clone()),
            notifications: NotificationService::new(sender.clone()),
            connection,
            sender,
            dispatcher,
        })
    }
}

impl std::fmt::Debug for AmoraLinkClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmoraLinkClientBuilder")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_base_url() {
        let result = AmoraLinkClientBuilder::new().build();
        assert!(matches!(
            result,
            Err(AmoraLinkError::ConfigurationError(_))
        ));
    }

    #[test]
    fn build_rejects_a_zero_capacity_queue() {
        let result = AmoraLinkClientBuilder::new()
            .base_url("wss://gateway.amora.app")
            .options(ConnectionOptions::default().with_outbound_queue_capacity(0))
            .build();
        assert!(matches!(
            result,
            Err(AmoraLinkError::ConfigurationError(_))
        ));
    }
}
