//! # amora-link
//!
//! Rust client for Amora's realtime messaging gateway.
//!
//! The client keeps one persistent WebSocket to the gateway and layers the
//! reliability concerns a mobile/web session needs on top of it:
//!
//! - **Authentication**: credentials resolved fresh on every attempt, token
//!   attached to the gateway URL, fail-fast when signed out
//! - **Reconnection**: exponential backoff with a bounded attempt budget;
//!   terminal failures are reported once through the error handler
//! - **Heartbeat**: periodic pings with pong-staleness detection
//! - **Subscriptions**: a reconnect-transparent ledger, replayed to the
//!   gateway after every successful open
//! - **Offline sends**: a bounded FIFO queue with a per-message retry
//!   budget, flushed after the subscription replay
//! - **Dispatch**: per-message-type handlers with panic isolation
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use amora_link::{AmoraLinkClient, EventHandlers};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), amora_link::AmoraLinkError> {
//! let client = AmoraLinkClient::builder()
//!     .base_url("wss://gateway.amora.app")
//!     .credentials("user_7", "access-token")
//!     .event_handlers(EventHandlers::new().on_connect(|| println!("connected")))
//!     .build()?;
//!
//! client.connect().await?;
//!
//! // React to inbound chat messages.
//! client.add_message_handler("chat_message", Arc::new(|data, _msg| {
//!     println!("incoming: {}", data);
//! }));
//!
//! // Join a conversation and say hello.
//! client.chat().subscribe_to_conversation("42").await;
//! client.chat().send_chat_message("42", "hey!").await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod queue;
pub mod services;
pub mod subscriptions;
pub mod transport;

pub use auth::{ArcCredentialProvider, CredentialProvider, Credentials, ResolvedAuth};
pub use client::{AmoraLinkClient, AmoraLinkClientBuilder};
pub use config::{AmoraLinkTimeouts, AmoraLinkTimeoutsBuilder, ConnectionOptions};
pub use connection::{ConnectionState, GatewaySender};
pub use dispatcher::{MessageDispatcher, MessageHandler};
pub use error::{AmoraLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use models::{
    chat_channel, is_valid_channel_name, message_type, HealthSnapshot, TypedMessage,
    CHANNEL_NOTIFICATIONS, CHANNEL_USER_UPDATES,
};
pub use services::{ChatService, NotificationService};
pub use transport::{Transport, TransportConn, TransportEvent, WsTransport};
