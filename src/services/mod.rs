//! Domain-level wrappers over the gateway connection.
//!
//! Services translate application intents (send a chat message, mark a
//! notification read) into correctly-shaped gateway frames. They hold only
//! a [`GatewaySender`](crate::GatewaySender) and carry no state of their
//! own, so they are cheap to clone and hand out.

pub mod chat;
pub mod notifications;

pub use chat::ChatService;
pub use notifications::NotificationService;
