//! Wire model for the gateway protocol.
//!
//! Defines the typed message envelope exchanged with the messaging gateway,
//! the closed set of message-type tags, channel naming, and the derived
//! connection health snapshot.

pub mod channel;
pub mod health;
pub mod message;

pub use channel::{chat_channel, is_valid_channel_name, CHANNEL_NOTIFICATIONS, CHANNEL_USER_UPDATES};
pub use health::HealthSnapshot;
pub use message::{message_type, TypedMessage};
