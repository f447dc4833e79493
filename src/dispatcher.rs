//! Typed message dispatch to registered subscribers.
//!
//! The dispatcher maps a message-type tag to an ordered list of handler
//! callbacks. Delivery is synchronous, in registration order, and each
//! handler is isolated: one panicking subscriber cannot prevent delivery
//! to the rest or destabilize the connection.
//!
//! Registrations never expire on their own; callers remove handlers by
//! identity (the same `Arc` they registered) to avoid leaks.

use crate::models::TypedMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// A subscriber callback, invoked with `(payload, whole message)`.
pub type MessageHandler = Arc<dyn Fn(&Value, &TypedMessage) + Send + Sync>;

/// Registry of message handlers keyed by message-type tag.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: RwLock<HashMap<String, Vec<MessageHandler>>>,
}

impl MessageDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a message type. Duplicate registrations are
    /// allowed and each copy is invoked, matching listener-list semantics.
    pub fn add_handler(&self, message_type: &str, handler: MessageHandler) {
        let mut handlers = self.handlers.write().unwrap();
        handlers
            .entry(message_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove a handler by identity. Only the exact `Arc` that was
    /// registered matches; one call removes one registration.
    pub fn remove_handler(&self, message_type: &str, handler: &MessageHandler) {
        let mut handlers = self.handlers.write().unwrap();
        if let Some(list) = handlers.get_mut(message_type) {
            if let Some(pos) = list.iter().position(|h| Arc::ptr_eq(h, handler)) {
                list.remove(pos);
            }
            if list.is_empty() {
                handlers.remove(message_type);
            }
        }
    }

    /// Drop all registrations. Used on logout/disconnect so stale handlers
    /// cannot fire after a principal change.
    pub fn clear(&self) {
        self.handlers.write().unwrap().clear();
    }

    /// Deliver a message to every handler registered for its type, in
    /// registration order. A panicking handler is logged and skipped.
    pub fn distribute(&self, message: &TypedMessage) {
        let snapshot: Vec<MessageHandler> = {
            let handlers = self.handlers.read().unwrap();
            match handlers.get(&message.message_type) {
                Some(list) => list.clone(),
                None => {
                    log::debug!(
                        "[amora-link] No handlers registered for '{}'",
                        message.message_type
                    );
                    return;
                },
            }
        };

        for handler in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&message.data, message)));
            if result.is_err() {
                log::warn!(
                    "[amora-link] Handler for '{}' panicked; continuing delivery",
                    message.message_type
                );
            }
        }
    }

    /// Number of handlers registered for a type.
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap()
            .get(message_type)
            .map_or(0, |list| list.len())
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap();
        f.debug_struct("MessageDispatcher")
            .field("types", &handlers.len())
            .field(
                "registrations",
                &handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message_type;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting_handler(counter: Arc<AtomicUsize>) -> MessageHandler {
        Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn delivers_to_all_handlers_in_registration_order() {
        let dispatcher = MessageDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            dispatcher.add_handler(
                message_type::CHAT_MESSAGE,
                Arc::new(move |_, _| order.lock().unwrap().push(tag)),
            );
        }

        dispatcher.distribute(&TypedMessage::new(message_type::CHAT_MESSAGE));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let dispatcher = MessageDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));

        dispatcher.add_handler(
            message_type::CHAT_MESSAGE,
            Arc::new(|_, _| panic!("subscriber bug")),
        );
        dispatcher.add_handler(message_type::CHAT_MESSAGE, counting_handler(counter.clone()));

        dispatcher.distribute(&TypedMessage::new(message_type::CHAT_MESSAGE));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_is_by_identity() {
        let dispatcher = MessageDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let kept = counting_handler(counter.clone());
        let removed = counting_handler(counter.clone());
        dispatcher.add_handler(message_type::CHAT_ACK, kept.clone());
        dispatcher.add_handler(message_type::CHAT_ACK, removed.clone());

        dispatcher.remove_handler(message_type::CHAT_ACK, &removed);
        assert_eq!(dispatcher.handler_count(message_type::CHAT_ACK), 1);

        dispatcher.distribute(&TypedMessage::new(message_type::CHAT_ACK));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_registrations_each_fire() {
        let dispatcher = MessageDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(counter.clone());

        dispatcher.add_handler(message_type::CONNECTION_ACK, handler.clone());
        dispatcher.add_handler(message_type::CONNECTION_ACK, handler.clone());
        dispatcher.distribute(&TypedMessage::new(message_type::CONNECTION_ACK));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // Removing once leaves the other copy registered.
        dispatcher.remove_handler(message_type::CONNECTION_ACK, &handler);
        assert_eq!(dispatcher.handler_count(message_type::CONNECTION_ACK), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let dispatcher = MessageDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.add_handler(message_type::CHAT_MESSAGE, counting_handler(counter.clone()));
        dispatcher.add_handler(message_type::ERROR, counting_handler(counter.clone()));

        dispatcher.clear();
        dispatcher.distribute(&TypedMessage::new(message_type::CHAT_MESSAGE));
        dispatcher.distribute(&TypedMessage::new(message_type::ERROR));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_type_is_a_no_op() {
        let dispatcher = MessageDispatcher::new();
        dispatcher.distribute(&TypedMessage::new("unmapped_type"));
    }
}
