//! Bounded, time-ordered buffer for messages that could not be sent.
//!
//! Messages land here when the client is disconnected or a socket write
//! fails. The queue is flushed in FIFO order on every successful open,
//! after subscriptions have been replayed. Each message carries a retry
//! budget; once exhausted it is dropped and logged, never surfaced as an
//! error to the caller.

use crate::models::TypedMessage;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// A queued outbound message with its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    /// The message waiting to be sent.
    pub message: TypedMessage,
    /// Millis since Unix epoch when the message was first queued.
    pub enqueued_at_ms: u64,
    /// Failed send attempts so far.
    pub retry_count: u32,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Bounded FIFO of outbound envelopes with an oldest-drop overflow policy.
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<OutboundEnvelope>,
    capacity: usize,
    max_retries: u32,
}

impl OutboundQueue {
    /// Create a queue with the given capacity and per-message retry budget.
    pub fn new(capacity: usize, max_retries: u32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity,
            max_retries,
        }
    }

    /// Append a message. When the queue is full the oldest entry is
    /// evicted first and a warning logged. A zero-capacity queue holds
    /// nothing: the incoming message is dropped.
    pub fn enqueue(&mut self, message: TypedMessage) {
        if self.capacity == 0 {
            log::warn!(
                "[amora-link] Outbound queue disabled (capacity 0), dropping '{}' message",
                message.message_type
            );
            return;
        }
        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                log::warn!(
                    "[amora-link] Outbound queue full ({}), dropping oldest '{}' message",
                    self.capacity,
                    evicted.message.message_type
                );
            }
        }
        self.entries.push_back(OutboundEnvelope {
            message,
            enqueued_at_ms: now_ms(),
            retry_count: 0,
        });
    }

    /// Take a snapshot of everything queued, clearing the queue first so
    /// messages enqueued during the flush land after the snapshot's
    /// contents and overall FIFO order is preserved.
    pub fn drain(&mut self) -> Vec<OutboundEnvelope> {
        self.entries.drain(..).collect()
    }

    /// Put back an envelope whose send failed, charging one retry. Returns
    /// `false` (and logs) when the retry budget is exhausted and the
    /// message was dropped instead.
    pub fn requeue_failed(&mut self, mut envelope: OutboundEnvelope) -> bool {
        envelope.retry_count += 1;
        if envelope.retry_count >= self.max_retries {
            log::warn!(
                "[amora-link] Dropping '{}' message after {} failed send attempts",
                envelope.message.message_type,
                envelope.retry_count
            );
            return false;
        }
        self.entries.push_back(envelope);
        true
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message_type;
    use serde_json::json;

    fn chat(n: usize) -> TypedMessage {
        TypedMessage::new(message_type::CHAT).with_data(json!({ "seq": n }))
    }

    #[test]
    fn preserves_fifo_order() {
        let mut queue = OutboundQueue::new(100, 3);
        for n in 0..5 {
            queue.enqueue(chat(n));
        }
        let drained = queue.drain();
        let seqs: Vec<u64> = drained
            .iter()
            .map(|e| e.message.data["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut queue = OutboundQueue::new(100, 3);
        for n in 0..101 {
            queue.enqueue(chat(n));
        }
        assert_eq!(queue.len(), 100);
        let drained = queue.drain();
        assert_eq!(drained.first().unwrap().message.data["seq"], 1);
        assert_eq!(drained.last().unwrap().message.data["seq"], 100);
    }

    #[test]
    fn zero_capacity_queue_never_holds_a_message() {
        let mut queue = OutboundQueue::new(0, 3);
        queue.enqueue(chat(0));
        queue.enqueue(chat(1));
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn retry_budget_allows_exactly_max_retries_attempts() {
        let mut queue = OutboundQueue::new(10, 3);
        queue.enqueue(chat(0));

        // Attempt 1 fails
        let env = queue.drain().into_iter().next().unwrap();
        assert!(queue.requeue_failed(env));
        // Attempt 2 fails
        let env = queue.drain().into_iter().next().unwrap();
        assert_eq!(env.retry_count, 1);
        assert!(queue.requeue_failed(env));
        // Attempt 3 fails: budget exhausted, dropped
        let env = queue.drain().into_iter().next().unwrap();
        assert_eq!(env.retry_count, 2);
        assert!(!queue.requeue_failed(env));
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_during_flush_lands_after_snapshot() {
        let mut queue = OutboundQueue::new(10, 3);
        queue.enqueue(chat(0));
        queue.enqueue(chat(1));

        let snapshot = queue.drain();
        assert_eq!(snapshot.len(), 2);
        // A message arriving mid-flush is appended to the now-empty queue.
        queue.enqueue(chat(2));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain()[0].message.data["seq"], 2);
    }
}
