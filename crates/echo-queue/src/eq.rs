// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use echo_types::Event;
use tokio::sync::mpsc;

/// Default per-subscriber buffer size (§4.1: 64–128).
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 128;

/// Multi-subscriber fan-out queue.
///
/// `publish` delivers to every live subscriber non-blockingly: a subscriber
/// whose buffer is full drops the event for that subscriber only, and the
/// drop is counted, never surfaced as an error to the publisher (§7 item 6).
/// Ordering is FIFO per subscriber; there is no cross-subscriber ordering
/// guarantee, matching the contract in §4.1.
pub struct EventQueue {
    subscribers: Mutex<Vec<mpsc::Sender<Event>>>,
    dropped: AtomicU64,
    closed: Mutex<bool>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Vec::new()), dropped: AtomicU64::new(0), closed: Mutex::new(false) }
    }

    /// Returns a receiver that yields events published from this point on.
    /// Returns `None` if the EQ has already been closed.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<Event>> {
        if *self.closed.lock().unwrap() {
            return None;
        }
        let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIBER_BUFFER);
        self.subscribers.lock().unwrap().push(tx);
        Some(rx)
    }

    /// Non-blocking; a full subscriber buffer drops the event for that
    /// subscriber only and increments the drop counter.
    pub fn publish(&self, event: Event) {
        let subs = self.subscribers.lock().unwrap();
        for tx in subs.iter() {
            if tx.try_send(event.clone()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Idempotent: drops every subscriber sender, closing their streams.
    pub fn close(&self) {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            return;
        }
        *closed = true;
        self.subscribers.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::EventPayload;

    fn ev(sub_id: &str) -> Event {
        Event::new(
            echo_types::EventType::TaskStarted,
            sub_id,
            "sess-1",
            EventPayload::TaskStarted {},
        )
    }

    #[tokio::test]
    async fn each_subscriber_receives_events_in_fifo_order() {
        let eq = EventQueue::new();
        let mut a = eq.subscribe().unwrap();
        let mut b = eq.subscribe().unwrap();

        eq.publish(ev("1"));
        eq.publish(ev("2"));

        assert_eq!(a.recv().await.unwrap().submission_id, "1");
        assert_eq!(a.recv().await.unwrap().submission_id, "2");
        assert_eq!(b.recv().await.unwrap().submission_id, "1");
        assert_eq!(b.recv().await.unwrap().submission_id, "2");
    }

    #[tokio::test]
    async fn full_subscriber_buffer_drops_only_for_that_subscriber() {
        let eq = EventQueue::new();
        let slow = eq.subscribe().unwrap();
        drop(slow); // receiver gone, sender now fails -> counts as a drop
        for i in 0..5 {
            eq.publish(ev(&i.to_string()));
        }
        assert!(eq.dropped_count() >= 5);
    }

    #[tokio::test]
    async fn subscribe_after_close_returns_none() {
        let eq = EventQueue::new();
        eq.close();
        assert!(eq.subscribe().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let eq = EventQueue::new();
        eq.close();
        eq.close();
        assert!(eq.subscribe().is_none());
    }
}
