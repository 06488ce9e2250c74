//! Delivery of replies and events to the caller.
//!
//! The bridge never talks to the transport directly. Every reply and event is
//! pushed into an [`Outbox`]; the embedding layer drains the paired receiver
//! and forwards each [`Delivery`] to the caller's channel.

use did_bridge_core::Delivery;
use tokio::sync::mpsc;
use tracing::warn;

/// Sending half of the delivery queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Receiving half of the delivery queue.
pub type Inbox = mpsc::UnboundedReceiver<Delivery>;

impl Outbox {
    /// Creates a connected outbox and inbox.
    #[must_use]
    pub fn new() -> (Self, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a delivery.
    ///
    /// Returns `false` if the receiving side is gone; the delivery is dropped.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        let channel = delivery.channel;
        if self.tx.send(delivery).is_err() {
            warn!(channel = channel.0, "Delivery dropped, receiver closed");
            return false;
        }
        true
    }

    /// Whether the receiving side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use did_bridge_core::{ChannelId, Reply};
    use serde_json::json;

    #[tokio::test]
    async fn test_deliveries_arrive_in_order() {
        let (outbox, mut inbox) = Outbox::new();
        assert!(outbox.deliver(Delivery::terminal(ChannelId(1), Reply::Ok(json!(1)))));
        assert!(outbox.deliver(Delivery::event(ChannelId(2), json!("event"))));

        assert_eq!(inbox.recv().await.unwrap().channel, ChannelId(1));
        let event = inbox.recv().await.unwrap();
        assert!(event.keep_open);
    }

    #[test]
    fn test_closed_inbox_drops_deliveries() {
        let (outbox, inbox) = Outbox::new();
        drop(inbox);
        assert!(outbox.is_closed());
        assert!(!outbox.deliver(Delivery::terminal(ChannelId(1), Reply::Ok(json!(null)))));
    }
}
