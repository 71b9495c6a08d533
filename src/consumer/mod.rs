//! Consumer hand-off for snapshots and status events
//!
//! The session calls the consumer synchronously from its own task. A
//! consumer must return quickly: a slow callback stalls ingestion.

use tokio::sync::mpsc;
use tracing::debug;

use crate::orderbook::BookSnapshot;
use crate::session::ConnectionStatus;

/// Receiver of the session's two one-directional channels
pub trait BookConsumer: Send {
    /// One parsed snapshot, in feed-arrival order
    fn on_snapshot(&mut self, snapshot: BookSnapshot);

    /// One status transition
    fn on_status(&mut self, status: ConnectionStatus);
}

/// Event carried across the thread-safe hand-off
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Snapshot(BookSnapshot),
    Status(ConnectionStatus),
}

/// Queues events for another task or thread to drain.
///
/// Snapshots and statuses share one queue so their relative order survives
/// the hand-off.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl ChannelConsumer {
    /// Create a consumer and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: FeedEvent) {
        if let Err(e) = self.tx.send(event) {
            // Receiver gone; nothing left to deliver to
            debug!(event = ?e.0, "Dropping event, consumer closed");
        }
    }
}

impl BookConsumer for ChannelConsumer {
    fn on_snapshot(&mut self, snapshot: BookSnapshot) {
        self.forward(FeedEvent::Snapshot(snapshot));
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        self.forward(FeedEvent::Status(status));
    }
}

/// Adapts a pair of closures into a consumer
pub struct CallbackConsumer<S, T>
where
    S: FnMut(BookSnapshot) + Send,
    T: FnMut(ConnectionStatus) + Send,
{
    on_snapshot: S,
    on_status: T,
}

impl<S, T> CallbackConsumer<S, T>
where
    S: FnMut(BookSnapshot) + Send,
    T: FnMut(ConnectionStatus) + Send,
{
    pub fn new(on_snapshot: S, on_status: T) -> Self {
        Self {
            on_snapshot,
            on_status,
        }
    }
}

impl<S, T> BookConsumer for CallbackConsumer<S, T>
where
    S: FnMut(BookSnapshot) + Send,
    T: FnMut(ConnectionStatus) + Send,
{
    fn on_snapshot(&mut self, snapshot: BookSnapshot) {
        (self.on_snapshot)(snapshot);
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        (self.on_status)(status);
    }
}

impl<C: BookConsumer + ?Sized> BookConsumer for Box<C> {
    fn on_snapshot(&mut self, snapshot: BookSnapshot) {
        (**self).on_snapshot(snapshot);
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        (**self).on_status(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_snapshot;

    const RAW: &str = r#"{"exchange":"okx","symbol":"BTC-USDT-SWAP","timestamp":"2025-05-04T10:39:13Z","asks":[["100","1"]],"bids":[["99","1"]]}"#;

    #[test]
    fn test_channel_preserves_interleaving() {
        let (mut consumer, mut rx) = ChannelConsumer::new();
        consumer.on_status(ConnectionStatus::Connected);
        consumer.on_snapshot(parse_snapshot(RAW).unwrap());
        consumer.on_status(ConnectionStatus::Disconnected("gone".into()));

        assert!(matches!(
            rx.try_recv().unwrap(),
            FeedEvent::Status(ConnectionStatus::Connected)
        ));
        assert!(matches!(rx.try_recv().unwrap(), FeedEvent::Snapshot(_)));
        assert!(matches!(
            rx.try_recv().unwrap(),
            FeedEvent::Status(ConnectionStatus::Disconnected(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_not_fatal() {
        let (mut consumer, rx) = ChannelConsumer::new();
        drop(rx);
        consumer.on_status(ConnectionStatus::Connecting);
    }

    #[test]
    fn test_callback_consumer() {
        let mut symbols = Vec::new();
        let mut statuses = Vec::new();
        {
            let mut consumer = CallbackConsumer::new(
                |snapshot: BookSnapshot| symbols.push(snapshot.symbol().to_string()),
                |status| statuses.push(status),
            );
            consumer.on_snapshot(parse_snapshot(RAW).unwrap());
            consumer.on_status(ConnectionStatus::Connected);
        }
        assert_eq!(symbols, vec!["BTC-USDT-SWAP".to_string()]);
        assert_eq!(statuses, vec![ConnectionStatus::Connected]);
    }
}
