//! Outbound side of every open connection
//!
//! Each connection owns a bounded queue drained by its socket writer task.
//! Pushing into the queue never waits, so a slow or closing client can only
//! lose its own messages and never stalls a broadcast to everyone else.

use crate::error::DeliveryError;
use log::warn;
use shared::{ClientId, ServerEvent};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

/// Sending half of a connection's outbound queue
pub type OutboundSender = mpsc::Sender<Message>;

/// Delivery statistics for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Encodes an event as a single WebSocket text frame
pub fn encode_message(event: &ServerEvent) -> Result<Message, DeliveryError> {
    Ok(Message::Text(event.to_json()?.into()))
}

/// Pushes a pre-encoded frame into one queue without waiting
pub fn push(id: &ClientId, sender: &OutboundSender, message: Message) -> Result<(), DeliveryError> {
    sender.try_send(message).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::QueueFull(id.clone()),
        TrySendError::Closed(_) => DeliveryError::Closed(id.clone()),
    })
}

/// Open connections indexed by client id
#[derive(Default)]
pub struct ConnectionTable {
    senders: RwLock<HashMap<ClientId, OutboundSender>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ClientId, sender: OutboundSender) {
        self.senders.write().await.insert(id, sender);
    }

    /// Drops the connection's sender, which lets its writer task finish
    pub async fn unregister(&self, id: &ClientId) -> bool {
        self.senders.write().await.remove(id).is_some()
    }

    /// Sends one event to one client
    pub async fn send_to(&self, id: &ClientId, event: &ServerEvent) -> Result<(), DeliveryError> {
        let message = encode_message(event)?;
        let senders = self.senders.read().await;
        let sender = senders
            .get(id)
            .ok_or_else(|| DeliveryError::UnknownClient(id.clone()))?;
        push(id, sender, message)
    }

    /// Sends one event to every open connection
    ///
    /// The event is encoded once. A failed push is logged and counted but
    /// never stops delivery to the remaining connections.
    pub async fn broadcast(&self, event: &ServerEvent) -> Result<BroadcastReport, DeliveryError> {
        let message = encode_message(event)?;
        let senders = self.senders.read().await;
        let mut report = BroadcastReport::default();

        for (id, sender) in senders.iter() {
            match push(id, sender, message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Broadcast to {} failed: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.senders.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(message: Message) -> ServerEvent {
        match message {
            Message::Text(text) => ServerEvent::from_json(text.as_str()).unwrap(),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_to_registered_client() {
        let table = ConnectionTable::new();
        let (tx, mut rx) = mpsc::channel(4);
        table.register(ClientId::new("a"), tx).await;

        table
            .send_to(&ClientId::new("a"), &ServerEvent::Init(ClientId::new("a")))
            .await
            .unwrap();

        assert_eq!(
            decode(rx.try_recv().unwrap()),
            ServerEvent::Init(ClientId::new("a"))
        );
    }

    #[tokio::test]
    async fn test_send_to_unknown_client() {
        let table = ConnectionTable::new();

        let result = table
            .send_to(&ClientId::new("nobody"), &ServerEvent::Rejected("x".into()))
            .await;

        assert!(matches!(result, Err(DeliveryError::UnknownClient(_))));
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failed_recipients() {
        let table = ConnectionTable::new();
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        let (tx_closed, rx_closed) = mpsc::channel(4);
        let (tx_full, mut rx_full) = mpsc::channel(1);
        let (tx_ok2, mut rx_ok2) = mpsc::channel(4);

        drop(rx_closed);
        tx_full.try_send(Message::Text("filler".to_string().into())).unwrap();

        table.register(ClientId::new("ok"), tx_ok).await;
        table.register(ClientId::new("closed"), tx_closed).await;
        table.register(ClientId::new("full"), tx_full).await;
        table.register(ClientId::new("ok2"), tx_ok2).await;

        let event = ServerEvent::Rejected("test".to_string());
        let report = table.broadcast(&event).await.unwrap();

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                failed: 2
            }
        );
        assert_eq!(decode(rx_ok.try_recv().unwrap()), event);
        assert_eq!(decode(rx_ok2.try_recv().unwrap()), event);
        // Only the filler made it into the full queue
        assert!(rx_full.try_recv().is_ok());
        assert!(rx_full.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let table = ConnectionTable::new();
        let (tx, mut rx) = mpsc::channel(4);
        table.register(ClientId::new("a"), tx).await;

        assert!(table.unregister(&ClientId::new("a")).await);
        assert!(!table.unregister(&ClientId::new("a")).await);
        assert!(table.is_empty().await);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_table() {
        let table = ConnectionTable::new();

        let report = table
            .broadcast(&ServerEvent::Rejected("x".to_string()))
            .await
            .unwrap();

        assert_eq!(report, BroadcastReport::default());
        assert_eq!(table.len().await, 0);
    }
}
