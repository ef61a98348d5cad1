//! WebSocket-backed MessagePusher implementation.
//!
//! WebSocket creation happens in the UI layer; this implementation receives
//! the per-connection `UnboundedSender` halves and uses them for delivery.
//! Delivery to a connection that died between target selection and send is
//! tolerated as a logged no-op (the disconnect sweep bounds how long such a
//! handle can linger).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};

/// Delivers serialized events over per-connection mpsc channels.
#[derive(Default)]
pub struct WebSocketMessagePusher {
    connections: Arc<Mutex<HashMap<ConnectionId, PusherChannel>>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut connections = self.connections.lock().await;
        connections.insert(connection_id, sender);
        tracing::debug!("Connection '{}' registered to pusher", connection_id);
    }

    async fn unregister(&self, connection_id: &ConnectionId) {
        let mut connections = self.connections.lock().await;
        connections.remove(connection_id);
        tracing::debug!("Connection '{}' unregistered from pusher", connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let connections = self.connections.lock().await;
        let sender = connections
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed event to connection '{}'", connection_id);
        Ok(())
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) {
        let connections = self.connections.lock().await;
        for target in targets {
            match connections.get(&target) {
                Some(sender) => {
                    // Partial failure is tolerated during fan-out.
                    if let Err(e) = sender.send(content.to_string()) {
                        tracing::warn!("Failed to push event to connection '{}': {}", target, e);
                    }
                }
                None => {
                    tracing::warn!("Connection '{}' not found during broadcast, skipping", target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_push_to_registered_connection() {
        // given:
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::generate();
        pusher.register(conn, tx).await;

        // when:
        let result = pusher.push_to(&conn, "hello").await;

        // then:
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_unknown_connection_errors() {
        // given:
        let pusher = WebSocketMessagePusher::new();

        // when:
        let result = pusher.push_to(&ConnectionId::generate(), "hello").await;

        // then:
        assert!(matches!(
            result,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_targets() {
        // given:
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let conn_a = ConnectionId::generate();
        let conn_b = ConnectionId::generate();
        pusher.register(conn_a, tx1).await;
        pusher.register(conn_b, tx2).await;

        // when:
        pusher.broadcast(vec![conn_a, conn_b], "event").await;

        // then:
        assert_eq!(rx1.recv().await, Some("event".to_string()));
        assert_eq!(rx2.recv().await, Some("event".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_dead_target() {
        // given: one live connection, one unknown handle in the target list
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let live = ConnectionId::generate();
        pusher.register(live, tx).await;

        // when:
        pusher
            .broadcast(vec![ConnectionId::generate(), live], "event")
            .await;

        // then: delivery to the live target still happened
        assert_eq!(rx.recv().await, Some("event".to_string()));
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        // given:
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::generate();
        pusher.register(conn, tx).await;

        // when:
        pusher.unregister(&conn).await;
        let result = pusher.push_to(&conn, "hello").await;

        // then:
        assert!(result.is_err());
    }
}
