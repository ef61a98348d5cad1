//! Collaborator traits consumed by the chat core.
//!
//! The core does not own group membership, message persistence or group
//! activity tracking; it consumes them through these interfaces. Concrete
//! implementations live in the infrastructure layer (dependency inversion),
//! which also lets the use cases be tested against mocks.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{ChatError, ChatMessage, ConnectionId, GroupId, MessageId, Role, UserId};

/// Channel used to push serialized events to a single connection.
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Authenticated identity resolved from a handshake token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

/// Verifies a handshake token. Used once per connection attempt, before the
/// WebSocket upgrade.
#[cfg_attr(test, mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, super::AuthError>;
}

/// Group membership lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Return the role `user_id` holds in `group_id`, or `None` if the user
    /// is not a member.
    async fn member_role(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Option<Role>, ChatError>;
}

/// Durable message storage, strongly consistent per group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a new message to the group's history.
    async fn append(&self, message: ChatMessage) -> Result<(), ChatError>;

    /// Look up a single message by id within a group's history.
    async fn find(
        &self,
        group_id: &GroupId,
        message_id: &MessageId,
    ) -> Result<Option<ChatMessage>, ChatError>;

    /// Replace the stored message with the mutated copy. The mutation is
    /// always scoped to a single message id.
    async fn update(&self, message: ChatMessage) -> Result<(), ChatError>;
}

/// Best-effort "group was active" signal. Failures are logged, never
/// propagated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupActivity: Send + Sync {
    async fn touch(&self, group_id: &GroupId);
}

/// Errors from the message pusher.
#[derive(Debug, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Delivers serialized events to live connections.
///
/// Broadcast tolerates dead channels: a connection that disappeared between
/// target selection and delivery is skipped with a log entry, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    async fn register(&self, connection_id: ConnectionId, sender: PusherChannel);

    async fn unregister(&self, connection_id: &ConnectionId);

    /// Point-to-point delivery to a single connection.
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// Fan-out to a set of connections. Partial failure is tolerated.
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str);
}
