//! Presence registry: user identity <-> connection handle.
//!
//! One active connection per user: re-connecting replaces the prior mapping
//! (last writer wins) and the displaced handle is returned so the caller can
//! sweep it out of every room. A user is online iff an entry exists here.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::{ConnectionId, Timestamp, UserId};

#[derive(Default)]
struct PresenceInner {
    by_user: HashMap<UserId, ConnectionId>,
    by_connection: HashMap<ConnectionId, UserId>,
    last_seen: HashMap<UserId, Timestamp>,
}

/// Tracks which users currently hold a live connection.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<PresenceInner>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mapping for `user_id`, overwriting any prior handle.
    ///
    /// Returns the displaced connection handle if the user was already
    /// connected; that handle is stale and must be swept from all rooms.
    pub async fn register(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        now: Timestamp,
    ) -> Option<ConnectionId> {
        let mut inner = self.inner.lock().await;
        inner.last_seen.insert(user_id.clone(), now);
        inner.by_connection.insert(connection_id, user_id.clone());
        let displaced = inner.by_user.insert(user_id, connection_id);
        if let Some(old) = displaced {
            inner.by_connection.remove(&old);
        }
        displaced
    }

    /// Remove the mapping for a connection handle and record last-seen.
    ///
    /// Returns the owning user if the handle was registered. No-op (not an
    /// error) if the handle was already unregistered.
    pub async fn unregister(
        &self,
        connection_id: &ConnectionId,
        now: Timestamp,
    ) -> Option<UserId> {
        let mut inner = self.inner.lock().await;
        let user_id = inner.by_connection.remove(connection_id)?;
        // Only drop the forward mapping if it still points at this handle;
        // a newer connection for the same user must not be evicted.
        if inner.by_user.get(&user_id) == Some(connection_id) {
            inner.by_user.remove(&user_id);
        }
        inner.last_seen.insert(user_id.clone(), now);
        Some(user_id)
    }

    /// User ids with a live connection.
    pub async fn online_user_ids(&self) -> Vec<UserId> {
        let inner = self.inner.lock().await;
        inner.by_user.keys().cloned().collect()
    }

    /// The live connection for a user, if any.
    pub async fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        let inner = self.inner.lock().await;
        inner.by_user.get(user_id).copied()
    }

    /// The owning user of a connection, if registered.
    pub async fn user_of(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let inner = self.inner.lock().await;
        inner.by_connection.get(connection_id).cloned()
    }

    /// All live connections except the given one. Used for global presence
    /// broadcasts (user online / offline).
    pub async fn connections_except(&self, exclude: &ConnectionId) -> Vec<ConnectionId> {
        let inner = self.inner.lock().await;
        inner
            .by_connection
            .keys()
            .filter(|id| *id != exclude)
            .copied()
            .collect()
    }

    /// Last-seen timestamp for a user, if ever connected.
    pub async fn last_seen(&self, user_id: &UserId) -> Option<Timestamp> {
        let inner = self.inner.lock().await;
        inner.last_seen.get(user_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_register_marks_user_online() {
        // given:
        let registry = PresenceRegistry::new();
        let conn = ConnectionId::generate();

        // when:
        let displaced = registry
            .register(user("alice"), conn, Timestamp::new(1000))
            .await;

        // then:
        assert!(displaced.is_none());
        assert_eq!(registry.online_user_ids().await, vec![user("alice")]);
        assert_eq!(registry.connection_of(&user("alice")).await, Some(conn));
    }

    #[tokio::test]
    async fn test_register_displaces_prior_connection() {
        // given: alice already connected
        let registry = PresenceRegistry::new();
        let old = ConnectionId::generate();
        let new = ConnectionId::generate();
        registry
            .register(user("alice"), old, Timestamp::new(1000))
            .await;

        // when: alice reconnects
        let displaced = registry
            .register(user("alice"), new, Timestamp::new(2000))
            .await;

        // then: last writer wins, old handle reported as stale
        assert_eq!(displaced, Some(old));
        assert_eq!(registry.connection_of(&user("alice")).await, Some(new));
        assert_eq!(registry.user_of(&old).await, None);
    }

    #[tokio::test]
    async fn test_unregister_marks_user_offline_and_records_last_seen() {
        // given:
        let registry = PresenceRegistry::new();
        let conn = ConnectionId::generate();
        registry
            .register(user("alice"), conn, Timestamp::new(1000))
            .await;

        // when:
        let owner = registry.unregister(&conn, Timestamp::new(5000)).await;

        // then:
        assert_eq!(owner, Some(user("alice")));
        assert!(registry.online_user_ids().await.is_empty());
        assert_eq!(
            registry.last_seen(&user("alice")).await,
            Some(Timestamp::new(5000))
        );
    }

    #[tokio::test]
    async fn test_unregister_unknown_handle_is_noop() {
        // given:
        let registry = PresenceRegistry::new();

        // when:
        let owner = registry
            .unregister(&ConnectionId::generate(), Timestamp::new(1000))
            .await;

        // then:
        assert!(owner.is_none());
    }

    #[tokio::test]
    async fn test_unregister_stale_handle_keeps_newer_connection() {
        // given: alice reconnected, old handle still being torn down
        let registry = PresenceRegistry::new();
        let old = ConnectionId::generate();
        let new = ConnectionId::generate();
        registry
            .register(user("alice"), old, Timestamp::new(1000))
            .await;
        registry
            .register(user("alice"), new, Timestamp::new(2000))
            .await;

        // when: the stale socket's teardown unregisters the old handle
        let owner = registry.unregister(&old, Timestamp::new(3000)).await;

        // then: alice stays online through the newer connection
        assert!(owner.is_none());
        assert_eq!(registry.connection_of(&user("alice")).await, Some(new));
    }

    #[tokio::test]
    async fn test_connections_except_excludes_caller() {
        // given:
        let registry = PresenceRegistry::new();
        let conn_a = ConnectionId::generate();
        let conn_b = ConnectionId::generate();
        registry
            .register(user("alice"), conn_a, Timestamp::new(1000))
            .await;
        registry
            .register(user("bob"), conn_b, Timestamp::new(1000))
            .await;

        // when:
        let others = registry.connections_except(&conn_a).await;

        // then:
        assert_eq!(others, vec![conn_b]);
    }
}
