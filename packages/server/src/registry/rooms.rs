//! Group room membership tracker.
//!
//! A room is the set of live connections currently subscribed to a group's
//! real-time events. Rooms are ephemeral, rebuilt from join events; an empty
//! room entry is dropped (pure garbage collection). The critical invariant:
//! after a disconnect sweep, no room may still hold the dead handle.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::domain::{ConnectionId, GroupId, UserId};

#[derive(Default)]
struct RoomsInner {
    rooms: HashMap<GroupId, HashSet<ConnectionId>>,
    /// Which user joined which groups on which connection. Needed to answer
    /// "who is in this room" and to clean up typing state on disconnect.
    members: HashMap<(GroupId, ConnectionId), UserId>,
}

/// Tracks per-group room subscriptions.
#[derive(Default)]
pub struct RoomTracker {
    inner: Mutex<RoomsInner>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a group's room. Membership authorization is the
    /// caller's responsibility (the directory gate lives in the use case).
    pub async fn join(&self, group_id: GroupId, connection_id: ConnectionId, user_id: UserId) {
        let mut inner = self.inner.lock().await;
        inner
            .rooms
            .entry(group_id.clone())
            .or_default()
            .insert(connection_id);
        inner.members.insert((group_id, connection_id), user_id);
    }

    /// Remove a connection from a group's room. Returns `true` if the
    /// connection was subscribed.
    pub async fn leave(&self, group_id: &GroupId, connection_id: &ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = match inner.rooms.get_mut(group_id) {
            Some(room) => room.remove(connection_id),
            None => false,
        };
        if removed {
            if inner.rooms.get(group_id).is_some_and(|r| r.is_empty()) {
                inner.rooms.remove(group_id);
            }
            inner
                .members
                .remove(&(group_id.clone(), *connection_id));
        }
        removed
    }

    /// Connection handles currently in the room.
    pub async fn members_of(&self, group_id: &GroupId) -> Vec<ConnectionId> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(group_id)
            .map(|room| room.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Connection handles currently in the room, excluding one. Used for
    /// room broadcasts that must not echo to the sender.
    pub async fn members_except(
        &self,
        group_id: &GroupId,
        exclude: &ConnectionId,
    ) -> Vec<ConnectionId> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(group_id)
            .map(|room| room.iter().filter(|id| *id != exclude).copied().collect())
            .unwrap_or_default()
    }

    /// Users currently present in the room (presence-within-room, distinct
    /// from global presence).
    pub async fn users_in(&self, group_id: &GroupId) -> Vec<UserId> {
        let inner = self.inner.lock().await;
        let Some(room) = inner.rooms.get(group_id) else {
            return Vec::new();
        };
        room.iter()
            .filter_map(|conn| inner.members.get(&(group_id.clone(), *conn)).cloned())
            .collect()
    }

    /// Whether a connection is subscribed to the room.
    pub async fn contains(&self, group_id: &GroupId, connection_id: &ConnectionId) -> bool {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(group_id)
            .is_some_and(|room| room.contains(connection_id))
    }

    /// Remove a connection from every room it joined. Returns the affected
    /// groups paired with the user that held the subscription, so the caller
    /// can broadcast leave events and clear typing state.
    pub async fn sweep(&self, connection_id: &ConnectionId) -> Vec<(GroupId, UserId)> {
        let mut inner = self.inner.lock().await;
        let mut swept = Vec::new();
        inner.rooms.retain(|group_id, room| {
            if room.remove(connection_id) {
                swept.push(group_id.clone());
            }
            !room.is_empty()
        });
        swept
            .into_iter()
            .filter_map(|group_id| {
                inner
                    .members
                    .remove(&(group_id.clone(), *connection_id))
                    .map(|user_id| (group_id, user_id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str) -> GroupId {
        GroupId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_join_adds_connection_to_room() {
        // given:
        let tracker = RoomTracker::new();
        let conn = ConnectionId::generate();

        // when:
        tracker.join(group("g1"), conn, user("alice")).await;

        // then:
        assert_eq!(tracker.members_of(&group("g1")).await, vec![conn]);
        assert!(tracker.contains(&group("g1"), &conn).await);
        assert_eq!(tracker.users_in(&group("g1")).await, vec![user("alice")]);
    }

    #[tokio::test]
    async fn test_connection_may_join_multiple_rooms() {
        // given:
        let tracker = RoomTracker::new();
        let conn = ConnectionId::generate();

        // when:
        tracker.join(group("g1"), conn, user("alice")).await;
        tracker.join(group("g2"), conn, user("alice")).await;

        // then:
        assert!(tracker.contains(&group("g1"), &conn).await);
        assert!(tracker.contains(&group("g2"), &conn).await);
    }

    #[tokio::test]
    async fn test_leave_removes_connection_and_gc_empty_room() {
        // given:
        let tracker = RoomTracker::new();
        let conn = ConnectionId::generate();
        tracker.join(group("g1"), conn, user("alice")).await;

        // when:
        let removed = tracker.leave(&group("g1"), &conn).await;

        // then:
        assert!(removed);
        assert!(tracker.members_of(&group("g1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_of_unsubscribed_connection_is_noop() {
        // given:
        let tracker = RoomTracker::new();

        // when:
        let removed = tracker
            .leave(&group("g1"), &ConnectionId::generate())
            .await;

        // then:
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_sweep_removes_handle_from_every_room() {
        // given: one connection in two rooms, another connection in one
        let tracker = RoomTracker::new();
        let conn_a = ConnectionId::generate();
        let conn_b = ConnectionId::generate();
        tracker.join(group("g1"), conn_a, user("alice")).await;
        tracker.join(group("g2"), conn_a, user("alice")).await;
        tracker.join(group("g1"), conn_b, user("bob")).await;

        // when:
        let mut swept = tracker.sweep(&conn_a).await;
        swept.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        // then: no room still holds the dead handle
        assert_eq!(
            swept,
            vec![(group("g1"), user("alice")), (group("g2"), user("alice"))]
        );
        assert_eq!(tracker.members_of(&group("g1")).await, vec![conn_b]);
        assert!(tracker.members_of(&group("g2")).await.is_empty());
    }

    #[tokio::test]
    async fn test_members_except_excludes_sender() {
        // given:
        let tracker = RoomTracker::new();
        let conn_a = ConnectionId::generate();
        let conn_b = ConnectionId::generate();
        tracker.join(group("g1"), conn_a, user("alice")).await;
        tracker.join(group("g1"), conn_b, user("bob")).await;

        // when:
        let others = tracker.members_except(&group("g1"), &conn_a).await;

        // then:
        assert_eq!(others, vec![conn_b]);
    }
}
