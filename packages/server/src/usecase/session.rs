//! UseCase: connection session lifecycle and room membership.
//!
//! Connect registers the pusher channel and presence (displacing a stale
//! connection for the same user), join/leave manage room subscriptions
//! behind the membership gate, and disconnect sweeps every room the
//! connection had joined so no dead handle lingers anywhere.

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::domain::{
    ChatError, ConnectionId, GroupDirectory, GroupId, MessagePusher, PusherChannel, Timestamp,
    UserId,
};
use crate::proto::ServerEvent;
use crate::registry::{PresenceRegistry, RoomTracker, TypingTracker};

pub struct SessionUseCase {
    directory: Arc<dyn GroupDirectory>,
    pusher: Arc<dyn MessagePusher>,
    presence: Arc<PresenceRegistry>,
    rooms: Arc<RoomTracker>,
    typing: Arc<TypingTracker>,
    clock: Arc<dyn Clock>,
}

impl SessionUseCase {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        pusher: Arc<dyn MessagePusher>,
        presence: Arc<PresenceRegistry>,
        rooms: Arc<RoomTracker>,
        typing: Arc<TypingTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            pusher,
            presence,
            rooms,
            typing,
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Register a freshly authenticated connection.
    ///
    /// A prior connection for the same user is displaced (last writer wins):
    /// its rooms are swept and its channel unregistered, so the stale socket
    /// stops receiving events immediately. Returns the globally online users
    /// for the caller's snapshot.
    pub async fn connect(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        sender: PusherChannel,
    ) -> Vec<UserId> {
        self.pusher.register(connection_id, sender).await;

        let displaced = self
            .presence
            .register(user_id.clone(), connection_id, self.now())
            .await;
        if let Some(stale) = displaced {
            tracing::info!(
                "User '{}' reconnected, displacing stale connection '{}'",
                user_id.as_str(),
                stale
            );
            self.evict(&stale).await;
        }

        let others = self.presence.connections_except(&connection_id).await;
        let event = ServerEvent::UserOnline {
            user_id: user_id.clone(),
        };
        self.pusher.broadcast(others, &event.to_json()).await;

        self.presence.online_user_ids().await
    }

    /// Sweep a stale handle out of every room and drop its channel. Used
    /// when a reconnect displaces an old connection that has not yet torn
    /// itself down.
    async fn evict(&self, connection_id: &ConnectionId) {
        let swept = self.rooms.sweep(connection_id).await;
        for (group_id, user_id) in swept {
            self.notify_departure(&group_id, &user_id).await;
        }
        self.pusher.unregister(connection_id).await;
    }

    /// Room-scoped departure notifications: a forced typing stop (if the
    /// user was typing) followed by user_left.
    async fn notify_departure(&self, group_id: &GroupId, user_id: &UserId) {
        let remaining = self.rooms.members_of(group_id).await;
        if self.typing.clear(group_id, user_id).await {
            let stop = ServerEvent::Typing {
                group_id: group_id.clone(),
                user_id: user_id.clone(),
                is_typing: false,
            };
            self.pusher
                .broadcast(remaining.clone(), &stop.to_json())
                .await;
        }
        let left = ServerEvent::UserLeft {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
        };
        self.pusher.broadcast(remaining, &left.to_json()).await;
    }

    /// Tear down a connection that closed or errored.
    ///
    /// No-op if the handle was already unregistered (e.g. displaced by a
    /// reconnect). Returns the owning user when one was found.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let now = self.now();
        let Some(user_id) = self.presence.unregister(connection_id, now).await else {
            // Already displaced or never registered; still drop the channel.
            self.pusher.unregister(connection_id).await;
            return None;
        };

        let swept = self.rooms.sweep(connection_id).await;
        for (group_id, swept_user) in swept {
            self.notify_departure(&group_id, &swept_user).await;
        }

        let others = self.presence.connections_except(connection_id).await;
        let event = ServerEvent::UserOffline {
            user_id: user_id.clone(),
            last_seen: now,
        };
        self.pusher.broadcast(others, &event.to_json()).await;
        self.pusher.unregister(connection_id).await;

        tracing::info!("Connection '{}' ('{}') cleaned up", connection_id, user_id.as_str());
        Some(user_id)
    }

    /// Subscribe a connection to a group's room. The caller must hold an
    /// active role in the group; the membership collaborator decides.
    pub async fn join(
        &self,
        group_id: GroupId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<Vec<UserId>, ChatError> {
        let role = self.directory.member_role(&group_id, &user_id).await?;
        if role.is_none() {
            return Err(ChatError::NotAMember {
                group_id: group_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
            });
        }

        self.rooms
            .join(group_id.clone(), connection_id, user_id.clone())
            .await;

        let others = self.rooms.members_except(&group_id, &connection_id).await;
        let event = ServerEvent::UserJoined {
            group_id: group_id.clone(),
            user_id,
        };
        self.pusher.broadcast(others, &event.to_json()).await;

        Ok(self.rooms.users_in(&group_id).await)
    }

    /// Unsubscribe a connection from a group's room. Clears any typing entry
    /// for the user. Leaving a room one never joined is a quiet no-op.
    pub async fn leave(
        &self,
        group_id: GroupId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) {
        let removed = self.rooms.leave(&group_id, &connection_id).await;
        if !removed {
            return;
        }
        self.notify_departure(&group_id, &user_id).await;
    }
}
