//! UseCase: typing indicators with auto-expiry.
//!
//! The first keypress in a group broadcasts `is_typing = true` to the rest of
//! the room and arms a 3-second expiry timer; further keypresses only refresh
//! the entry without re-broadcasting. Each begin call spawns a sleep that
//! presents its generation on expiry; only the timer matching the latest
//! refresh wins, so the stop event fires exactly once, 3 seconds after the
//! last refresh. An explicit stop clears the entry immediately.

use std::sync::Arc;

use crate::domain::{ChatError, ConnectionId, GroupId, MessagePusher, UserId};
use crate::proto::ServerEvent;
use crate::registry::{RoomTracker, TypingTracker, TypingTransition};

pub struct TypingUseCase {
    pusher: Arc<dyn MessagePusher>,
    rooms: Arc<RoomTracker>,
    typing: Arc<TypingTracker>,
}

impl TypingUseCase {
    pub fn new(
        pusher: Arc<dyn MessagePusher>,
        rooms: Arc<RoomTracker>,
        typing: Arc<TypingTracker>,
    ) -> Self {
        Self {
            pusher,
            rooms,
            typing,
        }
    }

    /// Handle a typing signal from a connection.
    ///
    /// The connection must currently be subscribed to the group's room (join
    /// already enforced the directory gate, so no second lookup per
    /// keystroke burst).
    pub async fn set_typing(
        self: &Arc<Self>,
        group_id: GroupId,
        user_id: UserId,
        connection_id: ConnectionId,
        is_typing: bool,
    ) -> Result<(), ChatError> {
        if !self.rooms.contains(&group_id, &connection_id).await {
            return Err(ChatError::NotAMember {
                group_id: group_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
            });
        }

        if is_typing {
            let transition = self.typing.begin(group_id.clone(), user_id.clone()).await;
            if let TypingTransition::Started(_) = transition {
                let targets = self.rooms.members_except(&group_id, &connection_id).await;
                let event = ServerEvent::Typing {
                    group_id: group_id.clone(),
                    user_id: user_id.clone(),
                    is_typing: true,
                };
                self.pusher.broadcast(targets, &event.to_json()).await;
            }
            let generation = match transition {
                TypingTransition::Started(g) | TypingTransition::Refreshed(g) => g,
            };
            self.spawn_expiry(group_id, user_id, connection_id, generation);
        } else if self.typing.clear(&group_id, &user_id).await {
            let targets = self.rooms.members_except(&group_id, &connection_id).await;
            let event = ServerEvent::Typing {
                group_id,
                user_id,
                is_typing: false,
            };
            self.pusher.broadcast(targets, &event.to_json()).await;
        }

        Ok(())
    }

    /// Arm the expiry timer for a typing entry. The sleep presents its
    /// generation on wake; stale generations lose silently.
    fn spawn_expiry(
        self: &Arc<Self>,
        group_id: GroupId,
        user_id: UserId,
        connection_id: ConnectionId,
        generation: u64,
    ) {
        let usecase = Arc::clone(self);
        let ttl = self.typing.ttl();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if usecase
                .typing
                .clear_if_current(&group_id, &user_id, generation)
                .await
            {
                let targets = usecase
                    .rooms
                    .members_except(&group_id, &connection_id)
                    .await;
                let event = ServerEvent::Typing {
                    group_id,
                    user_id,
                    is_typing: false,
                };
                usecase.pusher.broadcast(targets, &event.to_json()).await;
            }
        });
    }
}
