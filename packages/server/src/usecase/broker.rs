//! UseCase: chat message broker.
//!
//! Validates a send/edit/delete/react/read intent against group membership,
//! persists through the message store collaborator, and fans the committed
//! result out to the connections subscribed to the group's room. Mention
//! notifications are routed point-to-point through the presence registry.
//!
//! Error policy: membership/authorization failures are reported to the caller
//! only, with no state mutated and nothing broadcast. Persistence failures
//! are returned and logged. Persistence always completes before any
//! broadcast, so the room never sees a partially-applied mutation.

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::domain::{
    ChatError, ChatMessage, ConnectionId, GroupActivity, GroupDirectory, GroupId, MessageContent,
    MessageId, MessageKind, MessagePusher, MessageStore, Timestamp, UserId,
};
use crate::proto::ServerEvent;
use crate::registry::{PresenceRegistry, RoomTracker};

/// Mention previews are truncated to this many characters.
pub const MENTION_PREVIEW_CHARS: usize = 100;

pub struct ChatBroker {
    directory: Arc<dyn GroupDirectory>,
    store: Arc<dyn MessageStore>,
    activity: Arc<dyn GroupActivity>,
    pusher: Arc<dyn MessagePusher>,
    presence: Arc<PresenceRegistry>,
    rooms: Arc<RoomTracker>,
    clock: Arc<dyn Clock>,
}

impl ChatBroker {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        store: Arc<dyn MessageStore>,
        activity: Arc<dyn GroupActivity>,
        pusher: Arc<dyn MessagePusher>,
        presence: Arc<PresenceRegistry>,
        rooms: Arc<RoomTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            store,
            activity,
            pusher,
            presence,
            rooms,
            clock,
        }
    }

    /// Membership gate shared by every broker operation.
    async fn require_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), ChatError> {
        let role = self.directory.member_role(group_id, user_id).await?;
        if role.is_none() {
            return Err(ChatError::NotAMember {
                group_id: group_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Look up a message that is expected to exist and not be soft-deleted.
    async fn require_live_message(
        &self,
        group_id: &GroupId,
        message_id: &MessageId,
    ) -> Result<ChatMessage, ChatError> {
        let message = self
            .store
            .find(group_id, message_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("message '{}'", message_id.as_str())))?;
        if message.deleted {
            // Deleted records exist only for audit.
            return Err(ChatError::NotFound(format!(
                "message '{}'",
                message_id.as_str()
            )));
        }
        Ok(message)
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Send a message to a group.
    ///
    /// Persists, touches group activity, broadcasts to every connection in
    /// the room except the sender's own (the caller receives the returned
    /// message as its acknowledgment), then delivers mention notifications
    /// to online mentioned users. Offline mentions are silently skipped.
    #[allow(clippy::too_many_arguments)]
    pub async fn send(
        &self,
        group_id: GroupId,
        sender_id: UserId,
        sender_connection: ConnectionId,
        content: MessageContent,
        kind: MessageKind,
        reply_to: Option<MessageId>,
        mentions: Vec<UserId>,
    ) -> Result<ChatMessage, ChatError> {
        self.require_member(&group_id, &sender_id).await?;

        let message = ChatMessage::new(
            group_id.clone(),
            sender_id.clone(),
            content,
            kind,
            self.now(),
            reply_to,
            mentions,
        );

        // Persist before any fan-out.
        self.store.append(message.clone()).await.inspect_err(|e| {
            tracing::error!(
                "Failed to persist message from '{}' to group '{}': {}",
                sender_id.as_str(),
                group_id.as_str(),
                e
            );
        })?;

        // Best-effort activity bump; never fails the send.
        self.activity.touch(&group_id).await;

        let targets = self
            .rooms
            .members_except(&group_id, &sender_connection)
            .await;
        let event = ServerEvent::NewMessage {
            message: message.clone(),
        };
        self.pusher.broadcast(targets, &event.to_json()).await;
        tracing::debug!(
            "Broadcast message '{}' to room '{}'",
            message.id.as_str(),
            group_id.as_str()
        );

        self.notify_mentions(&message).await;

        Ok(message)
    }

    /// Point-to-point mention notifications, outside the room broadcast.
    async fn notify_mentions(&self, message: &ChatMessage) {
        for mentioned in &message.mentions {
            let Some(connection) = self.presence.connection_of(mentioned).await else {
                // Offline user: skipped, never an error.
                tracing::debug!(
                    "Mentioned user '{}' is offline, skipping notification",
                    mentioned.as_str()
                );
                continue;
            };
            let event = ServerEvent::Mention {
                group_id: message.group_id.clone(),
                message_id: message.id.clone(),
                sender_id: message.sender_id.clone(),
                preview: message.content.preview(MENTION_PREVIEW_CHARS),
            };
            if let Err(e) = self.pusher.push_to(&connection, &event.to_json()).await {
                tracing::warn!(
                    "Failed to deliver mention to '{}': {}",
                    mentioned.as_str(),
                    e
                );
            }
        }
    }

    /// Edit a message. Ownership-based authorization: only the original
    /// sender may edit, regardless of role.
    pub async fn edit(
        &self,
        group_id: GroupId,
        message_id: MessageId,
        editor_id: UserId,
        new_content: MessageContent,
    ) -> Result<ChatMessage, ChatError> {
        self.require_member(&group_id, &editor_id).await?;

        let mut message = self.require_live_message(&group_id, &message_id).await?;
        if message.sender_id != editor_id {
            return Err(ChatError::NotAuthorized {
                message_id: message_id.as_str().to_string(),
                user_id: editor_id.as_str().to_string(),
            });
        }

        message.apply_edit(new_content, self.now());
        self.store.update(message.clone()).await?;

        let targets = self.rooms.members_of(&group_id).await;
        let event = ServerEvent::MessageEdited {
            message: message.clone(),
        };
        self.pusher.broadcast(targets, &event.to_json()).await;

        Ok(message)
    }

    /// Soft-delete a message. Only the id and flag are broadcast; content is
    /// retained for audit but never rendered again.
    pub async fn delete(
        &self,
        group_id: GroupId,
        message_id: MessageId,
        requester_id: UserId,
    ) -> Result<(), ChatError> {
        self.require_member(&group_id, &requester_id).await?;

        let mut message = self.require_live_message(&group_id, &message_id).await?;
        if message.sender_id != requester_id {
            return Err(ChatError::NotAuthorized {
                message_id: message_id.as_str().to_string(),
                user_id: requester_id.as_str().to_string(),
            });
        }

        message.mark_deleted();
        self.store.update(message).await?;

        let targets = self.rooms.members_of(&group_id).await;
        let event = ServerEvent::MessageDeleted {
            group_id: group_id.clone(),
            message_id,
        };
        self.pusher.broadcast(targets, &event.to_json()).await;

        Ok(())
    }

    /// Idempotent reaction toggle. Broadcasts the full updated reaction list
    /// for the message, not a delta.
    pub async fn toggle_reaction(
        &self,
        group_id: GroupId,
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    ) -> Result<ChatMessage, ChatError> {
        self.require_member(&group_id, &user_id).await?;

        let mut message = self.require_live_message(&group_id, &message_id).await?;
        message.toggle_reaction(user_id, emoji);
        self.store.update(message.clone()).await?;

        let targets = self.rooms.members_of(&group_id).await;
        let event = ServerEvent::ReactionUpdated {
            group_id,
            message_id: message.id.clone(),
            reactions: message.reactions.clone(),
        };
        self.pusher.broadcast(targets, &event.to_json()).await;

        Ok(message)
    }

    /// Accumulate read receipts. Idempotent per user: already-read ids are
    /// skipped. The receipt update goes to the rest of the room, not to the
    /// reader.
    pub async fn mark_read(
        &self,
        group_id: GroupId,
        message_ids: Vec<MessageId>,
        reader_id: UserId,
        reader_connection: ConnectionId,
    ) -> Result<Vec<MessageId>, ChatError> {
        self.require_member(&group_id, &reader_id).await?;

        let read_at = self.now();
        let mut newly_read = Vec::new();
        for message_id in message_ids {
            let Some(mut message) = self.store.find(&group_id, &message_id).await? else {
                tracing::debug!(
                    "Skipping read receipt for unknown message '{}'",
                    message_id.as_str()
                );
                continue;
            };
            if message.mark_read_by(reader_id.clone(), read_at) {
                self.store.update(message).await?;
                newly_read.push(message_id);
            }
        }

        if !newly_read.is_empty() {
            let targets = self
                .rooms
                .members_except(&group_id, &reader_connection)
                .await;
            let event = ServerEvent::MessagesRead {
                group_id,
                message_ids: newly_read.clone(),
                receipt: crate::domain::ReadReceipt {
                    user_id: reader_id,
                    read_at,
                },
            };
            self.pusher.broadcast(targets, &event.to_json()).await;
        }

        Ok(newly_read)
    }
}
