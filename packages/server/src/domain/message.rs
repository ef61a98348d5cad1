//! Chat message entity and its in-place mutations.
//!
//! Messages are append-only except for the edit / soft-delete / reaction /
//! read-receipt mutations, each scoped to a single message by id. The
//! idempotent mutators here (toggle, append-if-absent) are what lets the
//! broker interleave with persistence without mutex discipline.

use serde::{Deserialize, Serialize};

use super::{GroupId, MessageContent, MessageId, Timestamp, UserId};

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
    System,
}

/// A single emoji reaction by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: UserId,
    pub emoji: String,
}

/// A read receipt. Append-only, at most one per user per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: UserId,
    pub read_at: Timestamp,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub group_id: GroupId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub timestamp: Timestamp,
    /// Set when the message was last edited. `None` means never edited.
    pub edited_at: Option<Timestamp>,
    /// Soft-delete flag. Content is retained for audit but never rendered.
    pub deleted: bool,
    pub reactions: Vec<Reaction>,
    pub read_by: Vec<ReadReceipt>,
    pub reply_to: Option<MessageId>,
    pub mentions: Vec<UserId>,
}

impl ChatMessage {
    pub fn new(
        group_id: GroupId,
        sender_id: UserId,
        content: MessageContent,
        kind: MessageKind,
        timestamp: Timestamp,
        reply_to: Option<MessageId>,
        mentions: Vec<UserId>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            group_id,
            sender_id,
            content,
            kind,
            timestamp,
            edited_at: None,
            deleted: false,
            reactions: Vec::new(),
            read_by: Vec::new(),
            reply_to,
            mentions,
        }
    }

    /// Replace the content and record the edit time.
    pub fn apply_edit(&mut self, content: MessageContent, edited_at: Timestamp) {
        self.content = content;
        self.edited_at = Some(edited_at);
    }

    /// Set the soft-delete flag. The record stays so ids and ordering remain
    /// stable.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Idempotent reaction toggle: if `(user_id, emoji)` is present, remove
    /// it; otherwise add it.
    pub fn toggle_reaction(&mut self, user_id: UserId, emoji: String) {
        let existing = self
            .reactions
            .iter()
            .position(|r| r.user_id == user_id && r.emoji == emoji);
        match existing {
            Some(index) => {
                self.reactions.remove(index);
            }
            None => {
                self.reactions.push(Reaction { user_id, emoji });
            }
        }
    }

    /// Append a read receipt unless the user already has one. Returns `true`
    /// if a receipt was added.
    pub fn mark_read_by(&mut self, user_id: UserId, read_at: Timestamp) -> bool {
        if self.read_by.iter().any(|r| r.user_id == user_id) {
            return false;
        }
        self.read_by.push(ReadReceipt { user_id, read_at });
        true
    }
}
