//! Domain model for the chat core.
//!
//! Validated value objects and the message entity. The collaborator traits
//! (membership directory, message store, pusher) live in [`collaborators`];
//! concrete implementations are provided by the infrastructure layer.

pub mod collaborators;
pub mod error;
pub mod message;

pub use collaborators::{
    GroupActivity, GroupDirectory, MessagePushError, MessagePusher, MessageStore, PusherChannel,
    TokenVerifier,
};
pub use error::{AuthError, ChatError};
pub use message::{ChatMessage, MessageKind, Reaction, ReadReceipt};

use serde::{Deserialize, Serialize};

/// Maximum length of a chat message body, in characters.
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Maximum length of a user or group identifier, in characters.
const MAX_ID_CHARS: usize = 64;

/// Identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ChatError> {
        if value.is_empty() || value.chars().count() > MAX_ID_CHARS {
            return Err(ChatError::InvalidContent(format!(
                "invalid user id (length {})",
                value.len()
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of a study group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(value: String) -> Result<Self, ChatError> {
        if value.is_empty() || value.chars().count() > MAX_ID_CHARS {
            return Err(ChatError::InvalidContent(format!(
                "invalid group id (length {})",
                value.len()
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of a persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(value: String) -> Result<Self, ChatError> {
        if value.is_empty() {
            return Err(ChatError::InvalidContent("empty message id".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of a live WebSocket connection. One per socket, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Body of a chat message. Non-empty after trimming, bounded length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ChatError> {
        if value.trim().is_empty() {
            return Err(ChatError::InvalidContent("empty message".to_string()));
        }
        if value.chars().count() > MAX_CONTENT_CHARS {
            return Err(ChatError::InvalidContent(format!(
                "message too long ({} chars)",
                value.chars().count()
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A bounded preview of the content, truncated on a char boundary.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.0.chars().count() <= max_chars {
            return self.0.clone();
        }
        self.0.chars().take(max_chars).collect()
    }
}

/// Unix timestamp in UTC milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Role a user holds in a group. Any role grants chat access; ownership of
/// individual messages gates edit/delete, not the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Moderator,
    Owner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_empty() {
        // given / when:
        let result = UserId::new("".to_string());

        // then:
        assert!(result.is_err());
    }

    #[test]
    fn test_user_id_accepts_normal_value() {
        // given / when:
        let result = UserId::new("alice".to_string());

        // then:
        assert_eq!(result.unwrap().as_str(), "alice");
    }

    #[test]
    fn test_message_content_rejects_whitespace_only() {
        // given / when:
        let result = MessageContent::new("   \n ".to_string());

        // then:
        assert!(matches!(result, Err(ChatError::InvalidContent(_))));
    }

    #[test]
    fn test_message_content_rejects_over_limit() {
        // given:
        let long = "x".repeat(MAX_CONTENT_CHARS + 1);

        // when:
        let result = MessageContent::new(long);

        // then:
        assert!(matches!(result, Err(ChatError::InvalidContent(_))));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        // given: multi-byte content longer than the preview window
        let content = MessageContent::new("ねこ".repeat(80)).unwrap();

        // when:
        let preview = content.preview(100);

        // then:
        assert_eq!(preview.chars().count(), 100);
    }

    #[test]
    fn test_preview_keeps_short_content_intact() {
        // given:
        let content = MessageContent::new("short".to_string()).unwrap();

        // when:
        let preview = content.preview(100);

        // then:
        assert_eq!(preview, "short");
    }

    #[test]
    fn test_message_id_generate_is_unique() {
        // given / when:
        let a = MessageId::generate();
        let b = MessageId::generate();

        // then:
        assert_ne!(a, b);
    }
}
