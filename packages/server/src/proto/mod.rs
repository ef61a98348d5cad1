//! Wire protocol: JSON messages exchanged over the WebSocket.
//!
//! Both directions are internally tagged enums (`"type"` field), so a single
//! `serde_json::from_str` dispatches the whole protocol. The client crate
//! uses these same types, which keeps the two sides in lockstep.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ChatMessage, GroupId, MessageId, MessageKind, Reaction, ReadReceipt, Timestamp, UserId,
};

/// Commands sent by a client over an established connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Join {
        group_id: String,
    },
    Leave {
        group_id: String,
    },
    Send {
        group_id: String,
        content: String,
        #[serde(default)]
        kind: Option<MessageKind>,
        #[serde(default)]
        reply_to: Option<String>,
        #[serde(default)]
        mentions: Vec<String>,
    },
    Edit {
        group_id: String,
        message_id: String,
        content: String,
    },
    Delete {
        group_id: String,
        message_id: String,
    },
    React {
        group_id: String,
        message_id: String,
        emoji: String,
    },
    MarkRead {
        group_id: String,
        message_ids: Vec<String>,
    },
    Typing {
        group_id: String,
        is_typing: bool,
    },
}

/// Events pushed by the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake confirmation. First event on every connection.
    Connected {
        user_id: UserId,
        connected_at: Timestamp,
    },
    /// Full snapshot of globally online users.
    OnlineUsers { user_ids: Vec<UserId> },
    UserOnline {
        user_id: UserId,
    },
    UserOffline {
        user_id: UserId,
        last_seen: Timestamp,
    },
    /// Caller successfully joined a room. Carries who is present.
    Joined {
        group_id: GroupId,
        present: Vec<UserId>,
    },
    UserJoined {
        group_id: GroupId,
        user_id: UserId,
    },
    Left {
        group_id: GroupId,
    },
    UserLeft {
        group_id: GroupId,
        user_id: UserId,
    },
    /// Acknowledgment of the caller's own send, carrying the persisted
    /// message with its server-assigned id.
    MessageAck { message: ChatMessage },
    NewMessage {
        message: ChatMessage,
    },
    MessageEdited {
        message: ChatMessage,
    },
    /// Soft deletion: id and flag only, content is never re-broadcast.
    MessageDeleted {
        group_id: GroupId,
        message_id: MessageId,
    },
    /// Full updated reaction list so clients reconcile without diff state.
    ReactionUpdated {
        group_id: GroupId,
        message_id: MessageId,
        reactions: Vec<Reaction>,
    },
    MessagesRead {
        group_id: GroupId,
        message_ids: Vec<MessageId>,
        receipt: ReadReceipt,
    },
    Typing {
        group_id: GroupId,
        user_id: UserId,
        is_typing: bool,
    },
    /// Targeted mention notification, delivered outside room broadcast.
    Mention {
        group_id: GroupId,
        message_id: MessageId,
        sender_id: UserId,
        preview: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Serialize for the wire. The event types contain nothing that can fail
    /// to serialize, so this never errors in practice; a failure is logged
    /// and an empty error frame takes its place.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize server event: {}", e);
            r#"{"type":"error","code":"internal","message":"serialization failure"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_roundtrip_tagged_json() {
        // given:
        let json = r#"{"type":"send","group_id":"g1","content":"hello","mentions":["bob"]}"#;

        // when:
        let command: ClientCommand = serde_json::from_str(json).unwrap();

        // then:
        assert_eq!(
            command,
            ClientCommand::Send {
                group_id: "g1".to_string(),
                content: "hello".to_string(),
                kind: None,
                reply_to: None,
                mentions: vec!["bob".to_string()],
            }
        );
    }

    #[test]
    fn test_typing_command_parses() {
        // given:
        let json = r#"{"type":"typing","group_id":"g1","is_typing":true}"#;

        // when:
        let command: ClientCommand = serde_json::from_str(json).unwrap();

        // then:
        assert!(matches!(
            command,
            ClientCommand::Typing { is_typing: true, .. }
        ));
    }

    #[test]
    fn test_server_event_carries_type_tag() {
        // given:
        let event = ServerEvent::Typing {
            group_id: GroupId::new("g1".to_string()).unwrap(),
            user_id: UserId::new("alice".to_string()).unwrap(),
            is_typing: false,
        };

        // when:
        let json = event.to_json();

        // then:
        assert!(json.contains(r#""type":"typing""#));
        assert!(json.contains(r#""is_typing":false"#));
    }

    #[test]
    fn test_unknown_command_type_is_rejected() {
        // given:
        let json = r#"{"type":"frobnicate"}"#;

        // when:
        let result = serde_json::from_str::<ClientCommand>(json);

        // then:
        assert!(result.is_err());
    }
}
