//! Event formatting for terminal display.

use tsudoi_server::domain::{ChatMessage, Reaction, ReadReceipt, Timestamp, UserId};
use tsudoi_shared::time::timestamp_to_rfc3339;

/// Formats server events for the terminal.
pub struct EventFormatter;

impl EventFormatter {
    /// Format the online-users snapshot shown right after connecting.
    pub fn format_online_users(user_ids: &[UserId], current_user: &str) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str("Online:\n");

        if user_ids.is_empty() {
            output.push_str("(Nobody online)\n");
        } else {
            for user_id in user_ids {
                let me_suffix = if user_id.as_str() == current_user {
                    " (me)"
                } else {
                    ""
                };
                output.push_str(&format!("{}{}\n", user_id.as_str(), me_suffix));
            }
        }

        output.push_str("============================================================\n");
        output
    }

    pub fn format_user_online(user_id: &UserId) -> String {
        format!("\n* {} is now online\n", user_id.as_str())
    }

    pub fn format_user_offline(user_id: &UserId, last_seen: Timestamp) -> String {
        format!(
            "\n* {} went offline at {}\n",
            user_id.as_str(),
            timestamp_to_rfc3339(last_seen.value())
        )
    }

    /// Format the room roster shown after a successful join.
    pub fn format_joined(group_id: &str, present: &[UserId]) -> String {
        let roster = if present.is_empty() {
            "(empty)".to_string()
        } else {
            present
                .iter()
                .map(|u| u.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("\nJoined '{}'. Present: {}\n", group_id, roster)
    }

    pub fn format_user_joined(group_id: &str, user_id: &UserId) -> String {
        format!("\n+ {} joined '{}'\n", user_id.as_str(), group_id)
    }

    pub fn format_left(group_id: &str) -> String {
        format!("\nLeft '{}'\n", group_id)
    }

    pub fn format_user_left(group_id: &str, user_id: &UserId) -> String {
        format!("\n- {} left '{}'\n", user_id.as_str(), group_id)
    }

    /// Format an incoming chat message.
    pub fn format_message(message: &ChatMessage) -> String {
        let timestamp_str = timestamp_to_rfc3339(message.timestamp.value());
        let edited = if message.edited_at.is_some() {
            " (edited)"
        } else {
            ""
        };
        format!(
            "\n\n------------------------------------------------------------\n\
             [{}] @{}: {}{}\n\
             sent at {}\n\
             ------------------------------------------------------------\n",
            message.group_id.as_str(),
            message.sender_id.as_str(),
            message.content.as_str(),
            edited,
            timestamp_str
        )
    }

    /// Format the ack for the caller's own message.
    pub fn format_ack(message: &ChatMessage) -> String {
        format!(
            "sent at {} [{}]\n",
            timestamp_to_rfc3339(message.timestamp.value()),
            message.id.as_str()
        )
    }

    pub fn format_deleted(group_id: &str, message_id: &str) -> String {
        format!("\n[{}] message {} was deleted\n", group_id, message_id)
    }

    pub fn format_reactions(message_id: &str, reactions: &[Reaction]) -> String {
        let summary = if reactions.is_empty() {
            "(none)".to_string()
        } else {
            reactions
                .iter()
                .map(|r| format!("{} {}", r.emoji, r.user_id.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("\nreactions on {}: {}\n", message_id, summary)
    }

    pub fn format_read(group_id: &str, message_count: usize, receipt: &ReadReceipt) -> String {
        format!(
            "\n[{}] {} read {} message(s)\n",
            group_id,
            receipt.user_id.as_str(),
            message_count
        )
    }

    pub fn format_typing(group_id: &str, user_id: &UserId, is_typing: bool) -> String {
        if is_typing {
            format!("\n[{}] {} is typing...\n", group_id, user_id.as_str())
        } else {
            format!("\n[{}] {} stopped typing\n", group_id, user_id.as_str())
        }
    }

    pub fn format_mention(group_id: &str, sender_id: &UserId, preview: &str) -> String {
        format!(
            "\n@ you were mentioned by {} in '{}': {}\n",
            sender_id.as_str(),
            group_id,
            preview
        )
    }

    pub fn format_error(code: &str, message: &str) -> String {
        format!("\n! error [{}]: {}\n", code, message)
    }
}
