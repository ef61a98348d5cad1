//! Error types for the chat core.

use thiserror::Error;

/// Errors returned by broker and session operations.
///
/// All of these are scoped to the requesting connection: they are reported
/// back to the caller and never broadcast to a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The user holds no active role in the group.
    #[error("user '{user_id}' is not a member of group '{group_id}'")]
    NotAMember { group_id: String, user_id: String },

    /// The referenced group, message or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Ownership check failed (mutating another user's message).
    #[error("user '{user_id}' is not allowed to modify message '{message_id}'")]
    NotAuthorized { message_id: String, user_id: String },

    /// A value object failed validation.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// The storage collaborator failed. In-memory state is left unchanged.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ChatError {
    /// Stable machine-readable code carried on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotAMember { .. } => "not_a_member",
            ChatError::NotFound(_) => "not_found",
            ChatError::NotAuthorized { .. } => "not_authorized",
            ChatError::InvalidContent(_) => "invalid_content",
            ChatError::Persistence(_) => "persistence",
        }
    }
}

/// Handshake failure. Fatal to the connection attempt only; the connection
/// never enters any tracked state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authentication token")]
    MissingToken,

    #[error("invalid authentication token")]
    InvalidToken,
}
