//! Shared application state.

use std::sync::Arc;

use crate::domain::{MessagePusher, TokenVerifier};
use crate::usecase::{ChatBroker, SessionUseCase, TypingUseCase};

/// Shared application state handed to every handler.
pub struct AppState {
    /// Token verification at the connection handshake
    pub verifier: Arc<dyn TokenVerifier>,
    /// Per-connection event delivery
    pub pusher: Arc<dyn MessagePusher>,
    /// Session lifecycle: connect, disconnect, join, leave
    pub session: Arc<SessionUseCase>,
    /// Chat mutations: send, edit, delete, react, mark read
    pub broker: Arc<ChatBroker>,
    /// Typing indicators with auto-expiry
    pub typing: Arc<TypingUseCase>,
}
