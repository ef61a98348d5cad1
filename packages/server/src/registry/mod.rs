//! In-memory registries for connection-scoped state.
//!
//! Presence, room membership and typing indicators are process-wide mutable
//! state rebuilt from live connections; none of it is persisted. A
//! horizontally scaled deployment would externalize these to a shared store,
//! which is out of scope here (single process assumed).

pub mod presence;
pub mod rooms;
pub mod typing;

pub use presence::PresenceRegistry;
pub use rooms::RoomTracker;
pub use typing::{TypingTracker, TypingTransition};
