//! Infrastructure layer: concrete implementations of the collaborator
//! traits defined by the domain.

pub mod memory;
pub mod pusher;

pub use memory::{InMemoryGroupActivity, InMemoryGroupDirectory, InMemoryMessageStore, StaticTokenVerifier};
pub use pusher::WebSocketMessagePusher;
