//! Use cases: the operations the UI layer drives.
//!
//! Each use case owns the registries and collaborators it needs and is the
//! single dispatch point for its entity, which is what gives per-room
//! broadcast ordering. State mutation never straddles an awaited collaborator
//! call: in-memory structures are mutated either fully before or fully after
//! persistence.

pub mod broker;
pub mod session;
pub mod typing;

pub use broker::ChatBroker;
pub use session::SessionUseCase;
pub use typing::TypingUseCase;
