//! Terminal client for the tsudoi group chat server.
//!
//! The [`manager::ConnectionManager`] owns the connection lifecycle:
//! reconnect with exponential backoff, resubscribe to every joined group,
//! and fail outbound commands fast while disconnected. [`session`] handles
//! one physical WebSocket; [`typing::TypingThrottle`] collapses keystroke
//! bursts into one typing signal.

pub mod backoff;
pub mod error;
pub mod formatter;
pub mod manager;
pub mod session;
pub mod typing;
pub mod ui;
