//! Real-time group chat server for the tsudoi learning platform.
//!
//! The server tracks user presence, per-group room membership and typing
//! indicators in memory, and brokers chat mutations (send, edit, delete,
//! react, read receipts) through collaborator interfaces for membership
//! lookup and message persistence.

// layers
pub mod domain;
pub mod infrastructure;
pub mod proto;
pub mod registry;
pub mod ui;
pub mod usecase;
