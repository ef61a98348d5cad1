//! Shared utilities for the tsudoi chat application.
//!
//! Logging setup and time helpers used by both the server and the client.

pub mod logger;
pub mod time;
