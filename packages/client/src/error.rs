//! Client-side error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the handshake token. Never retried.
    #[error("Authentication failed: the server rejected the token")]
    AuthenticationFailed,

    /// Transport-level failure on an established or establishing connection.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An outbound command was attempted while no session is live.
    #[error("Not connected to the server")]
    NotConnected,

    /// The reconnect budget ran out.
    #[error("Gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),
}
