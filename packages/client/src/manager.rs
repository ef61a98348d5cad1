//! Connection lifecycle management.
//!
//! Owns the reconnect loop: exponential backoff with a bounded retry
//! budget, resubscription to every group the user had joined, and fail-fast
//! rejection of outbound commands while no session is live.

use std::collections::BTreeSet;

use tsudoi_server::proto::{ClientCommand, ServerEvent};

use crate::{
    backoff::{MAX_RECONNECT_ATTEMPTS, next_delay},
    error::ClientError,
    session::ClientSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

pub struct ConnectionManager {
    url: String,
    token: String,
    state: ConnectionState,
    session: Option<ClientSession>,
    /// Groups the user is subscribed to, rejoined after every reconnect.
    groups: BTreeSet<String>,
    /// Monotonic label for the current session; a new value per established
    /// connection keeps log lines and stale timers attributable.
    session_seq: u64,
}

impl ConnectionManager {
    pub fn new(url: String, token: String) -> Self {
        Self {
            url,
            token,
            state: ConnectionState::Disconnected,
            session: None,
            groups: BTreeSet::new(),
            session_seq: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// User id confirmed by the server, once connected.
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    /// Establish the initial connection. Authentication failures are
    /// terminal; transport failures go through the backoff schedule.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.state = ConnectionState::Connecting;
        match ClientSession::establish(&self.url, &self.token).await {
            Ok(session) => {
                self.install(session);
                Ok(())
            }
            Err(ClientError::AuthenticationFailed) => {
                self.state = ConnectionState::Disconnected;
                Err(ClientError::AuthenticationFailed)
            }
            Err(e) => {
                tracing::warn!("Initial connection failed: {}", e);
                self.reconnect().await
            }
        }
    }

    /// Queue an outbound command. Fails fast with
    /// [`ClientError::NotConnected`] while no session is live; commands are
    /// never buffered across reconnects.
    pub fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        if self.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        if session.send(command).is_err() {
            // Writer already gone; the event loop will notice and reconnect.
            self.state = ConnectionState::Reconnecting;
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }

    /// Next server event. Transparently reconnects (with resubscription)
    /// when the session drops; returns `RetriesExhausted` when the budget
    /// runs out and `AuthenticationFailed` if the token stops being
    /// accepted.
    pub async fn next_event(&mut self) -> Result<ServerEvent, ClientError> {
        loop {
            let Some(session) = self.session.as_mut() else {
                return Err(ClientError::NotConnected);
            };
            match session.next_event().await {
                Some(event) => {
                    self.track_membership(&event);
                    return Ok(event);
                }
                None => {
                    tracing::warn!("Session #{} lost, reconnecting", self.session_seq);
                    self.state = ConnectionState::Reconnecting;
                    self.reconnect().await?;
                }
            }
        }
    }

    /// Backoff loop. The attempt counter resets only by leaving this loop,
    /// which requires a server-confirmed handshake.
    async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.drop_session();

        let mut attempt = 0;
        loop {
            if attempt >= MAX_RECONNECT_ATTEMPTS {
                self.state = ConnectionState::Disconnected;
                return Err(ClientError::RetriesExhausted(attempt));
            }
            let delay = next_delay(attempt);
            tracing::info!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                MAX_RECONNECT_ATTEMPTS
            );
            tokio::time::sleep(delay).await;

            match ClientSession::establish(&self.url, &self.token).await {
                Ok(session) => {
                    self.install(session);
                    self.resubscribe();
                    return Ok(());
                }
                Err(ClientError::AuthenticationFailed) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(ClientError::AuthenticationFailed);
                }
                Err(e) => {
                    tracing::warn!("Reconnect attempt {} failed: {}", attempt + 1, e);
                    attempt += 1;
                }
            }
        }
    }

    fn install(&mut self, session: ClientSession) {
        self.session_seq += 1;
        tracing::info!(
            "Session #{} established as '{}'",
            self.session_seq,
            session.user_id
        );
        self.session = Some(session);
        self.state = ConnectionState::Connected;
    }

    fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }

    /// Re-issue a join for every group tracked before the drop. Join is
    /// idempotent server-side, so a race with an in-flight join is harmless.
    fn resubscribe(&mut self) {
        let groups: Vec<String> = self.groups.iter().cloned().collect();
        for group_id in groups {
            tracing::info!("Rejoining group '{}'", group_id);
            if let Err(e) = self.send(ClientCommand::Join {
                group_id: group_id.clone(),
            }) {
                tracing::warn!("Failed to rejoin '{}': {}", group_id, e);
            }
        }
    }

    /// Keep the local group set in step with server-confirmed joins and
    /// leaves.
    fn track_membership(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Joined { group_id, .. } => {
                self.groups.insert(group_id.as_str().to_string());
            }
            ServerEvent::Left { group_id } => {
                self.groups.remove(group_id.as_str());
            }
            _ => {}
        }
    }

    /// Groups currently tracked for resubscription.
    pub fn joined_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}
