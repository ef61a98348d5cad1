//! One physical WebSocket session.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
};

use tsudoi_server::proto::{ClientCommand, ServerEvent};

use crate::error::ClientError;

/// A live connection: an event stream in, a command channel out.
///
/// Both pump tasks stop when the socket closes; the event receiver then
/// yields `None`, which the connection manager treats as connection loss.
pub struct ClientSession {
    /// User id confirmed by the server's handshake event.
    pub user_id: String,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    commands: mpsc::UnboundedSender<ClientCommand>,
    read_task: tokio::task::JoinHandle<()>,
    write_task: tokio::task::JoinHandle<()>,
}

impl ClientSession {
    /// Connect and complete the handshake.
    ///
    /// The session is only considered established once the server's
    /// `connected` event arrives; an upgrade that never confirms is a
    /// connection error, not a session.
    pub async fn establish(url: &str, token: &str) -> Result<Self, ClientError> {
        let url = format!("{}?token={}", url, token);

        let (ws_stream, _response) = match connect_async(&url).await {
            Ok(result) => result,
            Err(tungstenite::Error::Http(response))
                if response.status() == tungstenite::http::StatusCode::UNAUTHORIZED =>
            {
                return Err(ClientError::AuthenticationFailed);
            }
            Err(e) => return Err(ClientError::ConnectionError(e.to_string())),
        };

        let (mut write, mut read) = ws_stream.split();

        // Handshake: the first event must confirm the connection.
        let first = match read.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str::<ServerEvent>(&text)
                .map_err(|e| ClientError::ConnectionError(format!("bad handshake: {}", e)))?,
            Some(Ok(other)) => {
                return Err(ClientError::ConnectionError(format!(
                    "unexpected handshake frame: {:?}",
                    other
                )));
            }
            Some(Err(e)) => return Err(ClientError::ConnectionError(e.to_string())),
            None => {
                return Err(ClientError::ConnectionError(
                    "closed before handshake".to_string(),
                ));
            }
        };
        let ServerEvent::Connected { user_id, .. } = first else {
            return Err(ClientError::ConnectionError(
                "server did not confirm the connection".to_string(),
            ));
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<ClientCommand>();

        // Pump incoming frames into the event channel.
        let read_task = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Skipping unparseable event: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
        });

        // Pump outbound commands onto the socket.
        let write_task = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let json = match serde_json::to_string(&command) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize command: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::warn!("Failed to send command: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            user_id: user_id.as_str().to_string(),
            events: event_rx,
            commands: command_tx,
            read_task,
            write_task,
        })
    }

    /// Next server event, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Queue a command for sending.
    pub fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Tear the session down immediately.
    pub fn shutdown(&self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
