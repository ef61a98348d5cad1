//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::domain::{
    ChatError, ConnectionId, GroupId, MessageContent, MessageId, MessageKind, Timestamp, UserId,
};
use crate::proto::{ClientCommand, ServerEvent};

use super::state::AppState;

/// Query parameters for the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Authentication happens before the upgrade: a refused connection never
    // enters any tracked state.
    let identity = match state.verifier.verify(&query.token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Rejected WebSocket handshake: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let connection_id = ConnectionId::generate();
    tracing::info!(
        "User '{}' authenticated, upgrading connection '{}'",
        identity.user_id.as_str(),
        connection_id
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity.user_id, connection_id)))
}

/// Spawns a task that drains the per-connection channel into the WebSocket
/// sink. Events from every use case reach this client through that channel.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: UserId,
    connection_id: ConnectionId,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    // Register with the session before pumping: nothing is routed to this
    // channel until a room is joined, so the handshake frames below are
    // guaranteed to arrive first.
    let online = state
        .session
        .connect(user_id.clone(), connection_id, tx)
        .await;

    let connected = ServerEvent::Connected {
        user_id: user_id.clone(),
        connected_at: Timestamp::new(tsudoi_shared::time::now_timestamp()),
    };
    if let Err(e) = sender
        .send(Message::Text(connected.to_json().into()))
        .await
    {
        tracing::error!("Failed to confirm handshake to '{}': {}", user_id.as_str(), e);
        state.session.disconnect(&connection_id).await;
        return;
    }
    let snapshot = ServerEvent::OnlineUsers { user_ids: online };
    if sender
        .send(Message::Text(snapshot.to_json().into()))
        .await
        .is_err()
    {
        state.session.disconnect(&connection_id).await;
        return;
    }

    let state_clone = state.clone();
    let user_id_clone = user_id.clone();

    // Receive commands from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(command) => {
                            dispatch_command(&state_clone, &user_id_clone, connection_id, command)
                                .await
                        }
                        Err(e) => {
                            tracing::warn!("Unparseable command from '{}': {}", connection_id, e);
                            Some(ServerEvent::Error {
                                code: "invalid_command".to_string(),
                                message: e.to_string(),
                            })
                        }
                    };
                    if let Some(event) = reply {
                        // Reply to the requesting connection only.
                        if let Err(e) = state_clone
                            .pusher
                            .push_to(&connection_id, &event.to_json())
                            .await
                        {
                            tracing::warn!("Failed to reply to '{}': {}", connection_id, e);
                        }
                    }
                }
                Message::Ping(_) => {
                    // Handled by the protocol layer.
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If either direction finishes, tear down the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.session.disconnect(&connection_id).await;
    tracing::info!(
        "Connection '{}' ('{}') closed",
        connection_id,
        user_id.as_str()
    );
}

/// Execute a client command. Returns the event to send back to the caller,
/// if any; failures become per-connection error events and are never
/// broadcast.
async fn dispatch_command(
    state: &Arc<AppState>,
    user_id: &UserId,
    connection_id: ConnectionId,
    command: ClientCommand,
) -> Option<ServerEvent> {
    let result = run_command(state, user_id, connection_id, command).await;
    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!("Command from '{}' failed: {}", user_id.as_str(), e);
            Some(ServerEvent::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            })
        }
    }
}

async fn run_command(
    state: &Arc<AppState>,
    user_id: &UserId,
    connection_id: ConnectionId,
    command: ClientCommand,
) -> Result<Option<ServerEvent>, ChatError> {
    match command {
        ClientCommand::Join { group_id } => {
            let group_id = GroupId::new(group_id)?;
            let present = state
                .session
                .join(group_id.clone(), user_id.clone(), connection_id)
                .await?;
            Ok(Some(ServerEvent::Joined { group_id, present }))
        }
        ClientCommand::Leave { group_id } => {
            let group_id = GroupId::new(group_id)?;
            state
                .session
                .leave(group_id.clone(), user_id.clone(), connection_id)
                .await;
            Ok(Some(ServerEvent::Left { group_id }))
        }
        ClientCommand::Send {
            group_id,
            content,
            kind,
            reply_to,
            mentions,
        } => {
            let group_id = GroupId::new(group_id)?;
            let content = MessageContent::new(content)?;
            let reply_to = reply_to.map(MessageId::new).transpose()?;
            let mentions = mentions
                .into_iter()
                .map(UserId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let message = state
                .broker
                .send(
                    group_id,
                    user_id.clone(),
                    connection_id,
                    content,
                    kind.unwrap_or(MessageKind::Text),
                    reply_to,
                    mentions,
                )
                .await?;
            Ok(Some(ServerEvent::MessageAck { message }))
        }
        ClientCommand::Edit {
            group_id,
            message_id,
            content,
        } => {
            state
                .broker
                .edit(
                    GroupId::new(group_id)?,
                    MessageId::new(message_id)?,
                    user_id.clone(),
                    MessageContent::new(content)?,
                )
                .await?;
            // The sender sees the edit through the room broadcast.
            Ok(None)
        }
        ClientCommand::Delete {
            group_id,
            message_id,
        } => {
            state
                .broker
                .delete(
                    GroupId::new(group_id)?,
                    MessageId::new(message_id)?,
                    user_id.clone(),
                )
                .await?;
            Ok(None)
        }
        ClientCommand::React {
            group_id,
            message_id,
            emoji,
        } => {
            state
                .broker
                .toggle_reaction(
                    GroupId::new(group_id)?,
                    MessageId::new(message_id)?,
                    user_id.clone(),
                    emoji,
                )
                .await?;
            Ok(None)
        }
        ClientCommand::MarkRead {
            group_id,
            message_ids,
        } => {
            let message_ids = message_ids
                .into_iter()
                .map(MessageId::new)
                .collect::<Result<Vec<_>, _>>()?;
            state
                .broker
                .mark_read(
                    GroupId::new(group_id)?,
                    message_ids,
                    user_id.clone(),
                    connection_id,
                )
                .await?;
            Ok(None)
        }
        ClientCommand::Typing {
            group_id,
            is_typing,
        } => {
            state
                .typing
                .set_typing(
                    GroupId::new(group_id)?,
                    user_id.clone(),
                    connection_id,
                    is_typing,
                )
                .await?;
            Ok(None)
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
