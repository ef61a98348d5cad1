//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::domain::{MessagePusher, TokenVerifier};
use crate::usecase::{ChatBroker, SessionUseCase, TypingUseCase};

use super::{
    handler::{health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket chat server.
///
/// Encapsulates the wired-up use cases and runs the axum application.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(verifier, pusher, session, broker, typing);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    verifier: Arc<dyn TokenVerifier>,
    pusher: Arc<dyn MessagePusher>,
    session: Arc<SessionUseCase>,
    broker: Arc<ChatBroker>,
    typing: Arc<TypingUseCase>,
}

impl Server {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        pusher: Arc<dyn MessagePusher>,
        session: Arc<SessionUseCase>,
        broker: Arc<ChatBroker>,
        typing: Arc<TypingUseCase>,
    ) -> Self {
        Self {
            verifier,
            pusher,
            session,
            broker,
            typing,
        }
    }

    /// Build the axum router. Exposed separately so integration tests can
    /// serve the application on an ephemeral port.
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            verifier: self.verifier,
            pusher: self.pusher,
            session: self.session,
            broker: self.broker,
            typing: self.typing,
        });

        Router::new()
            // WebSocket endpoint
            .route("/ws", get(websocket_handler))
            // HTTP endpoints
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the WebSocket chat server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "WebSocket chat server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws?token=<token>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
