//! Group chat WebSocket server.
//!
//! Authenticates connections by static token, tracks presence and room
//! membership, and broadcasts chat events to subscribed clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsudoi-server -- \
//!     --token alice=secret-a --token bob=secret-b \
//!     --member rust-study:alice --member rust-study:bob
//! ```

use std::{collections::HashMap, sync::Arc};

use clap::Parser;
use tsudoi_server::{
    domain::{GroupId, Role, UserId},
    infrastructure::{
        InMemoryGroupActivity, InMemoryGroupDirectory, InMemoryMessageStore, StaticTokenVerifier,
        WebSocketMessagePusher,
    },
    registry::{PresenceRegistry, RoomTracker, TypingTracker},
    ui::Server,
    usecase::{ChatBroker, SessionUseCase, TypingUseCase},
};
use tsudoi_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Group chat WebSocket server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Static auth token, as `user=secret`. Repeatable.
    #[arg(long = "token", value_name = "USER=SECRET")]
    tokens: Vec<String>,

    /// Group membership grant, as `group:user` or `group:user:role`
    /// (role is one of member, moderator, owner). Repeatable.
    #[arg(long = "member", value_name = "GROUP:USER[:ROLE]")]
    members: Vec<String>,
}

fn parse_token(raw: &str) -> Result<(String, UserId), String> {
    let (user, secret) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected user=secret, got '{}'", raw))?;
    let user_id = UserId::new(user.to_string()).map_err(|e| e.to_string())?;
    Ok((secret.to_string(), user_id))
}

fn parse_member(raw: &str) -> Result<(GroupId, UserId, Role), String> {
    let mut parts = raw.splitn(3, ':');
    let group = parts
        .next()
        .ok_or_else(|| format!("expected group:user, got '{}'", raw))?;
    let user = parts
        .next()
        .ok_or_else(|| format!("expected group:user, got '{}'", raw))?;
    let role = match parts.next() {
        None | Some("member") => Role::Member,
        Some("moderator") => Role::Moderator,
        Some("owner") => Role::Owner,
        Some(other) => return Err(format!("unknown role '{}'", other)),
    };
    let group_id = GroupId::new(group.to_string()).map_err(|e| e.to_string())?;
    let user_id = UserId::new(user.to_string()).map_err(|e| e.to_string())?;
    Ok((group_id, user_id, role))
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Clock, registries
    // 2. Infrastructure (verifier, directory, store, activity, pusher)
    // 3. UseCases
    // 4. Server

    // 1. Clock and in-memory registries
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let presence = Arc::new(PresenceRegistry::new());
    let rooms = Arc::new(RoomTracker::new());
    let typing_tracker = Arc::new(TypingTracker::new());

    // 2. Infrastructure
    let mut tokens = HashMap::new();
    for raw in &args.tokens {
        match parse_token(raw) {
            Ok((secret, user_id)) => {
                tokens.insert(secret, user_id);
            }
            Err(e) => {
                eprintln!("Invalid --token argument: {}", e);
                std::process::exit(1);
            }
        }
    }
    if tokens.is_empty() {
        tracing::warn!("No --token arguments given; every connection will be rejected");
    }
    let verifier = Arc::new(StaticTokenVerifier::new(tokens));

    let directory = Arc::new(InMemoryGroupDirectory::new());
    for raw in &args.members {
        match parse_member(raw) {
            Ok((group_id, user_id, role)) => {
                directory.grant(group_id, user_id, role).await;
            }
            Err(e) => {
                eprintln!("Invalid --member argument: {}", e);
                std::process::exit(1);
            }
        }
    }

    let store = Arc::new(InMemoryMessageStore::new());
    let activity = Arc::new(InMemoryGroupActivity::new(clock.clone()));
    let pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create UseCases
    let session = Arc::new(SessionUseCase::new(
        directory.clone(),
        pusher.clone(),
        presence.clone(),
        rooms.clone(),
        typing_tracker.clone(),
        clock.clone(),
    ));
    let broker = Arc::new(ChatBroker::new(
        directory.clone(),
        store,
        activity,
        pusher.clone(),
        presence,
        rooms.clone(),
        clock,
    ));
    let typing = Arc::new(TypingUseCase::new(
        pusher.clone(),
        rooms,
        typing_tracker,
    ));

    // 4. Create and run the server
    let server = Server::new(verifier, pusher, session, broker, typing);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
