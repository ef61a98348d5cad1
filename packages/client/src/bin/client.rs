//! Group chat terminal client.
//!
//! Connects to a tsudoi server, joins groups and chats from stdin. Plain
//! lines are sent to the active group; slash commands drive everything
//! else. Message sends count as typing activity: the first send of a burst
//! emits a typing start, and the stop follows one second after the last.
//! Each burst is scoped to one group; sending to another group stops the
//! old burst first.
//!
//! Reconnects automatically with exponential backoff (500 ms doubling up to
//! 30 s, 8 attempts) and rejoins every group on success.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsudoi-client -- --token alice-secret --group rust-study
//! ```

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use tsudoi_client::{
    error::ClientError,
    formatter::EventFormatter,
    manager::ConnectionManager,
    typing::{TypingSignal, TypingThrottle},
    ui::redisplay_prompt,
};
use tsudoi_server::proto::{ClientCommand, ServerEvent};
use tsudoi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Group chat terminal client", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Authentication token
    #[arg(short = 't', long)]
    token: String,

    /// Group to join on startup
    #[arg(short = 'g', long)]
    group: Option<String>,
}

/// Turn an input line into a command. Plain lines become sends to the
/// active group; prints usage hints for malformed slash commands.
fn parse_line(line: &str, active_group: Option<&str>) -> Option<ClientCommand> {
    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.splitn(3, ' ');
        let verb = parts.next().unwrap_or("");
        match verb {
            "join" => match parts.next() {
                Some(group) => Some(ClientCommand::Join {
                    group_id: group.to_string(),
                }),
                None => {
                    println!("usage: /join <group>");
                    None
                }
            },
            "leave" => match parts.next().or(active_group) {
                Some(group) => Some(ClientCommand::Leave {
                    group_id: group.to_string(),
                }),
                None => {
                    println!("usage: /leave <group>");
                    None
                }
            },
            "edit" => match (active_group, parts.next(), parts.next()) {
                (Some(group), Some(message_id), Some(content)) => Some(ClientCommand::Edit {
                    group_id: group.to_string(),
                    message_id: message_id.to_string(),
                    content: content.to_string(),
                }),
                _ => {
                    println!("usage (in a group): /edit <message-id> <new content>");
                    None
                }
            },
            "delete" => match (active_group, parts.next()) {
                (Some(group), Some(message_id)) => Some(ClientCommand::Delete {
                    group_id: group.to_string(),
                    message_id: message_id.to_string(),
                }),
                _ => {
                    println!("usage (in a group): /delete <message-id>");
                    None
                }
            },
            "react" => match (active_group, parts.next(), parts.next()) {
                (Some(group), Some(message_id), Some(emoji)) => Some(ClientCommand::React {
                    group_id: group.to_string(),
                    message_id: message_id.to_string(),
                    emoji: emoji.to_string(),
                }),
                _ => {
                    println!("usage (in a group): /react <message-id> <emoji>");
                    None
                }
            },
            "read" => match (active_group, parts.next()) {
                (Some(group), Some(ids)) => Some(ClientCommand::MarkRead {
                    group_id: group.to_string(),
                    message_ids: ids.split(',').map(str::to_string).collect(),
                }),
                _ => {
                    println!("usage (in a group): /read <message-id>[,<message-id>...]");
                    None
                }
            },
            _ => {
                println!(
                    "commands: /join /leave /edit /delete /react /read; plain lines send to the active group"
                );
                None
            }
        }
    } else {
        match active_group {
            Some(group) => Some(ClientCommand::Send {
                group_id: group.to_string(),
                content: line.to_string(),
                kind: None,
                reply_to: None,
                mentions: Vec::new(),
            }),
            None => {
                println!("join a group first: /join <group>");
                None
            }
        }
    }
}

/// Render one server event.
fn display_event(event: &ServerEvent, current_user: &str) -> String {
    match event {
        ServerEvent::Connected { user_id, .. } => {
            format!("\nConnected as '{}'\n", user_id.as_str())
        }
        ServerEvent::OnlineUsers { user_ids } => {
            EventFormatter::format_online_users(user_ids, current_user)
        }
        ServerEvent::UserOnline { user_id } => EventFormatter::format_user_online(user_id),
        ServerEvent::UserOffline { user_id, last_seen } => {
            EventFormatter::format_user_offline(user_id, *last_seen)
        }
        ServerEvent::Joined { group_id, present } => {
            EventFormatter::format_joined(group_id.as_str(), present)
        }
        ServerEvent::UserJoined { group_id, user_id } => {
            EventFormatter::format_user_joined(group_id.as_str(), user_id)
        }
        ServerEvent::Left { group_id } => EventFormatter::format_left(group_id.as_str()),
        ServerEvent::UserLeft { group_id, user_id } => {
            EventFormatter::format_user_left(group_id.as_str(), user_id)
        }
        ServerEvent::MessageAck { message } => EventFormatter::format_ack(message),
        ServerEvent::NewMessage { message } | ServerEvent::MessageEdited { message } => {
            EventFormatter::format_message(message)
        }
        ServerEvent::MessageDeleted {
            group_id,
            message_id,
        } => EventFormatter::format_deleted(group_id.as_str(), message_id.as_str()),
        ServerEvent::ReactionUpdated {
            message_id,
            reactions,
            ..
        } => EventFormatter::format_reactions(message_id.as_str(), reactions),
        ServerEvent::MessagesRead {
            group_id,
            message_ids,
            receipt,
        } => EventFormatter::format_read(group_id.as_str(), message_ids.len(), receipt),
        ServerEvent::Typing {
            group_id,
            user_id,
            is_typing,
        } => EventFormatter::format_typing(group_id.as_str(), user_id, *is_typing),
        ServerEvent::Mention {
            group_id,
            sender_id,
            preview,
            ..
        } => EventFormatter::format_mention(group_id.as_str(), sender_id, preview),
        ServerEvent::Error { code, message } => EventFormatter::format_error(code, message),
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let mut manager = ConnectionManager::new(args.url, args.token);
    if let Err(e) = manager.connect().await {
        tracing::error!("Could not connect: {}", e);
        std::process::exit(1);
    }
    let current_user = manager.user_id().unwrap_or("me").to_string();
    let prompt = format!("{}> ", current_user);

    println!(
        "\nYou are '{}'. /join a group, then type messages. Press Ctrl+C to exit.\n",
        current_user
    );

    if let Some(group) = args.group {
        if let Err(e) = manager.send(ClientCommand::Join { group_id: group }) {
            tracing::error!("Failed to join group: {}", e);
        }
    }

    // Blocking thread for rustyline; lines flow through a channel.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt_for_readline = prompt.clone();
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt_for_readline) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    let mut active_group: Option<String> = None;
    let mut throttle = TypingThrottle::new();
    // (group, generation) of the armed typing idle timer, if any
    let mut armed_idle: Option<(String, u64)> = None;
    let idle_timer = tokio::time::sleep(throttle.idle_window());
    tokio::pin!(idle_timer);

    loop {
        tokio::select! {
            event = manager.next_event() => {
                let event = match event {
                    Ok(event) => event,
                    Err(ClientError::RetriesExhausted(attempts)) => {
                        tracing::error!("Connection lost for good after {} attempts", attempts);
                        std::process::exit(1);
                    }
                    Err(e) => {
                        tracing::error!("Connection failed: {}", e);
                        std::process::exit(1);
                    }
                };
                if let ServerEvent::Joined { group_id, .. } = &event {
                    active_group = Some(group_id.as_str().to_string());
                }
                if let ServerEvent::Left { group_id } = &event {
                    if active_group.as_deref() == Some(group_id.as_str()) {
                        active_group = manager.joined_groups().next().map(str::to_string);
                    }
                }
                print!("{}", display_event(&event, &current_user));
                redisplay_prompt(&prompt);
            }
            line = input_rx.recv() => {
                let Some(line) = line else {
                    // Readline thread ended (Ctrl+C / Ctrl+D)
                    break;
                };
                let Some(command) = parse_line(&line, active_group.as_deref()) else {
                    redisplay_prompt(&prompt);
                    continue;
                };
                if let ClientCommand::Send { group_id, .. } = &command {
                    // Signal typing around the send, one start per burst.
                    let group_id = group_id.clone();
                    let signal = throttle.keystroke(&group_id);
                    match &signal {
                        TypingSignal::Start(_) => {
                            let _ = manager.send(ClientCommand::Typing {
                                group_id: group_id.clone(),
                                is_typing: true,
                            });
                        }
                        TypingSignal::Switch { previous, .. } => {
                            let _ = manager.send(ClientCommand::Typing {
                                group_id: previous.clone(),
                                is_typing: false,
                            });
                            let _ = manager.send(ClientCommand::Typing {
                                group_id: group_id.clone(),
                                is_typing: true,
                            });
                        }
                        TypingSignal::Refresh(_) => {}
                    }
                    armed_idle = Some((group_id, signal.generation()));
                    idle_timer.as_mut().reset(tokio::time::Instant::now() + throttle.idle_window());
                }
                if let Err(e) = manager.send(command) {
                    println!("{}", EventFormatter::format_error("client", &e.to_string()));
                    redisplay_prompt(&prompt);
                }
            }
            _ = &mut idle_timer, if armed_idle.is_some() => {
                if let Some((group_id, generation)) = armed_idle.take() {
                    if throttle.idle_expired(generation) {
                        let _ = manager.send(ClientCommand::Typing {
                            group_id,
                            is_typing: false,
                        });
                    }
                }
            }
        }
    }

    tracing::info!("Client session ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_sends_to_active_group() {
        // given / when:
        let command = parse_line("hello there", Some("rust-study"));

        // then:
        assert!(matches!(
            command,
            Some(ClientCommand::Send { group_id, content, .. })
                if group_id == "rust-study" && content == "hello there"
        ));
    }

    #[test]
    fn test_plain_line_without_group_is_rejected() {
        // given / when / then:
        assert!(parse_line("hello", None).is_none());
    }

    #[test]
    fn test_join_command() {
        // given / when:
        let command = parse_line("/join rust-study", None);

        // then:
        assert!(matches!(
            command,
            Some(ClientCommand::Join { group_id }) if group_id == "rust-study"
        ));
    }

    #[test]
    fn test_edit_keeps_content_spaces() {
        // given / when:
        let command = parse_line("/edit m-1 fixed the typo now", Some("rust-study"));

        // then: everything after the id is the new content
        assert!(matches!(
            command,
            Some(ClientCommand::Edit { message_id, content, .. })
                if message_id == "m-1" && content == "fixed the typo now"
        ));
    }

    #[test]
    fn test_read_splits_comma_separated_ids() {
        // given / when:
        let command = parse_line("/read m-1,m-2,m-3", Some("rust-study"));

        // then:
        assert!(matches!(
            command,
            Some(ClientCommand::MarkRead { message_ids, .. }) if message_ids.len() == 3
        ));
    }
}
