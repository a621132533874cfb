//! `RoomChat` -- line-mode multi-room chat client.
//!
//! Connects to a chat server, prints the room list, and reads commands from
//! stdin. Configuration via CLI flags, environment variables, or config file
//! (`~/.config/roomchat/config.toml`).
//!
//! ```bash
//! cargo run --bin roomchat -- --server-url http://127.0.0.1:8080
//!
//! # Or via environment variables
//! ROOMCHAT_SERVER=http://127.0.0.1:8080 cargo run --bin roomchat
//! ```
//!
//! Input: `/join <room>`, `/leave`, `/create <room>`, `/rooms`, `/quit`;
//! anything else is sent as chat to the active room.

use std::io;
use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use roomchat::chat::ViewEvent;
use roomchat::config::{CliArgs, ClientConfig};
use roomchat::net::{self, NetCommand};
use roomchat_proto::envelope::ChatMessage;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(server = %config.server_url, "roomchat starting");

    let (cmd_tx, view_rx) = match net::spawn_net(config.to_net_config()).await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!(error = %e, "could not connect");
            eprintln!("Could not connect to {}: {e}", config.server_url);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let result = run_front_end(cmd_tx, view_rx).await;
    tracing::info!("roomchat exiting");
    drop(log_guard);
    result
}

/// Initialize file-based logging.
///
/// Logs go to a file so stdout stays clean for the chat view. Returns a
/// [`WorkerGuard`] that must be held until shutdown to flush buffered entries.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("roomchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// One parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(NetCommand),
    Quit,
    Usage(&'static str),
    Blank,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('/') else {
        if line.trim().is_empty() {
            return Input::Blank;
        }
        return Input::Command(NetCommand::SendChat {
            content: line.to_string(),
        });
    };

    let (verb, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(v, a)| (v, a.trim()));
    match verb {
        "join" if !arg.is_empty() => Input::Command(NetCommand::SwitchRoom {
            room: arg.to_string(),
        }),
        "join" => Input::Usage("usage: /join <room>"),
        "create" if !arg.is_empty() => Input::Command(NetCommand::CreateRoom {
            room: arg.to_string(),
        }),
        "create" => Input::Usage("usage: /create <room>"),
        "leave" => Input::Command(NetCommand::LeaveRoom),
        "rooms" => Input::Command(NetCommand::ListRooms),
        "quit" | "exit" => Input::Quit,
        _ => Input::Usage("commands: /join <room>, /leave, /create <room>, /rooms, /quit"),
    }
}

/// Read stdin lines and print view events until `/quit`, EOF, or the
/// session ends.
async fn run_front_end(
    cmd_tx: mpsc::Sender<NetCommand>,
    mut view_rx: mpsc::UnboundedReceiver<ViewEvent>,
) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = cmd_tx.send(NetCommand::Shutdown).await;
                    return Ok(());
                };
                match parse_input(&line) {
                    Input::Command(cmd) => {
                        if cmd_tx.send(cmd).await.is_err() {
                            println!("* session ended");
                            return Ok(());
                        }
                    }
                    Input::Quit => {
                        let _ = cmd_tx.send(NetCommand::Shutdown).await;
                        return Ok(());
                    }
                    Input::Usage(text) => println!("* {text}"),
                    Input::Blank => {}
                }
            }
            event = view_rx.recv() => {
                let Some(event) = event else {
                    println!("* session ended");
                    return Ok(());
                };
                for line in render(&event) {
                    println!("{line}");
                }
            }
        }
    }
}

fn render(event: &ViewEvent) -> Vec<String> {
    match event {
        ViewEvent::MessageAppended(message) => vec![format_message(message)],
        ViewEvent::RoomRepainted { room, messages } => {
            let mut out = vec![format!("--- #{room} ---")];
            out.extend(messages.iter().map(format_message));
            out
        }
        ViewEvent::RoomLeft { room } => vec![format!("* left #{room}")],
        ViewEvent::RoomListLoaded(rooms) if rooms.is_empty() => {
            vec!["* no rooms yet, /create one".to_string()]
        }
        ViewEvent::RoomListLoaded(rooms) => vec![format!("* rooms: {}", rooms.join(", "))],
        ViewEvent::RoomAdded(room) => vec![format!("* room #{room} created")],
        ViewEvent::ConnectionChanged { connected: true } => vec!["* connected".to_string()],
        ViewEvent::ConnectionChanged { connected: false } => {
            vec!["* disconnected".to_string()]
        }
        ViewEvent::Notice(text) => vec![format!("* {text}")],
    }
}

fn format_message(message: &ChatMessage) -> String {
    let time = message.timestamp.map_or_else(
        || "--:--".to_string(),
        |ts| ts.with_timezone(&chrono::Local).format("%H:%M").to_string(),
    );
    format!("[{time}] {}: {}", message.sender, message.content)
}
