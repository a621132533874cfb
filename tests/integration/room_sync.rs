//! End-to-end room synchronization through a real server.
//!
//! Two clients run the full stack (`spawn_net` → WebSocket transport →
//! `SyncController`) against an in-process `roomchat-server` and verify:
//! - the room list is seeded at startup and grows on create
//! - chat reaches every member of the room, the sender included
//! - switching rooms leaves the old room on the server side
//! - re-entering a room repaints it from local history
//! - shutdown ends the session cleanly
//!
//! Verification command: `cargo test --test room_sync`

use std::time::Duration;

use tokio::sync::mpsc;

use roomchat::chat::ViewEvent;
use roomchat::net::{self, NetCommand, NetConfig, NetError};
use roomchat_proto::envelope::ChatMessage;

/// Start the server in-process and return its base HTTP URL.
async fn start_server() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = roomchat_server::server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start server");
    (format!("http://{addr}"), handle)
}

struct Client {
    commands: mpsc::Sender<NetCommand>,
    view: mpsc::UnboundedReceiver<ViewEvent>,
}

impl Client {
    /// Connects and consumes the startup events, returning the room list.
    async fn connect(server_url: &str) -> (Self, Vec<String>) {
        let (commands, view) = net::spawn_net(NetConfig::new(server_url))
            .await
            .expect("spawn_net should succeed");
        let mut client = Self { commands, view };

        let ViewEvent::RoomListLoaded(rooms) = client.next_event().await else {
            panic!("expected the room list first");
        };
        assert_eq!(
            client.next_event().await,
            ViewEvent::ConnectionChanged { connected: true }
        );
        (client, rooms)
    }

    async fn next_event(&mut self) -> ViewEvent {
        tokio::time::timeout(Duration::from_secs(5), self.view.recv())
            .await
            .expect("timeout waiting for view event")
            .expect("view channel closed unexpectedly")
    }

    async fn command(&self, command: NetCommand) {
        self.commands.send(command).await.expect("session task gone");
    }

    async fn switch(&mut self, room: &str) -> Vec<ChatMessage> {
        self.command(NetCommand::SwitchRoom { room: room.into() })
            .await;
        match self.next_event().await {
            ViewEvent::RoomRepainted { room: shown, messages } => {
                assert_eq!(shown, room);
                messages
            }
            other => panic!("expected repaint of {room}, got {other:?}"),
        }
    }

    async fn say(&self, content: &str) {
        self.command(NetCommand::SendChat {
            content: content.into(),
        })
        .await;
    }

    async fn next_message(&mut self) -> ChatMessage {
        match self.next_event().await {
            ViewEvent::MessageAppended(message) => message,
            other => panic!("expected a chat message, got {other:?}"),
        }
    }
}

fn contents(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn two_clients_chat_across_room_switches() {
    let (url, _handle) = start_server().await;

    let (mut alice, rooms) = Client::connect(&url).await;
    assert!(rooms.is_empty());

    alice
        .command(NetCommand::CreateRoom {
            room: "general".into(),
        })
        .await;
    assert_eq!(
        alice.next_event().await,
        ViewEvent::RoomAdded("general".into())
    );

    assert!(alice.switch("general").await.is_empty());
    alice.say("alice here").await;
    let echoed = alice.next_message().await;
    assert_eq!(echoed.room, "general");
    assert_eq!(echoed.sender, "User");
    assert_eq!(echoed.content, "alice here");

    let (mut bob, rooms) = Client::connect(&url).await;
    assert_eq!(rooms, vec!["general"]);
    assert!(bob.switch("general").await.is_empty());
    bob.say("bob here").await;
    assert_eq!(bob.next_message().await.content, "bob here");
    assert_eq!(alice.next_message().await.content, "bob here");

    alice.say("hi").await;
    assert_eq!(alice.next_message().await.content, "hi");
    assert_eq!(bob.next_message().await.content, "hi");

    // Alice moves on; nothing in random yet.
    assert!(alice.switch("random").await.is_empty());

    // Bob's message reaches Bob only: Alice left general on the server.
    bob.say("still there?").await;
    assert_eq!(bob.next_message().await.content, "still there?");

    alice.say("ping").await;
    let ping = alice.next_message().await;
    assert_eq!((ping.room.as_str(), ping.content.as_str()), ("random", "ping"));

    // Re-entering general repaints what Alice saw while she was there.
    let replay = alice.switch("general").await;
    assert_eq!(contents(&replay), vec!["alice here", "bob here", "hi"]);
}

#[tokio::test]
async fn rejoining_active_room_still_repaints() {
    let (url, _handle) = start_server().await;
    let (mut alice, _) = Client::connect(&url).await;

    alice.switch("general").await;
    alice.say("once").await;
    alice.next_message().await;

    let replay = alice.switch("general").await;
    assert_eq!(contents(&replay), vec!["once"]);

    // Still a member: a re-join must not have sent a leave.
    alice.say("twice").await;
    assert_eq!(alice.next_message().await.content, "twice");
}

#[tokio::test]
async fn leave_room_stops_delivery() {
    let (url, _handle) = start_server().await;
    let (mut alice, _) = Client::connect(&url).await;
    let (mut bob, _) = Client::connect(&url).await;

    alice.switch("general").await;
    bob.switch("general").await;
    bob.say("sync").await;
    assert_eq!(bob.next_message().await.content, "sync");
    assert_eq!(alice.next_message().await.content, "sync");

    alice.command(NetCommand::LeaveRoom).await;
    assert_eq!(
        alice.next_event().await,
        ViewEvent::RoomLeft {
            room: "general".into()
        }
    );

    bob.say("anyone?").await;
    assert_eq!(bob.next_message().await.content, "anyone?");

    // With no active room, chat is rejected locally.
    alice.say("hello?").await;
    assert_eq!(
        alice.next_event().await,
        ViewEvent::Notice("no active room".into())
    );
}

#[tokio::test]
async fn blank_input_is_rejected_locally() {
    let (url, _handle) = start_server().await;
    let (mut alice, _) = Client::connect(&url).await;

    alice.switch("general").await;
    alice.say("   ").await;
    assert!(matches!(alice.next_event().await, ViewEvent::Notice(_)));

    alice
        .command(NetCommand::SwitchRoom { room: " ".into() })
        .await;
    assert!(matches!(alice.next_event().await, ViewEvent::Notice(_)));

    // Still in general.
    alice.say("real").await;
    assert_eq!(alice.next_message().await.room, "general");
}

#[tokio::test]
async fn duplicate_create_is_reported() {
    let (url, _handle) = start_server().await;
    let (mut alice, _) = Client::connect(&url).await;

    alice
        .command(NetCommand::CreateRoom { room: "dup".into() })
        .await;
    assert_eq!(alice.next_event().await, ViewEvent::RoomAdded("dup".into()));

    alice
        .command(NetCommand::CreateRoom { room: "dup".into() })
        .await;
    assert!(matches!(alice.next_event().await, ViewEvent::Notice(text) if text.contains("409")));

    alice.command(NetCommand::ListRooms).await;
    assert_eq!(
        alice.next_event().await,
        ViewEvent::RoomListLoaded(vec!["dup".into()])
    );
}

#[tokio::test]
async fn shutdown_closes_view_channel() {
    let (url, _handle) = start_server().await;
    let (mut alice, _) = Client::connect(&url).await;

    alice.command(NetCommand::Shutdown).await;
    let closed = tokio::time::timeout(Duration::from_secs(5), alice.view.recv())
        .await
        .expect("timeout waiting for shutdown");
    assert!(closed.is_none());
}

#[tokio::test]
async fn spawn_net_fails_without_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = net::spawn_net(NetConfig::new(format!("http://{addr}"))).await;
    assert!(matches!(result, Err(NetError::Transport(_))));
}

#[tokio::test]
async fn client_binary_exits_nonzero_without_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let log_file = std::env::temp_dir().join(format!("roomchat-exit-{}.log", addr.port()));

    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_roomchat"))
        .arg("--server-url")
        .arg(format!("http://{addr}"))
        .arg("--log-file")
        .arg(&log_file)
        .env_remove("ROOMCHAT_SERVER")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    let status = tokio::time::timeout(Duration::from_secs(15), status)
        .await
        .expect("client binary did not exit")
        .expect("failed to run client binary");

    assert_eq!(status.code(), Some(1));
    let _ = std::fs::remove_file(log_file);
}
