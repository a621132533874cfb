//! Session runtime wiring the front end to the chat server.
//!
//! [`spawn_net`] opens the WebSocket session, builds the HTTP room
//! directory, and hands both to a [`SyncController`] that runs in a single
//! background task. The front end talks to that task through channels:
//!
//! ```text
//! front end  ─── NetCommand ──→  session task  ←── TransportEvent ─── socket
//!            ←── ViewEvent  ───
//! ```
//!
//! The session task `select!`s over transport events and commands, so every
//! reaction runs to completion before the next one starts.

use std::time::Duration;

use tokio::sync::mpsc;
use url::Url;

use crate::chat::{SyncController, ViewEvent};
use crate::directory::{DirectoryError, HttpDirectory, RoomDirectory};
use crate::transport::websocket::WebSocketTransport;
use crate::transport::{Transport, TransportError, TransportEvent};

/// Commands sent from the front end to the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCommand {
    /// Send a chat message to the active room.
    SendChat {
        /// Message text.
        content: String,
    },
    /// Make `room` the active room.
    SwitchRoom {
        /// Target room.
        room: String,
    },
    /// Leave the active room.
    LeaveRoom,
    /// Ask the directory to create `room`.
    CreateRoom {
        /// Room to create.
        room: String,
    },
    /// Refetch the room list.
    ListRooms,
    /// Stop the session task.
    Shutdown,
}

/// Errors raised while starting a session.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The server URL cannot be turned into a WebSocket endpoint.
    #[error("invalid server URL {0}")]
    InvalidUrl(String),

    /// The WebSocket session could not be opened.
    #[error("connection failed: {0}")]
    Transport(#[from] TransportError),

    /// The directory client could not be built.
    #[error("directory setup failed: {0}")]
    Directory(#[from] DirectoryError),
}

/// Configuration for the networking layer.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Base HTTP(S) URL of the chat server (e.g. `http://127.0.0.1:8080`).
    pub server_url: String,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Timeout for each directory request.
    pub request_timeout: Duration,
    /// Capacity for the command and transport event channels.
    pub channel_capacity: usize,
    /// Per-room history cap; `None` keeps everything.
    pub max_messages_per_room: Option<usize>,
}

impl NetConfig {
    /// Creates a `NetConfig` for `server_url` with default timeouts and capacities.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            channel_capacity: 256,
            max_messages_per_room: None,
        }
    }

    /// The WebSocket endpoint for the configured server.
    ///
    /// `http` maps to `ws`, `https` to `wss`, and `/ws` is appended to the
    /// base path. `ws`/`wss` URLs keep their scheme.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidUrl`] for unparsable URLs or other schemes.
    pub fn websocket_url(&self) -> Result<String, NetError> {
        let invalid = || NetError::InvalidUrl(self.server_url.clone());
        let mut url = Url::parse(&self.server_url).map_err(|_| invalid())?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            _ => return Err(invalid()),
        };
        url.set_scheme(scheme).map_err(|()| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .push("ws");
        Ok(url.into())
    }
}

/// Connect to the server and spawn the session task.
///
/// On success the view receiver first sees the connection come up, then
/// the room list fetched from the directory.
///
/// # Errors
///
/// Returns [`NetError`] if the URL is invalid or the WebSocket handshake
/// fails. The caller decides whether to retry; nothing is retried here.
pub async fn spawn_net(
    config: NetConfig,
) -> Result<(mpsc::Sender<NetCommand>, mpsc::UnboundedReceiver<ViewEvent>), NetError> {
    let ws_url = config.websocket_url()?;
    let directory = HttpDirectory::new(&config.server_url, config.request_timeout)?;
    let (transport, transport_events) =
        WebSocketTransport::connect(&ws_url, config.connect_timeout, config.channel_capacity)
            .await?;

    let (controller, view_rx) =
        SyncController::with_history_limit(transport, directory, config.max_messages_per_room);
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity.max(1));

    tokio::spawn(run_session(controller, transport_events, cmd_rx));
    Ok((cmd_tx, view_rx))
}

/// Drive `controller` until a [`NetCommand::Shutdown`] arrives or the
/// command channel closes.
///
/// Fetches the room list once at startup. After the transport's event
/// stream ends, commands are still accepted so rejected intents reach the
/// user as notices.
pub async fn run_session<T: Transport, D: RoomDirectory>(
    mut controller: SyncController<T, D>,
    mut transport_events: mpsc::Receiver<TransportEvent>,
    mut commands: mpsc::Receiver<NetCommand>,
) {
    controller.load_rooms().await;
    let mut events_open = true;

    loop {
        tokio::select! {
            event = transport_events.recv(), if events_open => match event {
                Some(event) => controller.handle_transport_event(event),
                None => {
                    events_open = false;
                    if controller.is_connected() {
                        controller.on_connection_closed();
                    }
                }
            },
            command = commands.recv() => match command {
                Some(NetCommand::Shutdown) | None => {
                    tracing::info!("session task shutting down");
                    break;
                }
                Some(command) => handle_command(&mut controller, command).await,
            },
        }
    }
}

async fn handle_command<T: Transport, D: RoomDirectory>(
    controller: &mut SyncController<T, D>,
    command: NetCommand,
) {
    let result = match command {
        NetCommand::SendChat { content } => controller.send_chat(&content),
        NetCommand::SwitchRoom { room } => controller.switch_room(&room).map(drop),
        NetCommand::LeaveRoom => controller.leave_room().map(drop),
        NetCommand::CreateRoom { room } => controller.request_create_room(&room).await,
        NetCommand::ListRooms => {
            controller.load_rooms().await;
            Ok(())
        }
        NetCommand::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "command rejected");
        controller.report(&e);
    }
}
