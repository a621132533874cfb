//! Chat server core: shared state, WebSocket handler, and the room
//! directory endpoints.
//!
//! Every WebSocket connection becomes a participant with its own writer
//! task. Frames are JSON envelopes: `join` and `leave` change the
//! participant's rooms, and `chat` is fanned out verbatim to everyone in the
//! addressed room, the sender included, provided the sender is a member.
//!
//! The directory lives on plain HTTP:
//! - `GET /rooms` lists room names as a JSON array.
//! - `POST /room/{name}` creates a room (`201`, or `409` if it exists).

use std::sync::Arc;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use roomchat_proto::codec;
use roomchat_proto::envelope::Envelope;

use crate::rooms::{OUTBOX_CAPACITY, Outbox, ParticipantId, RegistryError, RoomRegistry};

/// Default maximum size of one inbound WebSocket message (64 KB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Shared server state.
#[derive(Debug)]
pub struct ServerState {
    /// Rooms and their members.
    pub rooms: RoomRegistry,
    max_message_size: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates state with no rooms and the default message size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Creates state with a custom inbound message size limit.
    #[must_use]
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            max_message_size,
        }
    }
}

/// Starts the server on `addr` with fresh state.
///
/// Pass `127.0.0.1:0` to let the OS pick a port; the bound address is
/// returned together with the server task handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the server with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Builds the axum router for `state`.
pub fn router(state: Arc<ServerState>) -> axum::Router {
    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", get(list_rooms))
        .route("/room/{name}", post(create_room))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn list_rooms(State(state): State<Arc<ServerState>>) -> Json<Vec<String>> {
    Json(state.rooms.list())
}

async fn create_room(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> (StatusCode, String) {
    match state.rooms.create(&name) {
        Ok(()) => (StatusCode::CREATED, "Room created successfully".to_string()),
        Err(e @ RegistryError::AlreadyExists(_)) => {
            tracing::info!(room = %name, "room already exists");
            (StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ RegistryError::InvalidName(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Handles an upgraded WebSocket connection for a single participant.
///
/// On disconnect the participant is removed from every room it joined.
pub async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let participant = Uuid::now_v7();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    tracing::info!(%participant, "participant connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                tracing::warn!(%participant, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_frame(participant, text.as_str(), &tx, &reader_state);
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => handle_frame(participant, text, &tx, &reader_state),
                    Err(e) => tracing::warn!(%participant, error = %e, "non UTF-8 frame"),
                },
                Message::Close(_) => {
                    tracing::debug!(%participant, "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    let left = state.rooms.leave_all(participant);
    tracing::info!(%participant, rooms = ?left, "participant disconnected");
}

/// Applies one inbound frame. Undecodable frames are logged and dropped.
fn handle_frame(participant: ParticipantId, text: &str, outbox: &Outbox, state: &ServerState) {
    let envelope = match codec::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(%participant, error = %e, "ignoring frame");
            return;
        }
    };

    match envelope {
        Envelope::Chat(message) => {
            if !state.rooms.is_member(&message.room, participant) {
                tracing::warn!(%participant, room = %message.room, "chat from non-member dropped");
                return;
            }
            let delivered = state.rooms.broadcast(&message.room, text);
            tracing::debug!(%participant, room = %message.room, delivered, "chat broadcast");
        }
        Envelope::Join { room } => {
            if let Err(e) = state.rooms.join(&room, participant, outbox.clone()) {
                tracing::warn!(%participant, error = %e, "join rejected");
            }
        }
        Envelope::Leave { room } => {
            if !state.rooms.leave(&room, participant) {
                tracing::debug!(%participant, room = %room, "leave for a room not joined");
            }
        }
    }
}
