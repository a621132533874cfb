//! Room directory client against a real server.
//!
//! Verification command: `cargo test --test directory`

use std::time::Duration;

use roomchat::chat::{SyncController, ViewEvent};
use roomchat::directory::{DirectoryError, HttpDirectory, RoomDirectory};
use roomchat::transport::loopback::LoopbackTransport;
use roomchat_proto::envelope::ValidationError;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = roomchat_server::server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start server");
    (format!("http://{addr}"), handle)
}

fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn fresh_server_lists_no_rooms() {
    let (url, _handle) = start_server().await;
    let directory = HttpDirectory::new(&url, TIMEOUT).unwrap();
    assert!(directory.list_rooms().await.unwrap().is_empty());
}

#[tokio::test]
async fn created_rooms_are_listed_sorted() {
    let (url, _handle) = start_server().await;
    let directory = HttpDirectory::new(&url, TIMEOUT).unwrap();

    directory.create_room("random").await.unwrap();
    directory.create_room("general").await.unwrap();
    assert_eq!(
        directory.list_rooms().await.unwrap(),
        vec!["general", "random"]
    );
}

#[tokio::test]
async fn duplicate_create_returns_conflict() {
    let (url, _handle) = start_server().await;
    let directory = HttpDirectory::new(&url, TIMEOUT).unwrap();

    directory.create_room("general").await.unwrap();
    assert!(matches!(
        directory.create_room("general").await,
        Err(DirectoryError::Status(409))
    ));
    assert_eq!(directory.list_rooms().await.unwrap(), vec!["general"]);
}

#[tokio::test]
async fn names_needing_encoding_round_trip() {
    let (url, _handle) = start_server().await;
    let directory = HttpDirectory::new(&url, TIMEOUT).unwrap();

    directory.create_room("lobby #2/b").await.unwrap();
    assert_eq!(directory.list_rooms().await.unwrap(), vec!["lobby #2/b"]);
}

#[tokio::test]
async fn blank_name_fails_before_any_request() {
    // Nothing listens here; a request would fail with a different error.
    let directory = HttpDirectory::new(&unreachable_url(), TIMEOUT).unwrap();
    assert!(matches!(
        directory.create_room("   ").await,
        Err(DirectoryError::Validation(ValidationError::EmptyRoom))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() {
    let directory = HttpDirectory::new(&unreachable_url(), TIMEOUT).unwrap();
    assert!(matches!(
        directory.list_rooms().await,
        Err(DirectoryError::Request(_))
    ));
}

#[tokio::test]
async fn startup_fetch_degrades_to_empty_list() {
    let directory = HttpDirectory::new(&unreachable_url(), TIMEOUT).unwrap();
    let (transport, _events, _peer) = LoopbackTransport::create(4);
    let (controller, mut view) = SyncController::new(transport, directory);

    assert!(controller.load_rooms().await.is_empty());
    assert_eq!(view.recv().await, Some(ViewEvent::RoomListLoaded(vec![])));
}

#[tokio::test]
async fn controller_create_adds_room_to_view() {
    let (url, _handle) = start_server().await;
    let directory = HttpDirectory::new(&url, TIMEOUT).unwrap();
    let (transport, _events, _peer) = LoopbackTransport::create(4);
    let (controller, mut view) = SyncController::new(transport, directory);

    controller.request_create_room("general").await.unwrap();
    assert_eq!(
        view.recv().await,
        Some(ViewEvent::RoomAdded("general".into()))
    );
    assert_eq!(controller.load_rooms().await, vec!["general"]);
}
