//! Load simulator against an in-process server.
//!
//! Verification command: `cargo test --test load`

use std::sync::Arc;
use std::time::Duration;

use roomchat::load::{self, LoadConfig, LoadError};
use roomchat::net::NetConfig;
use roomchat_server::server::{self, ServerState};

fn short_run(server_url: String) -> LoadConfig {
    LoadConfig {
        net: NetConfig::new(server_url),
        rooms: 2,
        clients_per_room: 2,
        duration: Duration::from_millis(600),
        min_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(200),
        settle: Duration::from_secs(1),
        startup_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn simulated_clients_chat_in_their_rooms() {
    let (addr, _handle) = server::start_server("127.0.0.1:0")
        .await
        .expect("failed to start server");

    let report = load::run_load(&short_run(format!("http://{addr}")))
        .await
        .expect("load run should succeed");

    assert_eq!(report.clients(), 4);
    assert!(report.sent > 0);
    assert_eq!(report.rejected, 0);
    // Every message is echoed to its sender and fanned out to the one other
    // member of its room.
    assert!(report.received >= report.sent);
    assert!(report.received <= report.sent * 2);
}

#[tokio::test]
async fn rooms_are_created_on_the_server() {
    let state = Arc::new(ServerState::new());
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start server");

    load::run_load(&short_run(format!("http://{addr}")))
        .await
        .expect("load run should succeed");

    assert_eq!(state.rooms.list(), vec!["room_0", "room_1"]);
}

#[tokio::test]
async fn unreachable_server_aborts_before_sending() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = load::run_load(&short_run(format!("http://{addr}"))).await;
    assert!(matches!(result, Err(LoadError::Connect { client, .. }) if client == "client_0_0"));
}
