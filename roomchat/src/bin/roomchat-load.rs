//! `RoomChat` load simulator.
//!
//! Connects `--rooms` x `--clients` sessions to a running server, has each
//! one chat in its room for `--duration-secs`, and prints the totals.
//!
//! ```bash
//! cargo run --bin roomchat-load -- --server-url http://127.0.0.1:8080 --rooms 5 --clients 3
//! ```

use std::time::Duration;

use clap::Parser;

use roomchat::config::DEFAULT_SERVER_URL;
use roomchat::load::{self, LoadConfig};
use roomchat::net::NetConfig;

/// Command-line arguments for the load simulator.
#[derive(Debug, Parser)]
#[command(name = "roomchat-load", about = "Simulate many chat clients")]
struct LoadArgs {
    /// Base URL of the chat server.
    #[arg(long, env = "ROOMCHAT_SERVER", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Number of rooms.
    #[arg(long, default_value_t = 5)]
    rooms: usize,

    /// Clients per room.
    #[arg(long, default_value_t = 3)]
    clients: usize,

    /// How long clients keep sending, in seconds.
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Shortest per-client send period, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    min_interval_ms: u64,

    /// Longest per-client send period, in milliseconds.
    #[arg(long, default_value_t = 6000)]
    max_interval_ms: u64,

    /// Time to wait for in-flight messages after sending stops, in seconds.
    #[arg(long, default_value_t = 5)]
    settle_secs: u64,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long, env = "ROOMCHAT_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = LoadArgs::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let config = LoadConfig {
        net: NetConfig::new(args.server_url),
        rooms: args.rooms,
        clients_per_room: args.clients,
        duration: Duration::from_secs(args.duration_secs),
        min_interval: Duration::from_millis(args.min_interval_ms),
        max_interval: Duration::from_millis(args.max_interval_ms),
        settle: Duration::from_secs(args.settle_secs),
        ..LoadConfig::default()
    };
    tracing::info!(
        server = %config.net.server_url,
        rooms = config.rooms,
        clients_per_room = config.clients_per_room,
        "starting load simulation"
    );

    match load::run_load(&config).await {
        Ok(report) => println!("{report}"),
        Err(e) => {
            tracing::error!(error = %e, "load simulation failed");
            std::process::exit(1);
        }
    }
}
