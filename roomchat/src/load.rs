//! Load simulation: many clients chatting in parallel rooms.
//!
//! Every simulated client is a full session from [`net::spawn_net`]. Clients
//! are grouped into rooms named `room_0`, `room_1`, ...; all of them connect
//! and join before any chat is sent, then each sends on its own period until
//! the run ends. A settle phase lets in-flight broadcasts arrive before the
//! sessions shut down.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::chat::ViewEvent;
use crate::net::{self, NetCommand, NetConfig, NetError};

/// Errors that abort a load run before any chat is sent.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A client could not connect.
    #[error("client {client} failed to connect: {source}")]
    Connect {
        /// Label of the failing client.
        client: String,
        /// Underlying session error.
        #[source]
        source: NetError,
    },
    /// A client did not finish joining its room in time.
    #[error("client {0} timed out joining its room")]
    JoinTimeout(String),
    /// A session ended before the run started.
    #[error("client {0} session ended during startup")]
    SessionEnded(String),
}

/// Shape of one load run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Session settings shared by every client.
    pub net: NetConfig,
    /// Number of rooms.
    pub rooms: usize,
    /// Clients joined to each room.
    pub clients_per_room: usize,
    /// How long clients keep sending.
    pub duration: Duration,
    /// Shortest per-client send period.
    pub min_interval: Duration,
    /// Longest per-client send period.
    pub max_interval: Duration,
    /// Time allowed for broadcasts to drain after sending stops.
    pub settle: Duration,
    /// Time allowed for each client to connect and join.
    pub startup_timeout: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            net: NetConfig::new(crate::config::DEFAULT_SERVER_URL),
            rooms: 5,
            clients_per_room: 3,
            duration: Duration::from_secs(30),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(6),
            settle: Duration::from_secs(5),
            startup_timeout: Duration::from_secs(10),
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Rooms used.
    pub rooms: usize,
    /// Clients per room.
    pub clients_per_room: usize,
    /// Chat messages handed to client sessions.
    pub sent: u64,
    /// Chat messages shown to clients, echoes included.
    pub received: u64,
    /// Intents a session refused and reported as a notice.
    pub rejected: u64,
    /// Wall-clock time from first join to shutdown.
    pub elapsed: Duration,
}

impl LoadReport {
    /// Total number of simulated clients.
    #[must_use]
    pub const fn clients(&self) -> usize {
        self.rooms * self.clients_per_room
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Load summary ---")?;
        writeln!(f, "Duration: {:.2?}", self.elapsed)?;
        writeln!(f, "Rooms: {}", self.rooms)?;
        writeln!(f, "Clients per room: {}", self.clients_per_room)?;
        writeln!(f, "Total clients: {}", self.clients())?;
        writeln!(f, "Messages sent: {}", self.sent)?;
        writeln!(f, "Messages received: {}", self.received)?;
        writeln!(f, "Rejected intents: {}", self.rejected)?;
        writeln!(f, "Send rate: {:.2} messages/second", self.rate(self.sent))?;
        write!(f, "Receive rate: {:.2} messages/second", self.rate(self.received))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sending,
    Draining,
    Done,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    rejected: AtomicU64,
}

struct LoadClient {
    label: String,
    commands: mpsc::Sender<NetCommand>,
    view: mpsc::UnboundedReceiver<ViewEvent>,
}

impl LoadClient {
    /// Connects and joins `room`, returning once the join is on the wire.
    async fn join(config: &LoadConfig, room: &str, label: String) -> Result<Self, LoadError> {
        let (commands, view) = net::spawn_net(config.net.clone()).await.map_err(|source| {
            LoadError::Connect {
                client: label.clone(),
                source,
            }
        })?;
        let mut client = Self {
            label,
            commands,
            view,
        };

        let timeout = config.startup_timeout;
        tokio::time::timeout(timeout, client.join_room(room))
            .await
            .map_err(|_| LoadError::JoinTimeout(client.label.clone()))??;
        tracing::debug!(client = %client.label, room, "load client joined");
        Ok(client)
    }

    async fn join_room(&mut self, room: &str) -> Result<(), LoadError> {
        self.wait_for(|event| matches!(event, ViewEvent::ConnectionChanged { connected: true }))
            .await?;
        self.commands
            .send(NetCommand::SwitchRoom { room: room.to_string() })
            .await
            .map_err(|_| LoadError::SessionEnded(self.label.clone()))?;
        self.wait_for(|event| matches!(event, ViewEvent::RoomRepainted { room: r, .. } if r == room))
            .await
    }

    async fn wait_for(&mut self, wanted: impl Fn(&ViewEvent) -> bool) -> Result<(), LoadError> {
        loop {
            match self.view.recv().await {
                Some(event) if wanted(&event) => return Ok(()),
                Some(_) => {}
                None => return Err(LoadError::SessionEnded(self.label.clone())),
            }
        }
    }

    async fn run(
        mut self,
        period: Duration,
        mut phase: watch::Receiver<Phase>,
        counters: Arc<Counters>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: u64 = 0;

        loop {
            let sending = *phase.borrow() == Phase::Sending;
            tokio::select! {
                _ = ticker.tick(), if sending => {
                    seq += 1;
                    let content = format!("message {seq} from {}", self.label);
                    if self.commands.send(NetCommand::SendChat { content }).await.is_err() {
                        break;
                    }
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                event = self.view.recv() => match event {
                    Some(ViewEvent::MessageAppended(_)) => {
                        counters.received.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(ViewEvent::Notice(text)) => {
                        tracing::warn!(client = %self.label, notice = %text, "load client notice");
                        counters.rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(_) => {}
                    None => break,
                },
                changed = phase.changed() => {
                    if changed.is_err() || *phase.borrow() == Phase::Done {
                        break;
                    }
                }
            }
        }

        let _ = self.commands.send(NetCommand::Shutdown).await;
        tracing::debug!(client = %self.label, sent = seq, "load client finished");
    }
}

/// Send period for the `index`-th client, spread across the configured range.
fn interval_for(config: &LoadConfig, index: usize) -> Duration {
    let min = config.min_interval.max(Duration::from_millis(1));
    let span = config.max_interval.saturating_sub(min);
    if span.is_zero() {
        return min;
    }
    let span_ms = u64::try_from(span.as_millis()).unwrap_or(u64::MAX);
    let step = u64::try_from(index)
        .unwrap_or(u64::MAX)
        .wrapping_mul(397)
        % span_ms.max(1);
    min + Duration::from_millis(step)
}

/// Runs one load simulation against `config.net.server_url`.
///
/// # Errors
///
/// Returns [`LoadError`] if any client fails to connect or join. Nothing is
/// sent in that case.
pub async fn run_load(config: &LoadConfig) -> Result<LoadReport, LoadError> {
    let mut clients = Vec::with_capacity(config.rooms * config.clients_per_room);
    for room_index in 0..config.rooms {
        let room = format!("room_{room_index}");
        for client_index in 0..config.clients_per_room {
            let label = format!("client_{room_index}_{client_index}");
            clients.push(LoadClient::join(config, &room, label).await?);
        }
    }
    tracing::info!(clients = clients.len(), rooms = config.rooms, "all load clients joined");

    let started = Instant::now();
    let counters = Arc::new(Counters::default());
    let (phase_tx, phase_rx) = watch::channel(Phase::Sending);
    let handles: Vec<_> = clients
        .into_iter()
        .enumerate()
        .map(|(index, client)| {
            let period = interval_for(config, index);
            tokio::spawn(client.run(period, phase_rx.clone(), Arc::clone(&counters)))
        })
        .collect();

    tokio::time::sleep(config.duration).await;
    let _ = phase_tx.send(Phase::Draining);
    tracing::info!("sending stopped, draining");
    tokio::time::sleep(config.settle).await;
    let _ = phase_tx.send(Phase::Done);

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "load client task failed");
        }
    }

    Ok(LoadReport {
        rooms: config.rooms,
        clients_per_room: config.clients_per_room,
        sent: counters.sent.load(Ordering::Relaxed),
        received: counters.received.load(Ordering::Relaxed),
        rejected: counters.rejected.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    })
}
