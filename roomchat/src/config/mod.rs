//! Configuration system for the `RoomChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/roomchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::net::NetConfig;

/// Server used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    history: HistoryFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    server_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[history]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HistoryFileConfig {
    max_messages_per_room: Option<usize>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base HTTP(S) URL of the chat server.
    pub server_url: String,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Timeout for each room directory request.
    pub request_timeout: Duration,
    /// Capacity of the command and transport event channels.
    pub channel_capacity: usize,
    /// Per-room history cap; `None` keeps everything.
    pub max_messages_per_room: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            channel_capacity: 256,
            max_messages_per_room: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/roomchat/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server_url: cli
                .server_url
                .clone()
                .or_else(|| file.network.server_url.clone())
                .unwrap_or(defaults.server_url),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            request_timeout: file
                .network
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            channel_capacity: file
                .network
                .channel_capacity
                .unwrap_or(defaults.channel_capacity)
                .max(1),
            max_messages_per_room: file.history.max_messages_per_room,
        }
    }

    /// Build the [`NetConfig`] for a session.
    #[must_use]
    pub fn to_net_config(&self) -> NetConfig {
        NetConfig {
            server_url: self.server_url.clone(),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            channel_capacity: self.channel_capacity,
            max_messages_per_room: self.max_messages_per_room,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Multi-room chat client")]
pub struct CliArgs {
    /// Base URL of the chat server (e.g. `http://127.0.0.1:8080`).
    #[arg(long, env = "ROOMCHAT_SERVER")]
    pub server_url: Option<String>,

    /// Path to config file (default: `~/.config/roomchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "ROOMCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/roomchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// path is tried and a missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("roomchat").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
