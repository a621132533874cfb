//! Configuration system for the `RoomChat` server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/roomchat-server/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use crate::server::DEFAULT_MAX_MESSAGE_SIZE;

/// Errors that can occur when loading server configuration.
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

/// Top-level TOML config file structure for the server.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_message_size: Option<usize>,
}

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "RoomChat room server")]
pub struct ServerCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "SERVER_ADDRESS")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/roomchat-server/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum inbound WebSocket message size in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "ROOMCHAT_SERVER_LOG")]
    pub log_level: String,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path is tried and a missing file is treated as
    /// empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_message_size: cli
                .max_message_size
                .or(file.server.max_message_size)
                .unwrap_or(defaults.max_message_size),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ServerConfigFile::default());
    };
    let path = config_dir.join("roomchat-server").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
