//! Room directory client.
//!
//! The directory is the request/response side of the system: it lists the
//! rooms the server knows about and creates new ones. It never touches
//! membership; joining a room happens over the real-time channel.
//!
//! - [`HttpDirectory`] talks to the server's REST endpoints
//!   (`GET /rooms`, `POST /room/{name}`).
//! - [`InMemoryDirectory`] keeps rooms in process, for tests and offline use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use roomchat_proto::envelope::{ValidationError, validate_room_name};

/// Default timeout applied to each directory request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur during directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The room name failed validation before any request was made.
    #[error("invalid room name: {0}")]
    Validation(#[from] ValidationError),

    /// The configured server URL cannot carry directory paths.
    #[error("invalid directory URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request could not be completed.
    #[error("directory request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("directory returned status {0}")]
    Status(u16),

    /// The directory is not reachable.
    #[error("directory unavailable")]
    Unavailable,
}

/// Request/response access to the set of known rooms.
pub trait RoomDirectory: Send + Sync {
    /// Fetch the names of all known rooms, in server order.
    fn list_rooms(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    /// Ask the server to create a room.
    ///
    /// `Ok(())` means the caller may add the room to its room list.
    fn create_room(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), DirectoryError>> + Send;
}

/// Directory client backed by the server's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base: Url,
}

impl HttpDirectory {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidUrl`] if `base_url` does not parse
    /// or cannot have path segments, or [`DirectoryError::Request`] if the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let base = Url::parse(base_url).map_err(|e| DirectoryError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(DirectoryError::InvalidUrl(format!(
                "{base_url} cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// URL of the room list endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidUrl`] if the base URL has no path.
    pub fn rooms_url(&self) -> Result<Url, DirectoryError> {
        self.endpoint(&["rooms"])
    }

    /// URL of the creation endpoint for `name`; the name is percent-encoded
    /// as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidUrl`] if the base URL has no path.
    pub fn room_url(&self, name: &str) -> Result<Url, DirectoryError> {
        self.endpoint(&["room", name])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| DirectoryError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl RoomDirectory for HttpDirectory {
    async fn list_rooms(&self) -> Result<Vec<String>, DirectoryError> {
        let url = self.rooms_url()?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }
        let rooms: Vec<String> = response.json().await?;
        tracing::debug!(count = rooms.len(), "fetched room list");
        Ok(rooms)
    }

    async fn create_room(&self, name: &str) -> Result<(), DirectoryError> {
        let name = validate_room_name(name)?;
        let url = self.room_url(name)?;
        let response = self.client.post(url).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(room = %name, "room created");
            Ok(())
        } else {
            tracing::warn!(room = %name, status = status.as_u16(), "room creation refused");
            Err(DirectoryError::Status(status.as_u16()))
        }
    }
}

/// In-process directory holding room names in insertion order.
///
/// Mirrors the server's rules: creating an existing room fails with a
/// `409` status. [`set_available`](Self::set_available) simulates an outage.
#[derive(Debug)]
pub struct InMemoryDirectory {
    rooms: Mutex<Vec<String>>,
    available: AtomicBool,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    /// Creates an empty, available directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Creates a directory pre-populated with `rooms`.
    #[must_use]
    pub fn with_rooms<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rooms: Mutex::new(rooms.into_iter().map(Into::into).collect()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle whether requests succeed.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Snapshot of the current room names.
    #[must_use]
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().clone()
    }
}

impl RoomDirectory for InMemoryDirectory {
    async fn list_rooms(&self) -> Result<Vec<String>, DirectoryError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(DirectoryError::Unavailable);
        }
        Ok(self.rooms())
    }

    async fn create_room(&self, name: &str) -> Result<(), DirectoryError> {
        let name = validate_room_name(name)?;
        if !self.available.load(Ordering::Relaxed) {
            return Err(DirectoryError::Unavailable);
        }
        let mut rooms = self.rooms.lock();
        if rooms.iter().any(|r| r == name) {
            return Err(DirectoryError::Status(409));
        }
        rooms.push(name.to_string());
        drop(rooms);
        Ok(())
    }
}
