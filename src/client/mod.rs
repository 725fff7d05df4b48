//! Language client for the Drools language server.
//!
//! The client owns the server process and the LSP stream between the
//! editor and the server. [`LanguageClient`] is the seam the activation
//! controller drives; [`StdioClient`] is the process-backed implementation.
//!
//! ## Document association
//!
//! | Scheme | Language | Watched files |
//! |--------|----------|---------------|
//! | `file` | `drl`    | `**/*.drl`    |

pub mod stdio;
pub mod transport;
pub mod watcher;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use lsp_types::DocumentFilter;
use thiserror::Error;

use crate::server::LaunchSpec;

pub use stdio::{BlockingReader, HostIo, StdioClient, StdioClientFactory};
pub use transport::TransportError;
pub use watcher::{FileChange, FileWatcher};

/// Identifier of the Drools language client.
pub const CLIENT_ID: &str = "droolsLsp";

/// Display name of the Drools language client.
pub const CLIENT_NAME: &str = "Drools DRL Language Server";

/// Language identifier of Drools rule files.
pub const LANGUAGE_ID: &str = "drl";

/// Glob of files whose changes are forwarded to the server.
pub const WATCH_PATTERN: &str = "**/*.drl";

/// Default polling interval of the file watcher.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(1000);

/// Boxed future returned by client operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Language client error types.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to spawn server: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Client already started")]
    AlreadyStarted,

    #[error("Invalid watch pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Language server exited with {0}")]
    ServerExited(std::process::ExitStatus),
}

/// A language client connection whose lifecycle the host drives.
pub trait LanguageClient: Send {
    /// Starts the server and the connection.
    fn start(&mut self) -> ClientFuture<'_, Result<(), ClientError>>;

    /// Stops the connection and the server.
    fn stop(&mut self) -> ClientFuture<'_, Result<(), ClientError>>;
}

/// Creates language clients from a launch specification.
pub trait ClientFactory {
    /// Client type produced by this factory.
    type Client: LanguageClient + 'static;

    /// Creates a client that has not been started yet.
    fn create(
        &self,
        id: &str,
        name: &str,
        spec: LaunchSpec,
        options: ClientOptions,
    ) -> Self::Client;
}

/// Which documents the client serves and which files it watches.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Documents handled by the server.
    pub document_selector: Vec<DocumentFilter>,

    /// Glob of files whose changes are forwarded to the server.
    pub watch_pattern: String,

    /// Workspace root to watch; watching is off when unset.
    pub watch_root: Option<PathBuf>,

    /// Polling interval of the file watcher.
    pub watch_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            document_selector: vec![DocumentFilter {
                language: Some(LANGUAGE_ID.to_string()),
                scheme: Some("file".to_string()),
                pattern: None,
            }],
            watch_pattern: WATCH_PATTERN.to_string(),
            watch_root: None,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}

impl ClientOptions {
    /// Enables file watching under `root`.
    #[must_use]
    pub fn with_watch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.watch_root = Some(root.into());
        self
    }

    /// Sets the file watcher polling interval.
    #[must_use]
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Compiles the watch pattern.
    ///
    /// # Errors
    /// Returns error if the pattern is not a valid glob.
    pub fn watch_glob(&self) -> Result<glob::Pattern, ClientError> {
        Ok(glob::Pattern::new(&self.watch_pattern)?)
    }

    /// Returns whether `path` falls under the watch pattern.
    #[must_use]
    pub fn handles(&self, path: &Path) -> bool {
        self.watch_glob()
            .map(|pattern| pattern.matches_path(path))
            .unwrap_or(false)
    }
}
