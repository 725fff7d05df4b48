//! Drools LSP client
//!
//! Editor integration for the Drools rule language (`.drl`). Locates
//! the Drools language server jar, starts it with `java -jar` and relays
//! the Language Server Protocol stream between the editor and the server.
//!
//! # Architecture
//!
//! - **Server Module**: server jar resolution and launch specification
//! - **Client Module**: stdio relay client, message framing, file watcher
//! - **Activation Module**: activate/deactivate state machine
//! - **Config Module**: `drools.lsp.*` settings and environment
//!
//! # Usage
//!
//! ```no_run
//! use drools_lsp_client::activation::{ActivationController, StderrNotifier};
//! use drools_lsp_client::client::StdioClientFactory;
//! use drools_lsp_client::config::Config;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = ActivationController::new(StdioClientFactory, StderrNotifier);
//! controller
//!     .activate(&Config::default(), std::path::Path::new("/opt/drools-lsp"))
//!     .await?;
//! // ... later
//! if let Some(stop) = controller.deactivate() {
//!     stop.await?;
//! }
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod activation;
pub mod client;
pub mod config;
pub mod logging;
pub mod server;

// Re-export main types
pub use activation::{ActivationController, ActivationError, Notifier, StderrNotifier};
pub use client::{ClientOptions, LanguageClient, StdioClient, StdioClientFactory};
pub use config::Config;
pub use server::{ArtifactResolver, LaunchSpec};
