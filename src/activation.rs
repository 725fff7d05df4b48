//! Activation lifecycle of the Drools language client.
//!
//! [`ActivationController`] is a two-state machine. Activation resolves
//! the server jar, builds the launch specification and starts a client;
//! deactivation hands back the client's stop future. The client handle
//! lives in the controller, so there is at most one per controller.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::{
    CLIENT_ID, CLIENT_NAME, ClientError, ClientFactory, ClientFuture, ClientOptions,
    LanguageClient,
};
use crate::config::Config;
use crate::server::{ArtifactFs, ArtifactResolver, LaunchSpec, OsFs};

/// Message shown when no server jar can be found.
pub const SERVER_NOT_FOUND_MESSAGE: &str = "Drools DRL Language Server JAR not found. \
     Set 'drools.lsp.serverPath' in settings or place the JAR in the extension directory.";

/// Future completing when a stopped client has shut down.
pub type StopFuture = ClientFuture<'static, Result<(), ClientError>>;

/// Activation error types.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Language server jar not found")]
    ServerNotFound,

    #[error("Language client is already active")]
    AlreadyActive,

    #[error("Failed to start language client: {0}")]
    Client(#[from] ClientError),
}

/// User-facing error reporting.
pub trait Notifier {
    /// Shows an error message to the user.
    fn show_error(&self, message: &str);
}

/// Notifier that writes to stderr and the log.
///
/// Stderr is the only channel back to the user when stdout carries LSP.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn show_error(&self, message: &str) {
        error!("{}", message);
        eprintln!("{message}");
    }
}

/// Owns the language client across activate/deactivate.
pub struct ActivationController<F: ClientFactory, N, A = OsFs> {
    factory: F,
    notifier: N,
    resolver: ArtifactResolver<A>,
    options: ClientOptions,
    client: Option<F::Client>,
}

impl<F: ClientFactory, N: Notifier> ActivationController<F, N, OsFs> {
    /// Creates an inactive controller resolving against the real filesystem.
    #[must_use]
    pub fn new(factory: F, notifier: N) -> Self {
        Self {
            factory,
            notifier,
            resolver: ArtifactResolver::new(),
            options: ClientOptions::default(),
            client: None,
        }
    }
}

impl<F: ClientFactory, N: Notifier, A: ArtifactFs> ActivationController<F, N, A> {
    /// Replaces the artifact resolver.
    #[must_use]
    pub fn with_resolver<B: ArtifactFs>(
        self,
        resolver: ArtifactResolver<B>,
    ) -> ActivationController<F, N, B> {
        ActivationController {
            factory: self.factory,
            notifier: self.notifier,
            resolver,
            options: self.options,
            client: self.client,
        }
    }

    /// Sets the options passed to created clients.
    #[must_use]
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns whether a client is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    /// Returns the active client.
    #[must_use]
    pub fn client(&self) -> Option<&F::Client> {
        self.client.as_ref()
    }

    /// Resolves the server jar and builds its launch specification.
    ///
    /// Returns `None` when no jar is available. Nothing is reported.
    #[must_use]
    pub fn launch_spec(&self, config: &Config, extension_dir: &Path) -> Option<LaunchSpec> {
        let artifact = self
            .resolver
            .resolve(config.server_path.as_deref(), extension_dir)?;
        Some(LaunchSpec::java(config.java_home.as_deref(), &artifact))
    }

    /// Activates the language client.
    ///
    /// On success a client has been created and started. If no server jar
    /// can be found, the user is notified once and no client is created.
    ///
    /// # Errors
    /// Returns [`ActivationError::AlreadyActive`] while a client is active,
    /// [`ActivationError::ServerNotFound`] when resolution fails, and
    /// [`ActivationError::Client`] when the client fails to start.
    pub async fn activate(
        &mut self,
        config: &Config,
        extension_dir: &Path,
    ) -> Result<(), ActivationError> {
        if self.client.is_some() {
            warn!("Activation requested while already active");
            return Err(ActivationError::AlreadyActive);
        }

        let Some(spec) = self.launch_spec(config, extension_dir) else {
            self.notifier.show_error(SERVER_NOT_FOUND_MESSAGE);
            return Err(ActivationError::ServerNotFound);
        };

        info!("Launching language server: {}", spec);
        let mut client = self
            .factory
            .create(CLIENT_ID, CLIENT_NAME, spec, self.options.clone());
        client.start().await?;

        self.client = Some(client);
        Ok(())
    }

    /// Deactivates the language client.
    ///
    /// Returns `None` when inactive. Otherwise the controller becomes
    /// inactive immediately and the returned future stops the client.
    pub fn deactivate(&mut self) -> Option<StopFuture> {
        let mut client = self.client.take()?;
        info!("Stopping language client");
        Some(Box::pin(async move { client.stop().await }))
    }
}
