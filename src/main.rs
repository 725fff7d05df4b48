//! drools-lsp - Main entry point.
//!
//! Resolves the Drools language server jar, starts it and relays the
//! LSP stream between the editor (this process's stdio) and the server.
//!
//! Usage: drools-lsp [OPTIONS] [COMMAND]
//!
//! Commands:
//!   run          Start the server and relay stdio (default)
//!   resolve      Print the launch command
//!   candidates   Print the server jar candidates in priority order

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use drools_lsp_client::activation::{
    ActivationController, ActivationError, Notifier, SERVER_NOT_FOUND_MESSAGE, StderrNotifier,
};
use drools_lsp_client::client::{ClientError, ClientOptions, StdioClient, StdioClientFactory};
use drools_lsp_client::config::{Config, ConfigSources};
use drools_lsp_client::logging::{self, LogConfig};
use drools_lsp_client::server::{ArtifactResolver, LaunchSpec};

#[derive(Debug, Parser)]
#[command(name = "drools-lsp", version, about = "Drools DRL language server launcher")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding the server jar (defaults to the executable's directory)
    #[arg(long, global = true)]
    extension_dir: Option<PathBuf>,

    /// Java installation used to run the server (drools.lsp.javaHome)
    #[arg(long, global = true)]
    java_home: Option<String>,

    /// Explicit path to the server jar (drools.lsp.serverPath)
    #[arg(long, global = true)]
    server_path: Option<String>,

    /// Additional VSCode style settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Do not read the user's VSCode settings.json
    #[arg(long, global = true)]
    no_user_settings: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Disable file logging
    #[arg(long, global = true)]
    no_log: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the server and relay stdio (default)
    Run {
        /// Forward changes of *.drl files under this root to the server
        #[arg(long)]
        watch: Option<PathBuf>,

        /// File watcher polling interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        watch_interval_ms: u64,
    },

    /// Print the launch command
    Resolve {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the server jar candidates in priority order
    Candidates,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: LogConfig::parse_level(&cli.log_level),
        enabled: !cli.no_log,
        ..LogConfig::default()
    };
    let _log_guard = logging::init(&log_config)?;

    let sources = ConfigSources {
        user_settings: !cli.no_user_settings,
        workspace_root: env::current_dir().ok(),
        settings_file: cli.settings.clone(),
        java_home: cli.java_home.clone(),
        server_path: cli.server_path.clone(),
    };
    let config = Config::load(&sources)?;
    let extension_dir = match &cli.extension_dir {
        Some(dir) => dir.clone(),
        None => default_extension_dir()?,
    };
    info!("Extension directory: {}", extension_dir.display());

    match cli.command {
        Some(Commands::Resolve { json }) => resolve(&config, &extension_dir, json),
        Some(Commands::Candidates) => {
            candidates(&config, &extension_dir);
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Run {
            watch,
            watch_interval_ms,
        }) => {
            let mut options =
                ClientOptions::default().with_watch_interval(Duration::from_millis(watch_interval_ms));
            if let Some(root) = watch {
                options = options.with_watch_root(root);
            }
            run(&config, &extension_dir, options).await
        }
        None => run(&config, &extension_dir, ClientOptions::default()).await,
    }
}

/// Activates the client and relays until either side goes away.
///
/// Fails when the server exits with a non-success status.
async fn run(
    config: &Config,
    extension_dir: &Path,
    options: ClientOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut controller =
        ActivationController::new(StdioClientFactory, StderrNotifier).with_options(options);

    match controller.activate(config, extension_dir).await {
        Ok(()) => {}
        Err(ActivationError::ServerNotFound) => return Ok(ExitCode::FAILURE),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    }

    if let Some(mut exit_signal) = controller.client().map(StdioClient::exit_signal) {
        tokio::select! {
            _ = exit_signal.wait_for(|done| *done) => info!("Relay finished"),
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
    }

    let Some(stop) = controller.deactivate() else {
        return Ok(ExitCode::SUCCESS);
    };
    match stop.await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(ClientError::ServerExited(status)) => {
            StderrNotifier.show_error(&format!("Drools DRL Language Server exited: {status}"));
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

/// Prints the launch specification, or reports a missing jar.
fn resolve(
    config: &Config,
    extension_dir: &Path,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let artifact = ArtifactResolver::new().resolve(config.server_path.as_deref(), extension_dir);
    let Some(artifact) = artifact else {
        StderrNotifier.show_error(SERVER_NOT_FOUND_MESSAGE);
        return Ok(ExitCode::FAILURE);
    };

    let spec = LaunchSpec::java(config.java_home.as_deref(), &artifact);
    if json {
        println!("{}", serde_json::to_string_pretty(&spec)?);
    } else {
        println!("{}", spec);
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints every candidate, marking those that exist.
fn candidates(config: &Config, extension_dir: &Path) {
    let resolver = ArtifactResolver::new();

    if let Some(configured) = &config.server_path {
        let marker = if configured.exists() { '*' } else { ' ' };
        println!("{} {} (configured)", marker, configured.display());
    }
    for candidate in resolver.candidates(extension_dir) {
        let marker = if candidate.exists() { '*' } else { ' ' };
        println!("{} {}", marker, candidate.display());
    }
}

/// Returns the directory containing the running executable.
fn default_extension_dir() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("Executable has no parent directory"))
}
