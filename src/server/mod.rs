//! Locating and launching the Drools language server.
//!
//! The server is an executable shaded jar started with `java -jar`.

pub mod launch;
pub mod resolver;

pub use launch::{DEFAULT_JAVA_COMMAND, LaunchSpec};
pub use resolver::{ArtifactFs, ArtifactResolver, OsFs, is_shaded_artifact};
