//! Launch specification for the server process.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::resolver::is_blank;

/// Runtime looked up on `PATH` when no Java home is configured.
pub const DEFAULT_JAVA_COMMAND: &str = "java";

/// How to start the language server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable to run.
    pub command: String,

    /// Command-line arguments.
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Creates a launch specification.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the `java -jar <artifact>` invocation.
    ///
    /// Uses `<java_home>/bin/java` when a non-blank Java home is given,
    /// otherwise the bare `java` command. The command is not checked for
    /// existence; a bad runtime surfaces when the process is spawned.
    #[must_use]
    pub fn java(java_home: Option<&Path>, artifact: &Path) -> Self {
        let command = match java_home.filter(|home| !is_blank(home)) {
            Some(home) => home.join("bin").join("java").to_string_lossy().into_owned(),
            None => DEFAULT_JAVA_COMMAND.to_string(),
        };

        Self::new(
            command,
            ["-jar".to_string(), artifact.to_string_lossy().into_owned()],
        )
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_java_without_home() {
        let spec = LaunchSpec::java(None, Path::new("/ext/server/drools-lsp-2.0-shaded.jar"));
        assert_eq!(spec.command, "java");
        assert_eq!(spec.args, vec!["-jar", "/ext/server/drools-lsp-2.0-shaded.jar"]);
    }

    #[test]
    fn test_java_with_home() {
        let spec = LaunchSpec::java(
            Some(Path::new("/opt/jdk17")),
            Path::new("/custom/my-server.jar"),
        );

        #[cfg(not(windows))]
        assert_eq!(spec.command, "/opt/jdk17/bin/java");
        assert_eq!(spec.args, vec!["-jar", "/custom/my-server.jar"]);
    }

    #[test]
    fn test_empty_home_uses_path_lookup() {
        let spec = LaunchSpec::java(Some(Path::new("")), Path::new("server.jar"));
        assert_eq!(spec.command, DEFAULT_JAVA_COMMAND);
    }

    #[test]
    fn test_whitespace_home_uses_path_lookup() {
        let spec = LaunchSpec::java(Some(Path::new("  ")), Path::new("server.jar"));
        assert_eq!(spec.command, DEFAULT_JAVA_COMMAND);
        assert_eq!(spec.args, vec!["-jar", "server.jar"]);
    }

    #[test]
    fn test_display() {
        let spec = LaunchSpec::new("java", ["-jar", "server.jar"]);
        assert_eq!(spec.to_string(), "java -jar server.jar");
    }
}
