//! Server artifact resolution.
//!
//! Picks the Drools language server jar to launch. An explicitly
//! configured path always wins; otherwise the extension directory is
//! searched for a bundled (shaded) jar.
//!
//! All filesystem access goes through [`ArtifactFs`] so the priority
//! rules can be exercised against an in-memory layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Subdirectory of the extension directory holding server builds.
pub const SERVER_DIR: &str = "server";

/// File name prefix shared by every server build.
pub const ARTIFACT_PREFIX: &str = "drools-lsp";

/// Marker identifying a self-contained (shaded) build.
pub const SHADED_MARKER: &str = "shaded";

/// Archive extension of a runnable build.
pub const ARTIFACT_EXTENSION: &str = ".jar";

/// Canonical name of the bundled server jar.
pub const DEFAULT_ARTIFACT_NAME: &str = "drools-lsp-shaded.jar";

/// Read-only filesystem capability used during resolution.
pub trait ArtifactFs {
    /// Returns whether something exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Returns the entry names of `dir`, or `None` if it cannot be listed.
    fn list_dir(&self, dir: &Path) -> Option<Vec<String>>;
}

/// [`ArtifactFs`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl ArtifactFs for OsFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, dir: &Path) -> Option<Vec<String>> {
        let entries = fs::read_dir(dir).ok()?;
        Some(
            entries
                .flatten()
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
        )
    }
}

/// Returns whether a file name identifies a shaded server build.
#[must_use]
pub fn is_shaded_artifact(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX)
        && name.contains(SHADED_MARKER)
        && name.ends_with(ARTIFACT_EXTENSION)
}

/// Returns whether `path` is empty or whitespace only.
pub(crate) fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}

/// Resolves the server jar from configuration and the extension layout.
#[derive(Debug, Clone, Default)]
pub struct ArtifactResolver<F = OsFs> {
    fs: F,
}

impl ArtifactResolver<OsFs> {
    /// Creates a resolver over the real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self { fs: OsFs }
    }
}

impl<F: ArtifactFs> ArtifactResolver<F> {
    /// Creates a resolver over the given filesystem capability.
    #[must_use]
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    /// Resolves the server artifact.
    ///
    /// Returns the configured path when it is set and exists, otherwise
    /// the first existing entry of [`Self::candidates`]. `None` means no
    /// artifact is available, which is a normal outcome.
    pub fn resolve(&self, configured: Option<&Path>, base_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = configured.filter(|p| !is_blank(p)) {
            if self.fs.exists(path) {
                debug!("Using configured server jar: {}", path.display());
                return Some(path.to_path_buf());
            }
            debug!(
                "Configured server jar {} does not exist, searching {}",
                path.display(),
                base_dir.display()
            );
        }

        let found = self
            .candidates(base_dir)
            .into_iter()
            .find(|candidate| self.fs.exists(candidate));

        match &found {
            Some(path) => debug!("Resolved server jar: {}", path.display()),
            None => debug!("No server jar found under {}", base_dir.display()),
        }
        found
    }

    /// Builds the ordered discovery candidate list for `base_dir`.
    ///
    /// Shaded jars found in `server/` come first, the lexicographically
    /// greatest name leading, followed by the two canonical locations.
    #[must_use]
    pub fn candidates(&self, base_dir: &Path) -> Vec<PathBuf> {
        let server_dir = base_dir.join(SERVER_DIR);

        let mut discovered: Vec<String> = self
            .fs
            .list_dir(&server_dir)
            .unwrap_or_default()
            .into_iter()
            .filter(|name| is_shaded_artifact(name))
            .collect();
        discovered.sort();

        let mut candidates = Vec::with_capacity(discovered.len() + 2);
        candidates.extend(discovered.iter().rev().map(|name| server_dir.join(name)));
        candidates.push(server_dir.join(DEFAULT_ARTIFACT_NAME));
        candidates.push(base_dir.join(DEFAULT_ARTIFACT_NAME));
        candidates
    }
}
