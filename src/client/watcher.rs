//! Polling file watcher for `workspace/didChangeWatchedFiles`.
//!
//! Snapshots the modification time and size of every file under the
//! workspace root that matches the watch pattern, and reports the
//! difference between consecutive snapshots.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use lsp_types::FileChangeType;
use lsp_types::notification::{DidChangeWatchedFiles, Notification};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, trace, warn};

use super::{ClientError, ClientOptions};

/// Maximum directory depth scanned below the root.
const MAX_SCAN_DEPTH: usize = 32;

/// Identity of a file version.
type Stamp = (Option<SystemTime>, u64);

/// A single change to a watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// What happened to it.
    pub kind: FileChangeType,
}

/// Polling watcher over one workspace root.
#[derive(Debug)]
pub struct FileWatcher {
    root: PathBuf,
    pattern: glob::Pattern,
    snapshot: HashMap<PathBuf, Stamp>,
}

impl FileWatcher {
    /// Creates a watcher and takes the initial snapshot.
    ///
    /// A relative root is made absolute so changes can be reported as
    /// `file://` URIs.
    ///
    /// # Errors
    /// Returns error if the watch pattern is invalid.
    pub fn new(root: impl Into<PathBuf>, options: &ClientOptions) -> Result<Self, ClientError> {
        let root = root.into();
        let mut watcher = Self {
            root: std::path::absolute(&root).unwrap_or(root),
            pattern: options.watch_glob()?,
            snapshot: HashMap::new(),
        };
        watcher.snapshot = watcher.scan();
        debug!(
            "Watching {} files matching {} under {}",
            watcher.snapshot.len(),
            watcher.pattern,
            watcher.root.display()
        );
        Ok(watcher)
    }

    /// Returns the watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rescans the root and returns changes since the last poll.
    ///
    /// Changes are ordered by path.
    pub fn poll(&mut self) -> Vec<FileChange> {
        let current = self.scan();
        let mut changes = Vec::new();

        for (path, stamp) in &current {
            match self.snapshot.get(path) {
                None => changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeType::CREATED,
                }),
                Some(previous) if previous != stamp => changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeType::CHANGED,
                }),
                Some(_) => {}
            }
        }

        for path in self.snapshot.keys() {
            if !current.contains_key(path) {
                changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeType::DELETED,
                });
            }
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        self.snapshot = current;

        if !changes.is_empty() {
            trace!("{} watched file change(s)", changes.len());
        }
        changes
    }

    /// Walks the root collecting matching files.
    fn scan(&self) -> HashMap<PathBuf, Stamp> {
        let mut files = HashMap::new();
        let mut pending = vec![(self.root.clone(), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };

                if file_type.is_dir() {
                    let hidden = entry.file_name().to_string_lossy().starts_with('.');
                    if !hidden && depth < MAX_SCAN_DEPTH {
                        pending.push((path, depth + 1));
                    }
                    continue;
                }

                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                if !self.pattern.matches_path(relative) {
                    continue;
                }

                if let Ok(metadata) = entry.metadata() {
                    files.insert(path, (metadata.modified().ok(), metadata.len()));
                }
            }
        }

        files
    }
}

/// Builds the `workspace/didChangeWatchedFiles` notification for `changes`.
///
/// Paths that cannot be expressed as a `file://` URI are left out.
#[must_use]
pub fn changes_notification(changes: &[FileChange]) -> JsonValue {
    let events: Vec<JsonValue> = changes
        .iter()
        .filter_map(|change| {
            let Some(uri) = path_to_uri(&change.path) else {
                warn!("Not reporting change of {}: not an absolute path", change.path.display());
                return None;
            };
            Some(json!({
                "uri": uri,
                "type": change.kind,
            }))
        })
        .collect();

    json!({
        "jsonrpc": "2.0",
        "method": DidChangeWatchedFiles::METHOD,
        "params": { "changes": events }
    })
}

/// Converts an absolute path to a `file://` URI.
///
/// Returns `None` for relative paths.
#[must_use]
pub fn path_to_uri(path: &Path) -> Option<String> {
    url::Url::from_file_path(path).ok().map(String::from)
}
