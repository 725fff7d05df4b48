//! VSCode settings.json reader.
//!
//! Extracts the `drools.lsp.*` settings from VSCode style settings
//! files. Both the flat form (`"drools.lsp.javaHome": "..."`) and the
//! nested form (`"drools.lsp": { "javaHome": "..." }`) are accepted.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Settings namespace of the Drools client.
pub const SETTINGS_NAMESPACE: &str = "drools.lsp";

/// Key of the Java home setting within the namespace.
pub const JAVA_HOME_KEY: &str = "javaHome";

/// Key of the server jar setting within the namespace.
pub const SERVER_PATH_KEY: &str = "serverPath";

/// Error loading an explicitly requested settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Drools client settings found in a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VsCodeSettings {
    /// `drools.lsp.javaHome`.
    pub java_home: Option<String>,
    /// `drools.lsp.serverPath`.
    pub server_path: Option<String>,
}

impl VsCodeSettings {
    /// Returns the user settings.json path for the current platform.
    ///
    /// - Windows: %APPDATA%\Code\User\settings.json
    /// - macOS: ~/Library/Application Support/Code/User/settings.json
    /// - Linux: ~/.config/Code/User/settings.json
    #[must_use]
    pub fn user_settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir().map(|p| {
                p.join("Library")
                    .join("Application Support")
                    .join("Code")
                    .join("User")
                    .join("settings.json")
            })
        }

        #[cfg(any(target_os = "windows", target_os = "linux"))]
        {
            dirs::config_dir().map(|p| p.join("Code").join("User").join("settings.json"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Returns the workspace settings path under `root`.
    #[must_use]
    pub fn workspace_settings_path(root: &Path) -> PathBuf {
        root.join(".vscode").join("settings.json")
    }

    /// Loads settings from a specific path.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses settings from JSON content, allowing comments and trailing commas.
    ///
    /// # Errors
    /// Returns error if the content is not valid JSON.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let clean_content = strip_trailing_commas(&strip_json_comments(content));
        let json: Value = serde_json::from_str(&clean_content)?;

        let mut settings = Self::default();

        if let Value::Object(map) = json {
            for (key, value) in &map {
                if key == SETTINGS_NAMESPACE {
                    if let Value::Object(nested) = value {
                        for (inner, inner_value) in nested {
                            settings.apply_setting(inner, inner_value);
                        }
                    }
                } else if let Some(inner) = key
                    .strip_prefix(SETTINGS_NAMESPACE)
                    .and_then(|rest| rest.strip_prefix('.'))
                {
                    settings.apply_setting(inner, value);
                }
            }
        }

        Ok(settings)
    }

    /// Applies a single namespaced setting from JSON.
    fn apply_setting(&mut self, key: &str, value: &Value) {
        let Value::String(s) = value else {
            return;
        };
        match key {
            JAVA_HOME_KEY => self.java_home = Some(s.clone()),
            SERVER_PATH_KEY => self.server_path = Some(s.clone()),
            _ => {}
        }
    }

    /// Overlays `other` on top of `self`; values set in `other` win.
    pub fn merge(&mut self, other: Self) {
        if other.java_home.is_some() {
            self.java_home = other.java_home;
        }
        if other.server_path.is_some() {
            self.server_path = other.server_path;
        }
    }
}

/// Strips C-style comments from JSON (// and /* */).
fn strip_json_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
                result.push(c);
            }
            continue;
        }

        if in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }

        if in_string {
            result.push(c);
            if c == '"' {
                in_string = false;
            } else if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            _ => result.push(c),
        }
    }

    result
}

/// Removes commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<usize> = None;

    for c in content.chars() {
        if in_string {
            result.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            ',' => {
                pending_comma = Some(result.len());
                result.push(c);
            }
            '}' | ']' => {
                if let Some(pos) = pending_comma.take() {
                    result.remove(pos);
                }
                result.push(c);
            }
            c if c.is_whitespace() => result.push(c),
            _ => {
                pending_comma = None;
                if c == '"' {
                    in_string = true;
                }
                result.push(c);
            }
        }
    }

    result
}
