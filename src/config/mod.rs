//! Configuration module for the Drools language client.
//!
//! Resolves the two client options, `drools.lsp.javaHome` and
//! `drools.lsp.serverPath`, from VSCode settings files, command-line
//! overrides and the `JAVA_HOME` environment variable.

pub mod vscode;

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use vscode::{SETTINGS_NAMESPACE, SettingsError, VsCodeSettings};

/// Environment variable consulted when no Java home is configured.
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// Fully qualified name of the server path setting, shown to users.
pub const SERVER_PATH_SETTING: &str = "drools.lsp.serverPath";

/// Where to look for settings and which values to force.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Read the platform user settings.json.
    pub user_settings: bool,
    /// Workspace root whose `.vscode/settings.json` is read.
    pub workspace_root: Option<PathBuf>,
    /// Explicit settings file; failing to load it is an error.
    pub settings_file: Option<PathBuf>,
    /// Command-line Java home override.
    pub java_home: Option<String>,
    /// Command-line server path override.
    pub server_path: Option<String>,
}

/// Client configuration, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Java installation used to run the server.
    pub java_home: Option<PathBuf>,
    /// Explicit path to the server jar.
    pub server_path: Option<PathBuf>,
}

impl Config {
    /// Builds the configuration from merged settings.
    ///
    /// `env_java_home` is only used when the settings leave the Java home
    /// unset. Empty and whitespace-only values count as unset.
    #[must_use]
    pub fn from_settings(settings: &VsCodeSettings, env_java_home: Option<&str>) -> Self {
        let java_home = normalize(settings.java_home.as_deref()).or_else(|| normalize(env_java_home));
        Self {
            java_home,
            server_path: normalize(settings.server_path.as_deref()),
        }
    }

    /// Loads the configuration from all sources.
    ///
    /// Later sources win: user settings, workspace settings, the explicit
    /// settings file, then command-line overrides. Missing or malformed
    /// implicit settings files are skipped.
    ///
    /// # Errors
    /// Returns error if the explicit settings file cannot be loaded.
    pub fn load(sources: &ConfigSources) -> Result<Self, SettingsError> {
        let mut settings = VsCodeSettings::default();

        if sources.user_settings {
            if let Some(path) = VsCodeSettings::user_settings_path() {
                merge_optional(&mut settings, &path);
            }
        }

        if let Some(root) = &sources.workspace_root {
            merge_optional(&mut settings, &VsCodeSettings::workspace_settings_path(root));
        }

        if let Some(path) = &sources.settings_file {
            settings.merge(VsCodeSettings::load_from_path(path)?);
            debug!("Loaded settings from {}", path.display());
        }

        settings.merge(VsCodeSettings {
            java_home: sources.java_home.clone(),
            server_path: sources.server_path.clone(),
        });

        let env_java_home = env::var(JAVA_HOME_ENV).ok();
        Ok(Self::from_settings(&settings, env_java_home.as_deref()))
    }
}

/// Merges a settings file that may legitimately be absent.
fn merge_optional(settings: &mut VsCodeSettings, path: &Path) {
    if !path.exists() {
        return;
    }
    match VsCodeSettings::load_from_path(path) {
        Ok(found) => {
            debug!("Loaded settings from {}", path.display());
            settings.merge(found);
        }
        Err(e) => warn!("Skipping settings: {}", e),
    }
}

/// Turns a raw setting value into a path, treating blank as unset.
fn normalize(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;

    use super::*;

    fn settings(java_home: Option<&str>, server_path: Option<&str>) -> VsCodeSettings {
        VsCodeSettings {
            java_home: java_home.map(String::from),
            server_path: server_path.map(String::from),
        }
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = Config::from_settings(&settings(Some(""), Some("   ")), None);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_java_home_only_when_unset() {
        let config = Config::from_settings(&settings(None, None), Some("/usr/lib/jvm/17"));
        assert_eq!(config.java_home, Some(PathBuf::from("/usr/lib/jvm/17")));

        let config = Config::from_settings(&settings(Some("/opt/jdk17"), None), Some("/usr/lib/jvm/17"));
        assert_eq!(config.java_home, Some(PathBuf::from("/opt/jdk17")));

        let config = Config::from_settings(&settings(Some(" "), None), Some("/usr/lib/jvm/17"));
        assert_eq!(config.java_home, Some(PathBuf::from("/usr/lib/jvm/17")));
    }

    #[test]
    fn test_values_are_trimmed() {
        let config = Config::from_settings(&settings(None, Some("  /srv/server.jar ")), None);
        assert_eq!(config.server_path, Some(PathBuf::from("/srv/server.jar")));
    }

    #[test]
    fn test_load_precedence() {
        let temp_dir = tempfile::TempDir::new().expect("temp dir");
        let root = temp_dir.path();

        fs::create_dir_all(root.join(".vscode")).unwrap();
        fs::write(
            root.join(".vscode").join("settings.json"),
            r#"{ "drools.lsp.serverPath": "/workspace.jar", "drools.lsp.javaHome": "/ws/jdk" }"#,
        )
        .unwrap();

        let explicit = root.join("explicit.json");
        fs::write(&explicit, r#"{ "drools.lsp": { "serverPath": "/explicit.jar" } }"#).unwrap();

        let sources = ConfigSources {
            workspace_root: Some(root.to_path_buf()),
            settings_file: Some(explicit),
            java_home: Some("/cli/jdk".into()),
            ..ConfigSources::default()
        };

        let config = Config::load(&sources).expect("config loaded");
        assert_eq!(config.server_path, Some(PathBuf::from("/explicit.jar")));
        assert_eq!(config.java_home, Some(PathBuf::from("/cli/jdk")));
    }

    #[test]
    fn test_load_skips_malformed_workspace_settings() {
        let temp_dir = tempfile::TempDir::new().expect("temp dir");
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".vscode")).unwrap();
        fs::write(root.join(".vscode").join("settings.json"), "{ broken").unwrap();

        let sources = ConfigSources {
            workspace_root: Some(root.to_path_buf()),
            server_path: Some("/cli.jar".into()),
            ..ConfigSources::default()
        };

        let config = Config::load(&sources).expect("config loaded");
        assert_eq!(config.server_path, Some(PathBuf::from("/cli.jar")));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let sources = ConfigSources {
            settings_file: Some(PathBuf::from("/definitely/not/here/settings.json")),
            ..ConfigSources::default()
        };

        let err = Config::load(&sources).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
