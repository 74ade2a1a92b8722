//! Configuration and on-disk layout for Plugman
//!
//! The install root holds three things:
//!
//! ```text
//! plugins/PluginManager/
//! ├── PluginManager.json   # {"source": "<registry base url>"}
//! ├── cache/               # downloaded archives, <leaf>-<version>.zip
//! └── pkg/                 # installed plugins, <name segments>/<leaf>@<version>/
//! ```
//!
//! `Config` is loaded once at startup and handed to the components that need
//! it. Nothing in the crate reads configuration from global state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PlugmanError, Result};

/// Registry used when no config file exists yet.
pub const DEFAULT_SOURCE: &str = "https://goproxy.io";

/// Default install root, relative to the working directory.
pub const DEFAULT_ROOT: &str = "plugins/PluginManager";

/// Name of the config file inside the install root.
pub const CONFIG_FILE_NAME: &str = "PluginManager.json";

/// Environment variable overriding the install root.
pub const ROOT_ENV: &str = "PLUGMAN_ROOT";

/// Environment variable overriding the registry base URL.
pub const REGISTRY_ENV: &str = "PLUGMAN_REGISTRY";

/// Persisted plugin manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Registry base URL, e.g. `https://goproxy.io`.
    #[serde(default = "default_source", alias = "Source")]
    pub source: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

impl Config {
    /// Load the config file, creating it with defaults when it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), source = %config.source, "Initialized config");
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PlugmanError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            PlugmanError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        debug!(path = %path.display(), source = %config.source, "Loaded config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PlugmanError::Config(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            PlugmanError::Config(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Replace the registry source with `PLUGMAN_REGISTRY` when it is set.
    ///
    /// The override only lives for this process; the file is left untouched.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(source) = std::env::var(REGISTRY_ENV) {
            let source = source.trim();
            if !source.is_empty() {
                debug!(source = %source, "Registry source overridden from environment");
                self.source = source.to_string();
            }
        }
        self
    }

    /// Registry base URL without a trailing slash.
    pub fn registry_url(&self) -> &str {
        self.source.trim_end_matches('/')
    }

    fn validate(&self) -> Result<()> {
        let source = self.source.trim();
        if source.is_empty() {
            return Err(PlugmanError::Config(
                "Registry source must not be empty".to_string(),
            ));
        }
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            return Err(PlugmanError::Config(format!(
                "Registry source '{}' must be an http(s) URL",
                source
            )));
        }
        Ok(())
    }
}

/// Paths of the three-way install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installed, importable plugins.
    pub fn pkg_dir(&self) -> PathBuf {
        self.root.join("pkg")
    }

    /// Downloaded archives.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Create the root, `pkg` and `cache` directories if missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.pkg_dir(), self.cache_dir()] {
            fs::create_dir_all(&dir).map_err(|e| {
                PlugmanError::Config(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_init_creates_default_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(CONFIG_FILE_NAME);

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.source, DEFAULT_SOURCE);
        assert!(path.exists());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["source"], DEFAULT_SOURCE);
    }

    #[test]
    fn test_load_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"source": "https://proxy.example.com/"}"#).unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.source, "https://proxy.example.com/");
        assert_eq!(config.registry_url(), "https://proxy.example.com");
    }

    #[test]
    fn test_load_accepts_capitalized_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"Source": "https://mirror.example.org"}"#).unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.source, "https://mirror.example.org");
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_or_init(&path).unwrap_err();
        assert!(matches!(err, PlugmanError::Config(_)));
    }

    #[test]
    fn test_load_rejects_non_http_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"source": "ftp://old.example.com"}"#).unwrap();

        let err = Config::load_or_init(&path).unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn test_env_override_replaces_source_but_not_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        let on_disk = r#"{"source": "https://proxy.example.com"}"#;
        fs::write(&path, on_disk).unwrap();

        std::env::set_var(REGISTRY_ENV, "https://override.example.net/");
        let config = Config::load_or_init(&path).unwrap().with_env_overrides();
        std::env::remove_var(REGISTRY_ENV);

        assert_eq!(config.source, "https://override.example.net/");
        assert_eq!(config.registry_url(), "https://override.example.net");
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);

        let config = Config::load_or_init(&path).unwrap().with_env_overrides();
        assert_eq!(config.source, "https://proxy.example.com");
    }

    #[test]
    fn test_layout_paths() {
        let layout = InstallLayout::new("/opt/pm");
        assert_eq!(layout.pkg_dir(), PathBuf::from("/opt/pm/pkg"));
        assert_eq!(layout.cache_dir(), PathBuf::from("/opt/pm/cache"));
        assert_eq!(
            layout.config_file(),
            PathBuf::from("/opt/pm/PluginManager.json")
        );
    }

    #[test]
    fn test_layout_ensure_creates_dirs() {
        let tmp = TempDir::new().unwrap();
        let layout = InstallLayout::new(tmp.path().join("root"));
        layout.ensure().unwrap();
        assert!(layout.pkg_dir().is_dir());
        assert!(layout.cache_dir().is_dir());
        // Idempotent
        layout.ensure().unwrap();
    }
}
