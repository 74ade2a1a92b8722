//! Plugin types for Plugman
//!
//! This module defines the types describing installed plugins: the manifest
//! parsed from `manifest.json`, the identity reconstructed from a plugin's
//! directory name, and the selectors used by download and removal.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File that marks a directory as a plugin and gates archive installation.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Module definition file required by the strict detection policy.
pub const MODULE_FILE: &str = "go.mod";

/// The manifest shipped at the root of every plugin directory.
///
/// Every field is optional on disk and defaults to an empty string. Keys are
/// accepted in lower case or capitalised form (`author` / `Author`).
///
/// # Example
///
/// ```json
/// {
///   "author": "acme",
///   "description": "Adds teleport commands",
///   "license": "MIT",
///   "install": "scripts/install.js",
///   "uninstall": "scripts/uninstall.js"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    #[serde(alias = "Author")]
    pub author: String,

    #[serde(alias = "Description")]
    pub description: String,

    #[serde(alias = "License")]
    pub license: String,

    /// Script run after installation.
    #[serde(alias = "Install")]
    pub install: String,

    /// Script run before removal.
    #[serde(alias = "Uninstall")]
    pub uninstall: String,
}

/// Name and version reconstructed from a `<segments>/<leaf>@<version>` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginIdentity {
    /// `/`-separated hierarchical name, e.g. `github.com/acme/tool`.
    pub name: String,
    pub version: String,
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// An installed plugin found on disk.
///
/// Values are snapshots of one scan; rescan to observe changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    /// Directory the plugin is installed in.
    pub path: PathBuf,
    /// Parsed manifest. Always present for scanned plugins.
    pub manifest: Option<PluginManifest>,
}

impl PluginInfo {
    /// Plugin record without manifest data.
    pub fn from_identity(identity: PluginIdentity, path: PathBuf) -> Self {
        Self {
            name: identity.name,
            version: identity.version,
            path,
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// `name@version`
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Whether this plugin is selected by `name` and `selector`.
    pub fn matches(&self, name: &str, selector: &VersionSelector) -> bool {
        self.name == name && selector.matches(&self.version)
    }
}

/// Which version a download should resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Exact(String),
}

impl VersionRequest {
    /// `@latest` / `latest` (or empty) select the newest version.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "@latest" | "latest" => Self::Latest,
            v => Self::Exact(v.to_string()),
        }
    }
}

/// Which installed versions a removal targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    All,
    Exact(String),
}

impl VersionSelector {
    /// `@all` / `all` (or empty) select every installed version.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "@all" | "all" => Self::All,
            v => Self::Exact(v.to_string()),
        }
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(v) => v == version,
        }
    }
}

/// Rule deciding whether a directory is a plugin installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectionPolicy {
    /// `manifest.json` directly inside the directory.
    #[default]
    ManifestOnly,
    /// Both `manifest.json` and `go.mod` directly inside the directory.
    ManifestAndModuleFile,
}

impl DetectionPolicy {
    /// Check the marker files directly inside `dir`.
    pub fn is_plugin_dir(&self, dir: &Path) -> bool {
        let has_manifest = dir.join(MANIFEST_FILE).is_file();
        match self {
            Self::ManifestOnly => has_manifest,
            Self::ManifestAndModuleFile => has_manifest && dir.join(MODULE_FILE).is_file(),
        }
    }
}
