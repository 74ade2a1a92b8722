//! Error types for Plugman
//!
//! This module defines all error types used throughout the plugin manager.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for Plugman operations.
#[derive(Error, Debug)]
pub enum PlugmanError {
    /// The registry answered with a non-success status, or could not be reached.
    #[error("Registry unavailable for '{module}': {}", describe_status(.status, .reason))]
    RegistryUnavailable {
        module: String,
        status: Option<u16>,
        reason: String,
    },

    /// One of the per-version lookups of a version listing failed.
    #[error("Version info unavailable for {module}@{version}: {source}")]
    VersionInfoUnavailable {
        module: String,
        version: String,
        #[source]
        source: Box<PlugmanError>,
    },

    /// A registry body did not decode as the expected record.
    #[error("Malformed registry response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// The module path is not something the registry can address.
    #[error("Invalid module path '{0}'")]
    InvalidModulePath(String),

    /// Transport or local write failure while fetching an archive.
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The archive file could not be opened as a zip container.
    #[error("Cannot open archive {}: {reason}", .path.display())]
    ArchiveOpenError { path: PathBuf, reason: String },

    /// The archive has no manifest file and is not a plugin package.
    #[error("{} is not a plugin archive: no manifest.json entry found", .path.display())]
    NotAPluginArchive { path: PathBuf },

    /// An archive entry would be written outside the install root.
    #[error("Archive {} contains unsafe entry '{entry}'", .path.display())]
    UnsafeArchiveEntry { path: PathBuf, entry: String },

    /// Writing an archive entry failed after extraction had started.
    #[error("Extraction of '{entry}' failed: {source}")]
    ExtractionError {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// A directory name does not follow the `<leaf>@<version>` convention.
    #[error("Invalid plugin path {}: {reason}", .path.display())]
    InvalidPluginPath { path: PathBuf, reason: String },

    /// A plugin manifest could not be read or parsed.
    #[error("Invalid manifest {}: {reason}", .path.display())]
    ManifestError { path: PathBuf, reason: String },

    /// One or more plugin directories could not be deleted.
    #[error("Removal incomplete: {}", describe_failures(.failed))]
    PartialRemoval { failed: Vec<PathBuf> },

    /// Configuration-related errors (unreadable or invalid config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Security violations (path traversal attempts, escaping paths, etc.)
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// A script host operation that the active policy does not grant.
    #[error("Capability denied: {0}")]
    CapabilityDenied(String),

    /// An external process launched from the script host failed.
    #[error("Script command failed: {0}")]
    ScriptFailed(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_status(status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("status code {} ({})", code, reason),
        None => reason.to_string(),
    }
}

fn describe_failures(failed: &[PathBuf]) -> String {
    if failed.len() == 1 {
        "1 directory could not be deleted".to_string()
    } else {
        format!("{} directories could not be deleted", failed.len())
    }
}

impl PlugmanError {
    /// The HTTP status attached to a registry failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlugmanError::RegistryUnavailable { status, .. } => *status,
            PlugmanError::VersionInfoUnavailable { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for Plugman operations.
pub type Result<T> = std::result::Result<T, PlugmanError>;
