//! Loading a single installed plugin from its directory.
//!
//! A plugin's identity comes from where it sits under the `pkg` root, not
//! from its manifest: `pkg/a/b/mod@1.2.3` is plugin `a/b/mod` at version
//! `1.2.3`. `parse_plugin_identity` is the only place that splits paths into
//! names and versions.

use std::fs;
use std::path::{Component, Path};

use crate::error::{PlugmanError, Result};

use super::types::{PluginIdentity, PluginInfo, PluginManifest, MANIFEST_FILE};

/// Reconstruct `(name, version)` from a plugin directory under `root`.
///
/// The last path segment is split at its **last** `@`, so `x@y@1.0` is leaf
/// `x@y` at version `1.0`. Segments between `root` and the leaf become the
/// leading part of the `/`-separated name.
///
/// # Errors
/// `InvalidPluginPath` if `path` is not strictly below `root`, contains
/// non-UTF-8 or relative (`..`) segments, or the final segment has no `@`,
/// an empty leaf, or an empty version.
pub fn parse_plugin_identity(path: &Path, root: &Path) -> Result<PluginIdentity> {
    let invalid = |reason: &str| PlugmanError::InvalidPluginPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let relative = path
        .strip_prefix(root)
        .map_err(|_| invalid("not inside the package root"))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment
                    .to_str()
                    .ok_or_else(|| invalid("path is not valid UTF-8"))?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => return Err(invalid("path contains relative or root components")),
        }
    }

    let dir_name = segments
        .pop()
        .ok_or_else(|| invalid("path is the package root itself"))?;
    let (leaf, version) = dir_name
        .rsplit_once('@')
        .ok_or_else(|| invalid("directory name has no '@<version>' suffix"))?;
    if leaf.is_empty() {
        return Err(invalid("directory name has an empty plugin name"));
    }
    if version.is_empty() {
        return Err(invalid("directory name has an empty version"));
    }

    segments.push(leaf);
    Ok(PluginIdentity {
        name: segments.join("/"),
        version: version.to_string(),
    })
}

/// Read and parse `manifest.json` from a plugin directory.
pub fn load_manifest(dir: &Path) -> Result<PluginManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&manifest_path).map_err(|e| PlugmanError::ManifestError {
        path: manifest_path.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| PlugmanError::ManifestError {
        path: manifest_path,
        reason: e.to_string(),
    })
}

/// Load the plugin installed at `dir`, a directory under `root`.
pub fn load_plugin(dir: &Path, root: &Path) -> Result<PluginInfo> {
    let identity = parse_plugin_identity(dir, root)?;
    let manifest = load_manifest(dir)?;
    Ok(PluginInfo::from_identity(identity, dir.to_path_buf()).with_manifest(manifest))
}
