//! Removal of installed plugins and empty-directory reclamation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PlugmanError, Result};

use super::types::{PluginInfo, VersionSelector};

/// What a removal did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    /// Plugins whose directories were deleted.
    pub removed: Vec<PluginInfo>,
    /// Empty directories reclaimed by the sweep.
    pub swept: usize,
}

/// Deletes plugin directories under a `pkg` root.
#[derive(Debug, Clone)]
pub struct Pruner {
    root: PathBuf,
}

impl Pruner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every plugin in `installed` matching `name` and `selector`.
    ///
    /// Every matching directory is attempted and the empty-directory sweep
    /// always runs. If any deletion failed the result is `PartialRemoval`
    /// listing the directories still on disk.
    pub fn remove(
        &self,
        installed: &[PluginInfo],
        name: &str,
        selector: &VersionSelector,
    ) -> Result<RemovalReport> {
        let mut report = RemovalReport::default();
        let mut failed = Vec::new();

        for plugin in installed.iter().filter(|p| p.matches(name, selector)) {
            if !plugin.path.starts_with(&self.root) || plugin.path == self.root {
                warn!(
                    plugin = %plugin.id(),
                    path = %plugin.path.display(),
                    "Refusing to delete a path outside the package root"
                );
                failed.push(plugin.path.clone());
                continue;
            }

            match fs::remove_dir_all(&plugin.path) {
                Ok(()) => {
                    info!(plugin = %plugin.id(), path = %plugin.path.display(), "Removed plugin");
                    report.removed.push(plugin.clone());
                }
                Err(e) => {
                    warn!(
                        plugin = %plugin.id(),
                        path = %plugin.path.display(),
                        error = %e,
                        "Failed to remove plugin"
                    );
                    failed.push(plugin.path.clone());
                }
            }
        }

        report.swept = self.sweep_empty_dirs();

        if !failed.is_empty() {
            return Err(PlugmanError::PartialRemoval { failed });
        }
        Ok(report)
    }

    /// Delete every empty directory below the root, leaves first.
    ///
    /// The root itself is kept. Best effort: directories that cannot be read
    /// or removed are logged and left in place. Returns the number removed.
    pub fn sweep_empty_dirs(&self) -> usize {
        let mut removed = 0;
        sweep(&self.root, true, &mut removed);
        debug!(root = %self.root.display(), removed, "Swept empty directories");
        removed
    }
}

fn sweep(dir: &Path, is_root: bool, removed: &mut usize) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if !is_root || e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory during sweep");
            }
            return;
        }
    };

    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            sweep(&entry.path(), false, removed);
        }
    }

    if is_root {
        return;
    }

    // Re-read: removing children may have emptied this directory.
    let now_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to re-read directory during sweep");
            false
        }
    };
    if now_empty {
        match fs::remove_dir(dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), "Removed empty directory");
                *removed += 1;
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove empty directory"),
        }
    }
}
