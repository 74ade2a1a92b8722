//! Local package indexer.
//!
//! Walks the `pkg` tree depth first and classifies each directory as a
//! plugin, a container to descend into, or irrelevant. A directory that is
//! classified as a plugin is never descended into, so files shipped inside a
//! plugin are not mistaken for nested plugins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;

use super::loader::load_plugin;
use super::types::{DetectionPolicy, PluginInfo};

/// Outcome of visiting one directory.
#[derive(Debug)]
pub enum Visit {
    /// The directory is an installed plugin. Do not descend.
    Plugin(PluginInfo),
    /// Not a plugin; these child directories should be visited.
    Container(Vec<PathBuf>),
    /// Nothing to report and nothing to descend into.
    Irrelevant,
}

/// Reconstructs the set of installed plugins from the `pkg` tree.
#[derive(Debug, Clone)]
pub struct PackageIndexer {
    root: PathBuf,
    policy: DetectionPolicy,
}

impl PackageIndexer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: DetectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DetectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    /// Classify one directory below the root.
    ///
    /// A candidate whose identity or manifest cannot be parsed is reported as
    /// `Irrelevant`: it is skipped, and its contents are not scanned.
    pub fn classify(&self, dir: &Path) -> Visit {
        if self.policy.is_plugin_dir(dir) {
            return match load_plugin(dir, &self.root) {
                Ok(plugin) => Visit::Plugin(plugin),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable plugin");
                    Visit::Irrelevant
                }
            };
        }

        match child_dirs(dir) {
            Ok(children) if children.is_empty() => Visit::Irrelevant,
            Ok(children) => Visit::Container(children),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory, skipping");
                Visit::Irrelevant
            }
        }
    }

    /// All installed plugins, in no particular order.
    ///
    /// A missing root yields an empty list. Only a failure to read the root
    /// itself is an error; problems below it are logged and skipped.
    pub fn scan(&self) -> Result<Vec<PluginInfo>> {
        let mut pending = match child_dirs(&self.root) {
            Ok(children) => children,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(root = %self.root.display(), "Package root does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        // Stack order: visit children in listing order.
        pending.reverse();

        let mut plugins = Vec::new();
        while let Some(dir) = pending.pop() {
            match self.classify(&dir) {
                Visit::Plugin(plugin) => {
                    debug!(plugin = %plugin.id(), path = %dir.display(), "Found plugin");
                    plugins.push(plugin);
                }
                Visit::Container(mut children) => {
                    children.reverse();
                    pending.extend(children);
                }
                Visit::Irrelevant => {}
            }
        }

        debug!(root = %self.root.display(), count = plugins.len(), "Indexed installed plugins");
        Ok(plugins)
    }
}

/// Child directories of `dir`, sorted by name. Symlinks are not followed.
fn child_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            children.push(entry.path());
        }
    }
    children.sort();
    Ok(children)
}
