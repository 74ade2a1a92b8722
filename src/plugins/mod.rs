//! Installed plugin management for Plugman
//!
//! Plugins live under the `pkg` directory of the install root. Their identity
//! is encoded in the directory layout: every path segment below `pkg` is part
//! of the hierarchical name, and the last segment carries the version after
//! its final `@`. Each plugin directory holds a `manifest.json` at its own
//! level.
//!
//! # Architecture
//!
//! - **types**: Core data structures (`PluginManifest`, `PluginInfo`, selectors, `DetectionPolicy`)
//! - **loader**: Identity parsing and manifest loading for a single directory
//! - **index**: Depth-first discovery of every installed plugin
//! - **prune**: Removal of plugin directories and empty-directory reclamation
//!
//! # Package Directory Structure
//!
//! ```text
//! plugins/PluginManager/pkg/
//! ├── github.com/
//! │   └── acme/
//! │       ├── teleport@v1.0.0/
//! │       │   ├── manifest.json
//! │       │   └── index.js
//! │       └── teleport@v1.1.0/
//! │           └── manifest.json
//! └── example.org/
//!     └── tools/
//!         └── backup@v0.3.2/
//!             └── manifest.json
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use plugman::plugins::{PackageIndexer, Pruner, VersionSelector};
//!
//! let indexer = PackageIndexer::new("plugins/PluginManager/pkg");
//! let installed = indexer.scan().unwrap();
//!
//! let pruner = Pruner::new(indexer.root());
//! let report = pruner
//!     .remove(&installed, "github.com/acme/teleport", &VersionSelector::All)
//!     .unwrap();
//! println!("Removed {} plugins", report.removed.len());
//! ```

pub mod index;
mod loader;
pub mod prune;
pub mod types;

pub use index::{PackageIndexer, Visit};
pub use loader::{load_manifest, load_plugin, parse_plugin_identity};
pub use prune::{Pruner, RemovalReport};
pub use types::{
    DetectionPolicy, PluginIdentity, PluginInfo, PluginManifest, VersionRequest,
    VersionSelector, MANIFEST_FILE, MODULE_FILE,
};
