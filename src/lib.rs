//! Plugman - local package manager for registry-hosted plugins

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod plugins;
pub mod registry;
pub mod sandbox;

pub use config::{Config, InstallLayout};
pub use error::{PlugmanError, Result};
pub use manager::{DownloadOutcome, PluginManager};
