//! Command implementations for the `plugman` binary.

pub(crate) mod install;
pub(crate) mod list;
pub(crate) mod progress;
pub(crate) mod remove;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use plugman::config::DEFAULT_ROOT;
use plugman::plugins::DetectionPolicy;
use plugman::{Config, InstallLayout, PluginManager};

/// Everything a command needs, loaded once at startup.
pub(crate) struct Context {
    pub(crate) config: Config,
    pub(crate) layout: InstallLayout,
    pub(crate) manager: PluginManager,
    pub(crate) quiet: bool,
}

impl Context {
    pub(crate) fn load(root: Option<PathBuf>, strict: bool, quiet: bool) -> Result<Self> {
        let layout = InstallLayout::new(root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)));
        layout
            .ensure()
            .with_context(|| format!("Failed to prepare install root {}", layout.root().display()))?;

        let config = Config::load_or_init(&layout.config_file())
            .with_context(|| "Failed to load configuration")?
            .with_env_overrides();

        let policy = if strict {
            DetectionPolicy::ManifestAndModuleFile
        } else {
            DetectionPolicy::ManifestOnly
        };
        let manager = PluginManager::new(&config, layout.clone()).with_policy(policy);

        Ok(Self {
            config,
            layout,
            manager,
            quiet,
        })
    }
}

pub(crate) fn cmd_init(ctx: &Context) -> Result<()> {
    println!("Install root: {}", ctx.layout.root().display());
    println!("  pkg:    {}", ctx.layout.pkg_dir().display());
    println!("  cache:  {}", ctx.layout.cache_dir().display());
    println!("  config: {}", ctx.layout.config_file().display());
    Ok(())
}

pub(crate) fn cmd_config_show(ctx: &Context) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}
