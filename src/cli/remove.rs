//! `remove`: delete installed versions of a plugin.

use anyhow::{Context as _, Result};

use plugman::plugins::VersionSelector;

use super::Context;

pub(crate) fn cmd_remove(ctx: &Context, name: &str, version: &str) -> Result<()> {
    let selector = VersionSelector::parse(version);
    let report = ctx
        .manager
        .remove(name, &selector)
        .with_context(|| format!("Failed to remove {}", name))?;

    if report.removed.is_empty() {
        println!("No installed plugin matches {} ({})", name, version);
        return Ok(());
    }
    for plugin in &report.removed {
        println!("Removed {}", plugin.id());
    }
    if report.swept > 0 {
        println!("Cleaned up {} empty directories", report.swept);
    }
    Ok(())
}
