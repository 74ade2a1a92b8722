//! `list remote` and `list local`.

use anyhow::{Context as _, Result};

use super::Context;

pub(crate) async fn cmd_list_remote(ctx: &Context, module: &str) -> Result<()> {
    let versions = ctx
        .manager
        .list_remote(module)
        .await
        .with_context(|| format!("Failed to list versions of {}", module))?;

    if versions.is_empty() {
        println!("No published versions for {}", module);
        return Ok(());
    }
    for v in versions {
        println!("{}\t{}", v.version, v.time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

pub(crate) fn cmd_list_local(ctx: &Context) -> Result<()> {
    let plugins = ctx
        .manager
        .list_local()
        .with_context(|| "Failed to index installed plugins")?;

    if plugins.is_empty() {
        println!("No plugins installed in {}", ctx.layout.pkg_dir().display());
        return Ok(());
    }

    for plugin in plugins {
        println!("Name\t{}", plugin.name);
        println!("Version\t{}", plugin.version);
        println!("Path\t{}", plugin.path.display());
        if let Some(manifest) = &plugin.manifest {
            for (label, value) in [
                ("Author", &manifest.author),
                ("About", &manifest.description),
                ("License", &manifest.license),
            ] {
                if !value.is_empty() {
                    println!("{}\t{}", label, value);
                }
            }
        }
        println!();
    }
    Ok(())
}
