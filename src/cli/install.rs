//! `download`: resolve, fetch and install a plugin.

use anyhow::{Context as _, Result};

use plugman::fetch::{DownloadProgress, NoProgress};
use plugman::plugins::VersionRequest;
use plugman::PlugmanError;

use super::progress::ConsoleProgress;
use super::Context;

pub(crate) async fn cmd_download(ctx: &Context, module: &str, version: &str) -> Result<()> {
    let request = VersionRequest::parse(version);

    let mut console;
    let mut quiet = NoProgress;
    let progress: &mut (dyn DownloadProgress + Send) = if ctx.quiet {
        &mut quiet
    } else {
        console = ConsoleProgress::new(module);
        &mut console
    };

    let outcome = match ctx.manager.download(module, &request, progress).await {
        Ok(outcome) => outcome,
        Err(e @ PlugmanError::ExtractionError { .. }) => {
            return Err(e).with_context(|| {
                format!(
                    "Install of {} was interrupted; partially extracted files may remain under {}. \
                     Remove them before retrying.",
                    module,
                    ctx.layout.pkg_dir().display()
                )
            });
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to download {}@{}", module, version))
        }
    };

    println!(
        "Installed {}@{} ({}) into {}",
        module,
        outcome.version.version,
        outcome.version.time.format("%Y-%m-%d"),
        outcome.install.plugin_dir.display()
    );
    Ok(())
}
