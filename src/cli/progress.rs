//! Console download progress.

use indicatif::{ProgressBar, ProgressStyle};

use plugman::fetch::DownloadProgress;

const BAR_TEMPLATE: &str = "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

/// Renders a progress bar on stderr for one download.
pub(crate) struct ConsoleProgress {
    label: String,
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub(crate) fn new(label: &str) -> Self {
        Self {
            label: format!("Downloading {}", label),
            bar: None,
        }
    }
}

impl DownloadProgress for ConsoleProgress {
    fn start(&mut self, total: Option<u64>) {
        let (bar, template) = match total {
            Some(len) => (ProgressBar::new(len), BAR_TEMPLATE),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(self.label.clone());
        self.bar = Some(bar);
    }

    fn advance(&mut self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} done", self.label));
        }
    }

    fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon_with_message(format!("{} failed", self.label));
        }
    }
}
