//! Terminal progress for engine runs.

use colored::Colorize;
use declarative::{ProgressCallback, ResourceOperationResult};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Drives an indicatif bar from engine progress events.
///
/// Finished resources are printed above the bar; with `quiet` the bar is
/// hidden and only failures are printed.
pub struct ProgressReporter {
    bar: ProgressBar,
    quiet: bool,
}

impl ProgressReporter {
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        };
        Self { bar, quiet }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for ProgressReporter {
    fn on_batch_start(&mut self, index: usize, total_batches: usize, resources: &[String]) {
        log::info!(
            "batch {}/{total_batches}: {}",
            index + 1,
            resources.join(", ")
        );
        self.bar
            .set_message(format!("batch {}/{total_batches}", index + 1));
    }

    fn on_resource_start(&mut self, identity: &str, description: &str) {
        self.bar
            .set_message(format!("{identity} {}", description.dimmed()));
    }

    fn on_resource_complete(&mut self, result: &ResourceOperationResult) {
        if !self.quiet || !result.is_success() {
            let line = ui::result_line(result);
            self.bar.suspend(|| println!("  {line}"));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&mut self, index: usize) {
        log::debug!("batch {} complete", index + 1);
    }
}
