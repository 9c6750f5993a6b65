// src/commands/progress.rs
//! Progress display for batch operations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Per-package progress bar for a batch of known length
///
/// The orchestrator sets the length once the package list is known.
pub fn batch_progress(operation: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {prefix} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_prefix(operation.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
