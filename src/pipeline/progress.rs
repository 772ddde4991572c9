//! Per-phase progress display

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

/// Progress for one pipeline phase. Silent in quiet mode.
pub struct PhaseProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    processed: u64,
}

impl PhaseProgress {
    pub fn new(phase: &str, total_expected: Option<u64>, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = match total_expected {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{prefix:>10} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{prefix:>10} {spinner:.green} [{elapsed_precise}] {pos} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            };
            pb.set_prefix(phase.to_string());
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            processed: 0,
        }
    }

    /// Advance by one item, showing its label
    pub fn item(&mut self, label: &str) {
        self.processed += 1;
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(self.processed);

            // Truncated safely for UTF-8
            let display = if label.chars().count() > 30 {
                let truncated: String = label.chars().take(27).collect();
                format!("{}...", truncated)
            } else {
                label.to_string()
            };
            pb.set_message(display);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            pb.finish_with_message(format!("done ({} items, {:.1}s)", self.processed, elapsed));
        }
    }
}
