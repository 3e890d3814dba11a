use crate::miner::RepoResult;
use crate::record::MiningOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn visible(pb: ProgressBar) -> ProgressBar {
    if console::Term::stdout().is_term() {
        pb
    } else {
        ProgressBar::hidden()
    }
}

/// One bar across the mining queue
pub struct MiningProgress {
    pb: ProgressBar,
}

impl MiningProgress {
    pub fn new() -> Self {
        let pb = visible(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        Self { pb }
    }

    pub fn set_length(&self, pending: usize) {
        self.pb.set_length(pending as u64);
    }

    pub fn start_repository(&self, name: &str) {
        self.pb.enable_steady_tick(Duration::from_millis(100));
        self.pb.set_message(format!("Mining: {}", name));
    }

    pub fn finish_repository(&self, result: &RepoResult) {
        match result {
            RepoResult::Marked { marker, .. } if marker.outcome != MiningOutcome::Analyzed => {
                self.pb.println(format!("  skipped repo {} ({})", marker.repo_id, marker.outcome));
            }
            RepoResult::Unmarked { reason, .. } => {
                self.pb.println(format!("  left pending: {}", reason));
            }
            _ => {}
        }
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Default for MiningProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = visible(ProgressBar::new_spinner());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
