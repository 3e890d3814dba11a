//! Mining loop
//!
//! Each repository moves through `Pending -> Cloned -> Analyzed -> Interned -> Marked`.
//! Only `Marked` is persisted. A repository that stops short of it stays in
//! the queue and is picked up again by the next run.

use std::time::Instant;
use tracing::{debug, error, info, warn};
use crate::Result;
use crate::intern::intern_report;
use crate::record::{CompletionMarker, MiningOutcome};
use crate::repository::Repository;
use crate::storage::SqliteStore;
use crate::ui::MiningProgress;
use super::analyzer::Analyzer;
use super::workspace::{Cloner, WorkingCopy};

/// Per-repository progress through the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Cloned,
    Analyzed,
    Interned,
    Marked,
}

/// How mining one repository ended
#[derive(Debug, Clone, PartialEq)]
pub enum RepoResult {
    /// A completion marker was written
    Marked { marker: CompletionMarker, matches: usize },
    /// Nothing was marked; the repository remains pending
    Unmarked { stage: Stage, reason: String },
}

/// Totals for one mining run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningSummary {
    pub processed: usize,
    pub analyzed: usize,
    pub clone_failures: usize,
    pub analyzer_failures: usize,
    pub unmarked: usize,
    pub matches: usize,
}

impl MiningSummary {
    fn record(&mut self, result: &RepoResult) {
        self.processed += 1;
        match result {
            RepoResult::Marked { marker, matches } => {
                self.matches += matches;
                match marker.outcome {
                    MiningOutcome::Analyzed => self.analyzed += 1,
                    MiningOutcome::CloneFailed => self.clone_failures += 1,
                    MiningOutcome::AnalyzerFailed => self.analyzer_failures += 1,
                }
            }
            RepoResult::Unmarked { .. } => self.unmarked += 1,
        }
    }
}

/// Drains the unmined queue one repository at a time
pub struct Miner<'a, C: Cloner, A: Analyzer> {
    store: &'a mut SqliteStore,
    cloner: C,
    analyzer: A,
    remove_after_mining: bool,
    progress: Option<MiningProgress>,
}

impl<'a, C: Cloner, A: Analyzer> Miner<'a, C, A> {
    pub fn new(store: &'a mut SqliteStore, cloner: C, analyzer: A) -> Self {
        Self {
            store,
            cloner,
            analyzer,
            remove_after_mining: false,
            progress: None,
        }
    }

    /// Delete each working copy once its marker is written
    pub fn remove_after_mining(mut self, remove: bool) -> Self {
        self.remove_after_mining = remove;
        self
    }

    pub fn with_progress(mut self, progress: MiningProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Mine every repository without a completion marker.
    ///
    /// Repositories left unmarked are not revisited within the same run.
    pub fn run(&mut self) -> Result<MiningSummary> {
        let pending = self.store.count_unmined()?;
        info!("Mining {} repositories", pending);
        if let Some(progress) = &self.progress {
            progress.set_length(pending);
        }

        let mut summary = MiningSummary::default();
        let mut last_id = None;
        while let Some(repo) = self.store.next_unmined_repository_after(last_id)? {
            last_id = Some(repo.id);
            if let Some(progress) = &self.progress {
                progress.start_repository(&repo.name);
            }

            let result = self.mine_one(&repo);
            summary.record(&result);

            if let Some(progress) = &self.progress {
                progress.finish_repository(&result);
            }
        }
        if let Some(progress) = &self.progress {
            progress.finish();
        }

        info!(
            processed = summary.processed,
            analyzed = summary.analyzed,
            unmarked = summary.unmarked,
            "Mining run finished"
        );
        Ok(summary)
    }

    /// Take one repository as far through the stages as it will go
    pub fn mine_one(&mut self, repo: &Repository) -> RepoResult {
        debug!(repo_id = repo.id, stage = ?Stage::Pending, "Mining '{}'", repo.name);

        let copy = match self.cloner.obtain_working_copy(&repo.clone_url, &repo.name) {
            Ok(copy) => copy,
            Err(e) => {
                warn!("Skipping '{}': {}", repo.name, e);
                let marker = CompletionMarker::failed(repo.id, MiningOutcome::CloneFailed, 0.0);
                return self.mark(repo, marker, 0, Stage::Pending, None);
            }
        };
        debug!(repo_id = repo.id, stage = ?Stage::Cloned, reused = copy.reused);

        let started = Instant::now();

        let run = match self.analyzer.run_analyzer(&copy.path, &repo.id.to_string()) {
            Ok(run) => run,
            Err(e) => {
                error!("Analyzer failed on '{}': {}", repo.name, e);
                let marker = CompletionMarker::failed(
                    repo.id,
                    MiningOutcome::AnalyzerFailed,
                    started.elapsed().as_secs_f64(),
                );
                return self.mark(repo, marker, 0, Stage::Cloned, Some(&copy));
            }
        };
        debug!(repo_id = repo.id, stage = ?Stage::Analyzed, exit_code = ?run.exit_code);

        let stats = match intern_report(self.store, repo.id, &run.report) {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to record results for '{}': {}", repo.name, e);
                return RepoResult::Unmarked {
                    stage: Stage::Analyzed,
                    reason: e.to_string(),
                };
            }
        };
        debug!(repo_id = repo.id, stage = ?Stage::Interned, matches = stats.matches);

        let marker = CompletionMarker::analyzed(
            repo.id,
            run.summary.successful,
            run.summary.errors,
            run.elapsed.as_secs_f64(),
        );
        self.mark(repo, marker, stats.matches, Stage::Interned, Some(&copy))
    }

    fn mark(
        &mut self,
        repo: &Repository,
        marker: CompletionMarker,
        matches: usize,
        stage: Stage,
        copy: Option<&WorkingCopy>,
    ) -> RepoResult {
        if let Err(e) = self.store.mark_completed(&marker) {
            error!("Failed to set '{}' as mined: {}", repo.name, e);
            return RepoResult::Unmarked {
                stage,
                reason: e.to_string(),
            };
        }
        debug!(repo_id = repo.id, stage = ?Stage::Marked, outcome = %marker.outcome);
        info!("Finished mining '{}' ({})", repo.name, marker.outcome);

        if self.remove_after_mining {
            if let Some(copy) = copy {
                if let Err(e) = self.cloner.remove_working_copy(copy) {
                    warn!("Failed to remove {:?}: {}", copy.path, e);
                }
            }
        }

        RepoResult::Marked { marker, matches }
    }
}
