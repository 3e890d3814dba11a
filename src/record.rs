//! Mining records - completion markers and interned findings
//!
//! - `CompletionMarker`: the durable "done" signal for one repository
//! - `FileRecord`: one analyzed path within a repository
//! - `Finding`: one parsed report line
//! - `MatchRecord`: one finding reported by the analyzer

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a mining attempt ended.
///
/// Every outcome writes a completion marker, so a repository is never picked
/// twice. Failure outcomes can be cleared with `reset-failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningOutcome {
    /// The analyzer ran and its report was interned
    Analyzed,
    /// No working copy could be obtained; the analyzer was not run
    CloneFailed,
    /// The analyzer process could not be started
    AnalyzerFailed,
}

impl MiningOutcome {
    /// Get the string representation stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            MiningOutcome::Analyzed => "analyzed",
            MiningOutcome::CloneFailed => "clone_failed",
            MiningOutcome::AnalyzerFailed => "analyzer_failed",
        }
    }

    /// Get all outcomes
    pub fn all() -> &'static [MiningOutcome] {
        &[
            MiningOutcome::Analyzed,
            MiningOutcome::CloneFailed,
            MiningOutcome::AnalyzerFailed,
        ]
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, MiningOutcome::Analyzed)
    }
}

impl FromStr for MiningOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analyzed" => Ok(MiningOutcome::Analyzed),
            "clone_failed" => Ok(MiningOutcome::CloneFailed),
            "analyzer_failed" => Ok(MiningOutcome::AnalyzerFailed),
            _ => Err(Error::InvalidOutcome(s.to_string())),
        }
    }
}

impl std::fmt::Display for MiningOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marks a repository as processed. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub repo_id: i64,
    /// "Successful: N" reported by the analyzer
    pub success_count: i64,
    /// "Errors: N" reported by the analyzer
    pub error_count: i64,
    /// Wall-clock time of the analyzer run
    pub elapsed_seconds: f64,
    pub outcome: MiningOutcome,
}

impl CompletionMarker {
    /// Marker for a repository whose analyzer run finished
    pub fn analyzed(repo_id: i64, success_count: i64, error_count: i64, elapsed_seconds: f64) -> Self {
        Self {
            repo_id,
            success_count,
            error_count,
            elapsed_seconds,
            outcome: MiningOutcome::Analyzed,
        }
    }

    /// Marker for a repository that could not be mined
    pub fn failed(repo_id: i64, outcome: MiningOutcome, elapsed_seconds: f64) -> Self {
        Self {
            repo_id,
            success_count: 0,
            error_count: 0,
            elapsed_seconds,
            outcome,
        }
    }
}

/// A source file that has at least one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: i64,
    pub repo_id: i64,
    /// Path as printed by the analyzer
    pub path: String,
}

/// One parsed line of an analyzer report, before it is interned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub path: String,
    pub line: i64,
    pub column: i64,
    pub vector_kind: i64,
    pub tile_width: i64,
    pub strategy_index: i64,
}

/// A single analyzer finding, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: i64,
    pub file_id: i64,
    pub line: i64,
    pub column: i64,
    pub vector_kind: i64,
    pub tile_width: i64,
    pub strategy_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_roundtrip() {
        for outcome in MiningOutcome::all() {
            let parsed: MiningOutcome = outcome.as_str().parse().unwrap();
            assert_eq!(*outcome, parsed);
        }
        assert!("done".parse::<MiningOutcome>().is_err());
    }

    #[test]
    fn test_failed_marker_has_zero_counts() {
        let marker = CompletionMarker::failed(7, MiningOutcome::CloneFailed, 0.0);
        assert_eq!(marker.success_count, 0);
        assert_eq!(marker.error_count, 0);
        assert!(marker.outcome.is_failure());
        assert!(!CompletionMarker::analyzed(7, 1, 2, 0.5).outcome.is_failure());
    }
}
