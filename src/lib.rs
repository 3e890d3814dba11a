//! # Repomine - repository crawl-and-mine pipeline
//!
//! Discovers repositories above a star threshold, runs an external static
//! analyzer over each one, and records its findings.
//!
//! Repomine provides:
//! - Star-bucketed discovery that works around the search API's result cap
//! - A SQLite-backed, resumable work queue with completion markers
//! - A mining loop that clones, analyzes, interns and marks each repository
//! - A strict parser for the analyzer's line-oriented report

pub mod repository;
pub mod record;
pub mod storage;
pub mod discovery;
pub mod miner;
pub mod intern;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use repository::Repository;
pub use record::{CompletionMarker, FileRecord, Finding, MatchRecord, MiningOutcome};
pub use storage::SqliteStore;
pub use discovery::{Discovery, DiscoveryCursor, DiscoveryOptions, GitHubSearch};
pub use miner::{ExternalAnalyzer, GitCloner, Miner};

use std::path::PathBuf;

/// Result type alias for Repomine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Repomine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search error: {0}")]
    Search(String),

    #[error("git not found: {}", .0.display())]
    GitNotFound(PathBuf),

    #[error("Analyzer not found: {}", .0.display())]
    AnalyzerNotFound(PathBuf),

    #[error("Failed to clone '{name}': {reason}")]
    Clone { name: String, reason: String },

    #[error("Analyzer error: {0}")]
    Analyzer(String),

    #[error("Invalid mining outcome: {0}")]
    InvalidOutcome(String),
}
