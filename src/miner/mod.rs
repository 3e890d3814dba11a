//! Mining: clone, analyze, intern, mark

pub mod analyzer;
pub mod orchestrator;
pub mod workspace;

pub use analyzer::{AnalysisSummary, Analyzer, AnalyzerRun, ExternalAnalyzer};
pub use orchestrator::{Miner, MiningSummary, RepoResult, Stage};
pub use workspace::{Cloner, GitCloner, WorkingCopy};
