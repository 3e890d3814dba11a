//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - repos(repo_id, name, clone_url, stars)
//! - mined(repo_id, n_success, n_error, elapsed, outcome)
//! - files(file_id, repo_id, path)
//! - matches(match_id, file_id, line, col, vector_kind, tile_width, strategy_index)
//!
//! The store assumes a single writer. Every logical operation runs in its own
//! transaction and rolls back completely on failure.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, ResultWriter, SqliteStore, NO_STARS_SEEN};
