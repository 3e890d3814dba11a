//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;
use crate::{Error, Result};
use crate::record::{CompletionMarker, FileRecord, Finding, MatchRecord, MiningOutcome};
use crate::repository::Repository;
use super::schema;

/// Returned by `min_stars_seen` when no repository is known yet.
pub const NO_STARS_SEEN: i64 = 10_000_000;

/// SQLite-backed storage for the crawl queue and mining results
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %journal_mode, "Opened {}", path.display());
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Repository Operations ==========

    /// Insert every repository whose id is not yet known.
    ///
    /// Returns the number of genuinely new rows. The batch is one transaction:
    /// on error nothing is inserted.
    pub fn insert_repositories(&mut self, repos: &[Repository]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO repos (repo_id, name, clone_url, stars) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for repo in repos {
                let changed = stmt.execute(params![repo.id, repo.name, repo.clone_url, repo.stars])?;
                if changed == 0 {
                    debug!(repo_id = repo.id, name = %repo.name, "Already seen");
                }
                inserted += changed;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Get a repository by id
    pub fn get_repository(&self, repo_id: i64) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                "SELECT repo_id, name, clone_url, stars FROM repos WHERE repo_id = ?1",
                [repo_id],
                row_to_repository,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Lowest star count of any known repository, or `NO_STARS_SEEN`
    pub fn min_stars_seen(&self) -> Result<i64> {
        let min: Option<i64> = self.conn.query_row("SELECT MIN(stars) FROM repos", [], |row| row.get(0))?;
        Ok(min.unwrap_or(NO_STARS_SEEN))
    }

    /// Count all repositories
    pub fn count_repositories(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM repos")
    }

    // ========== Queue Operations ==========

    /// Next repository without a completion marker, lowest id first
    pub fn next_unmined_repository(&self) -> Result<Option<Repository>> {
        self.next_unmined_repository_after(None)
    }

    /// Next unmined repository with an id strictly greater than `after`.
    ///
    /// Lets a single run walk the queue without reselecting a repository
    /// whose marker could not be written.
    pub fn next_unmined_repository_after(&self, after: Option<i64>) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                r#"
                SELECT r.repo_id, r.name, r.clone_url, r.stars
                FROM repos r
                LEFT JOIN mined m ON m.repo_id = r.repo_id
                WHERE m.repo_id IS NULL AND r.repo_id > ?1
                ORDER BY r.repo_id
                LIMIT 1
                "#,
                [after.unwrap_or(i64::MIN)],
                row_to_repository,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Count repositories without a completion marker
    pub fn count_unmined(&self) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM repos r LEFT JOIN mined m ON m.repo_id = r.repo_id WHERE m.repo_id IS NULL",
        )
    }

    /// Write the completion marker for a repository.
    ///
    /// Fails (and rolls back) if the repository is unknown or already marked.
    pub fn mark_completed(&mut self, marker: &CompletionMarker) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO mined (repo_id, n_success, n_error, elapsed, outcome) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                marker.repo_id,
                marker.success_count,
                marker.error_count,
                marker.elapsed_seconds,
                marker.outcome.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get the completion marker of a repository
    pub fn completion_marker(&self, repo_id: i64) -> Result<Option<CompletionMarker>> {
        self.conn
            .query_row(
                "SELECT repo_id, n_success, n_error, elapsed, outcome FROM mined WHERE repo_id = ?1",
                [repo_id],
                row_to_marker,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete every failure marker so those repositories are mined again.
    pub fn reset_failed(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM mined WHERE outcome != ?1",
            [MiningOutcome::Analyzed.as_str()],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    // ========== Result Operations ==========

    /// Get the id of `(repo_id, path)`, creating the file row if needed
    pub fn ensure_file(&mut self, repo_id: i64, path: &str) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let file_id = ensure_file_on(&tx, repo_id, path)?;
        tx.commit()?;
        Ok(file_id)
    }

    /// Record a finding against a file.
    ///
    /// Returns the new `match_id`, or `None` if the identical finding was
    /// already recorded.
    pub fn record_match(&self, file_id: i64, finding: &Finding) -> Result<Option<i64>> {
        record_match_on(&self.conn, file_id, finding)
    }

    /// Start a unit of work for interning one report
    pub fn result_writer(&mut self) -> Result<ResultWriter<'_>> {
        Ok(ResultWriter { tx: self.conn.transaction()? })
    }

    /// All files recorded for a repository
    pub fn files_for_repo(&self, repo_id: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, repo_id, path FROM files WHERE repo_id = ?1 ORDER BY file_id",
        )?;

        let files = stmt
            .query_map([repo_id], |row| {
                Ok(FileRecord {
                    file_id: row.get(0)?,
                    repo_id: row.get(1)?,
                    path: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(files)
    }

    /// All matches recorded for a file
    pub fn matches_for_file(&self, file_id: i64) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT match_id, file_id, line, col, vector_kind, tile_width, strategy_index
             FROM matches WHERE file_id = ?1 ORDER BY match_id",
        )?;

        let matches = stmt
            .query_map([file_id], |row| {
                Ok(MatchRecord {
                    match_id: row.get(0)?,
                    file_id: row.get(1)?,
                    line: row.get(2)?,
                    column: row.get(3)?,
                    vector_kind: row.get(4)?,
                    tile_width: row.get(5)?,
                    strategy_index: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(matches)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            repositories: self.count_repositories()?,
            mined: self.count("SELECT COUNT(*) FROM mined")?,
            failed: self.count("SELECT COUNT(*) FROM mined WHERE outcome != 'analyzed'")?,
            pending: self.count_unmined()?,
            files: self.count("SELECT COUNT(*) FROM files")?,
            matches: self.count("SELECT COUNT(*) FROM matches")?,
        })
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// A transaction over the files and matches tables.
///
/// Dropping the writer without calling `commit` rolls everything back.
pub struct ResultWriter<'a> {
    tx: Transaction<'a>,
}

impl ResultWriter<'_> {
    pub fn ensure_file(&self, repo_id: i64, path: &str) -> Result<i64> {
        ensure_file_on(&self.tx, repo_id, path)
    }

    pub fn record_match(&self, file_id: i64, finding: &Finding) -> Result<Option<i64>> {
        record_match_on(&self.tx, file_id, finding)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn ensure_file_on(conn: &Connection, repo_id: i64, path: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO files (repo_id, path) VALUES (?1, ?2)",
        params![repo_id, path],
    )?;
    conn.query_row(
        "SELECT file_id FROM files WHERE repo_id = ?1 AND path = ?2",
        params![repo_id, path],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

fn record_match_on(conn: &Connection, file_id: i64, finding: &Finding) -> Result<Option<i64>> {
    let changed = conn.execute(
        r#"
        INSERT OR IGNORE INTO matches (file_id, line, col, vector_kind, tile_width, strategy_index)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            file_id,
            finding.line,
            finding.column,
            finding.vector_kind,
            finding.tile_width,
            finding.strategy_index,
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

fn row_to_repository(row: &rusqlite::Row) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        name: row.get(1)?,
        clone_url: row.get(2)?,
        stars: row.get(3)?,
    })
}

fn row_to_marker(row: &rusqlite::Row) -> rusqlite::Result<CompletionMarker> {
    let outcome_str: String = row.get(4)?;
    let outcome: MiningOutcome = outcome_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CompletionMarker {
        repo_id: row.get(0)?,
        success_count: row.get(1)?,
        error_count: row.get(2)?,
        elapsed_seconds: row.get(3)?,
        outcome,
    })
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub repositories: usize,
    pub mined: usize,
    pub failed: usize,
    pub pending: usize,
    pub files: usize,
    pub matches: usize,
}

impl DbStats {
    /// Label/value pairs in display order
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Repositories", self.repositories.to_string()),
            ("Mined", self.mined.to_string()),
            ("Failed", self.failed.to_string()),
            ("Pending", self.pending.to_string()),
            ("Files", self.files.to_string()),
            ("Matches", self.matches.to_string()),
        ]
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (label, value) in self.rows() {
            writeln!(f, "  {}: {}", label, value)?;
        }
        Ok(())
    }
}
