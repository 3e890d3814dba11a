//! Database schema definitions

/// SQL to create the repositories table
pub const CREATE_REPOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repos (
    repo_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    clone_url TEXT NOT NULL,
    stars INTEGER NOT NULL
)
"#;

/// SQL to create the completion marker table
/// One row per repository whose mining attempt has finished
pub const CREATE_MINED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS mined (
    repo_id INTEGER PRIMARY KEY REFERENCES repos(repo_id),
    n_success INTEGER NOT NULL,
    n_error INTEGER NOT NULL,
    elapsed REAL NOT NULL,
    outcome TEXT NOT NULL DEFAULT 'analyzed'
)
"#;

/// SQL to create the files table
pub const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL REFERENCES repos(repo_id),
    path TEXT NOT NULL,
    UNIQUE(repo_id, path)
)
"#;

/// SQL to create the matches table
/// The unique constraint makes re-interning a report a no-op
pub const CREATE_MATCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(file_id),
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    vector_kind INTEGER NOT NULL,
    tile_width INTEGER NOT NULL,
    strategy_index INTEGER NOT NULL,
    UNIQUE(file_id, line, col, vector_kind, tile_width, strategy_index)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_repos_stars ON repos(stars)",
    "CREATE INDEX IF NOT EXISTS idx_mined_outcome ON mined(outcome)",
    "CREATE INDEX IF NOT EXISTS idx_matches_file ON matches(file_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_REPOS_TABLE,
        CREATE_MINED_TABLE,
        CREATE_FILES_TABLE,
        CREATE_MATCHES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
