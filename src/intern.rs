//! Result interning - analyzer report to persisted rows
//!
//! Report grammar, one finding per newline-terminated line:
//!
//! ```text
//! <path>,<line>,<col>,<vector_kind>,<tile_width>,<strategy_index>
//! ```
//!
//! `path` is any run of bytes without a comma and must be valid UTF-8; the
//! other five fields are non-negative decimal integers. Everything else in
//! the stream (summary lines, diagnostics, a truncated last line) is skipped.

use std::sync::OnceLock;
use regex::bytes::Regex;
use tracing::{debug, warn};
use crate::Result;
use crate::record::Finding;
use crate::storage::SqliteStore;

fn report_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^([^,]+),([0-9]+),([0-9]+),([0-9]+),([0-9]+),([0-9]+)\r?$")
            .expect("report grammar is a valid regex")
    })
}

/// What interning one report produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternStats {
    /// Lines that matched the grammar
    pub findings: usize,
    /// Distinct files referenced
    pub files: usize,
    /// New match rows written
    pub matches: usize,
    /// Findings that were already recorded
    pub duplicates: usize,
}

/// Parse a single report line (without its newline)
pub fn parse_line(line: &[u8]) -> Option<Finding> {
    let caps = report_line().captures(line)?;
    let path = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    let int = |i: usize| -> Option<i64> {
        std::str::from_utf8(caps.get(i)?.as_bytes()).ok()?.parse().ok()
    };

    Some(Finding {
        path: path.to_string(),
        line: int(2)?,
        column: int(3)?,
        vector_kind: int(4)?,
        tile_width: int(5)?,
        strategy_index: int(6)?,
    })
}

/// Parse every finding out of a raw analyzer stdout stream
pub fn parse_report(report: &[u8]) -> Vec<Finding> {
    let mut lines: Vec<&[u8]> = report.split(|b| *b == b'\n').collect();
    // Whatever follows the last newline was never terminated.
    if let Some(tail) = lines.pop() {
        if !tail.is_empty() {
            debug!(bytes = tail.len(), "Ignoring unterminated trailing line");
        }
    }

    lines.into_iter().filter_map(parse_line).collect()
}

/// Intern a report for a repository in a single transaction.
///
/// On error nothing from this report is kept.
pub fn intern_report(store: &mut SqliteStore, repo_id: i64, report: &[u8]) -> Result<InternStats> {
    let findings = parse_report(report);
    let mut stats = InternStats {
        findings: findings.len(),
        ..Default::default()
    };

    let writer = store.result_writer()?;
    let mut seen_files = std::collections::HashSet::new();
    for finding in &findings {
        let file_id = writer.ensure_file(repo_id, &finding.path)?;
        seen_files.insert(file_id);
        match writer.record_match(file_id, finding)? {
            Some(_) => stats.matches += 1,
            None => stats.duplicates += 1,
        }
    }
    writer.commit()?;

    stats.files = seen_files.len();
    if stats.duplicates > 0 {
        warn!(repo_id, duplicates = stats.duplicates, "Report contained findings that were already recorded");
    }
    Ok(stats)
}
