//! External analyzer invocation
//!
//! The analyzer is run as `<tool> [<toolchain>] <repo_path> [--log <file>] [--threads <n>]`.
//! Its standard output carries the findings report followed by summary
//! counters; standard error is captured and logged only.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use regex::Regex;
use tracing::{debug, info, warn};
use crate::{Error, Result};

/// Counters the analyzer prints after its report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub successful: i64,
    pub errors: i64,
}

impl AnalysisSummary {
    /// Read `Successful: N` and `Errors: N`; a missing counter is zero.
    pub fn parse(output: &[u8]) -> Self {
        static SUCCESSFUL: OnceLock<Regex> = OnceLock::new();
        static ERRORS: OnceLock<Regex> = OnceLock::new();

        let text = String::from_utf8_lossy(output);
        let counter = |re: &Regex| -> i64 {
            re.captures(&text)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0)
        };

        Self {
            successful: counter(SUCCESSFUL.get_or_init(|| {
                Regex::new(r"Successful: ([0-9]+)").expect("valid regex")
            })),
            errors: counter(ERRORS.get_or_init(|| {
                Regex::new(r"Errors: ([0-9]+)").expect("valid regex")
            })),
        }
    }
}

/// Captured result of one analyzer execution
#[derive(Debug, Clone)]
pub struct AnalyzerRun {
    /// Raw standard output, report lines included
    pub report: Vec<u8>,
    pub summary: AnalysisSummary,
    pub elapsed: Duration,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

/// Runs analysis over a working copy
pub trait Analyzer {
    /// `log_name` names the per-run log file, when logging is configured.
    fn run_analyzer(&self, workspace: &Path, log_name: &str) -> Result<AnalyzerRun>;
}

impl<A: Analyzer + ?Sized> Analyzer for &A {
    fn run_analyzer(&self, workspace: &Path, log_name: &str) -> Result<AnalyzerRun> {
        (**self).run_analyzer(workspace, log_name)
    }
}

/// The analyzer as a separate executable
#[derive(Debug, Clone)]
pub struct ExternalAnalyzer {
    tool: PathBuf,
    toolchain: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    threads: Option<usize>,
}

impl ExternalAnalyzer {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            toolchain: None,
            log_dir: None,
            threads: None,
        }
    }

    /// Toolchain path passed ahead of the repository path
    pub fn with_toolchain(mut self, toolchain: Option<PathBuf>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Resolve the tool to an existing file.
    ///
    /// Bare names are looked up on `PATH`.
    pub fn locate(&self) -> Result<PathBuf> {
        let not_found = || Error::AnalyzerNotFound(self.tool.clone());

        if self.tool.components().count() > 1 || self.tool.is_absolute() {
            return if self.tool.is_file() {
                Ok(self.tool.clone())
            } else {
                Err(not_found())
            };
        }

        let path = std::env::var_os("PATH").ok_or_else(not_found)?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.tool))
            .find(|candidate| candidate.is_file())
            .ok_or_else(not_found)
    }

    /// Build the command line for one working copy
    pub fn command(&self, workspace: &Path, log_file: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.tool);
        if let Some(toolchain) = &self.toolchain {
            cmd.arg(toolchain);
        }
        cmd.arg(workspace);
        if let Some(log_file) = log_file {
            cmd.arg("--log").arg(log_file);
        }
        if let Some(threads) = self.threads {
            cmd.arg("--threads").arg(threads.to_string());
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn log_file(&self, log_name: &str) -> Result<Option<PathBuf>> {
        match &self.log_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Some(dir.join(format!("{}.log", log_name))))
            }
            None => Ok(None),
        }
    }
}

impl Analyzer for ExternalAnalyzer {
    fn run_analyzer(&self, workspace: &Path, log_name: &str) -> Result<AnalyzerRun> {
        let log_file = self.log_file(log_name)?;
        let mut cmd = self.command(workspace, log_file.as_deref());

        info!("Analyzing {:?}", workspace);
        let start = Instant::now();
        let output = cmd
            .output()
            .map_err(|e| Error::Analyzer(format!("failed to run {}: {}", self.tool.display(), e)))?;
        let elapsed = start.elapsed();

        if !output.status.success() {
            warn!(status = %output.status, "Analyzer exited unsuccessfully for {:?}", workspace);
        }
        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim_end(), "Analyzer stderr");
        }

        let summary = AnalysisSummary::parse(&output.stdout);
        debug!(
            successful = summary.successful,
            errors = summary.errors,
            elapsed = elapsed.as_secs_f64(),
            "Analyzer finished"
        );

        Ok(AnalyzerRun {
            report: output.stdout,
            summary,
            elapsed,
            exit_code: output.status.code(),
        })
    }
}
