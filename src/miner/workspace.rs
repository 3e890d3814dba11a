//! Working copies of remote repositories
//!
//! An existing directory is reused as-is; it is not updated to the latest
//! revision. Otherwise the repository is shallow-cloned with `git`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use crate::{Error, Result};

/// A local checkout the analyzer can run against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub path: PathBuf,
    /// The directory already existed and was not cloned in this run
    pub reused: bool,
}

/// Obtains working copies by URL
pub trait Cloner {
    fn obtain_working_copy(&self, url: &str, name: &str) -> Result<WorkingCopy>;

    fn remove_working_copy(&self, copy: &WorkingCopy) -> Result<()> {
        if copy.path.exists() {
            fs::remove_dir_all(&copy.path)?;
        }
        Ok(())
    }
}

/// Shallow clones into `<root>/<owner>/<project>`
#[derive(Debug, Clone)]
pub struct GitCloner {
    root: PathBuf,
    depth: u32,
    program: PathBuf,
}

impl GitCloner {
    pub fn new(root: impl Into<PathBuf>, depth: u32) -> Self {
        Self {
            root: root.into(),
            depth,
            program: PathBuf::from("git"),
        }
    }

    /// Use a different `git` executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Check that the clone program runs at all
    pub fn verify(&self) -> Result<()> {
        let not_found = || Error::GitNotFound(self.program.clone());
        let out = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|_| not_found())?;
        if !out.status.success() {
            return Err(not_found());
        }
        debug!("Using {}", String::from_utf8_lossy(&out.stdout).trim());
        Ok(())
    }

    /// Where the working copy for `name` lives
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && !name.contains('\\')
            && relative.components().all(|c| matches!(c, Component::Normal(_)))
            && !name.split('/').any(str::is_empty);
        if !valid {
            return Err(Error::Clone {
                name: name.to_string(),
                reason: "invalid repository name".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl Cloner for GitCloner {
    fn obtain_working_copy(&self, url: &str, name: &str) -> Result<WorkingCopy> {
        let dir = self.path_for(name)?;

        // TODO: fetch and reset reused copies once re-mining updated repositories is needed
        if dir.exists() {
            info!("Repository '{}' exists at {:?}", name, dir);
            return Ok(WorkingCopy { path: dir, reused: true });
        }

        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Cloning {} to {:?}", name, dir);
        let out = Command::new(&self.program)
            .arg("clone")
            .arg("--depth")
            .arg(self.depth.to_string())
            .arg(url)
            .arg(&dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()?;

        if !out.status.success() {
            if dir.exists() {
                warn!("Removing partial clone at {:?}", dir);
                if let Err(e) = fs::remove_dir_all(&dir) {
                    warn!("Failed to remove partial clone at {:?}: {}", dir, e);
                }
            }
            return Err(Error::Clone {
                name: name.to_string(),
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        info!("Finished cloning '{}'", name);
        Ok(WorkingCopy { path: dir, reused: false })
    }
}
