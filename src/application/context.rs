//! Run-wide context handed to the stage drivers.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{Aligner, TreeSearcher};

/// Whether one external program could be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
}

/// External programs probed for this run. `None` means not probed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolAvailability {
    pub aligner: Option<ToolStatus>,
    pub tree_searcher: Option<ToolStatus>,
}

/// Thread policy, tool availability and scratch location of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub threads: usize,
    pub tools: ToolAvailability,
    /// Parent directory of per-invocation scratch directories
    pub work_dir: PathBuf,
}

impl RunContext {
    pub fn new(threads: usize, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            threads: threads.max(1),
            tools: ToolAvailability::default(),
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub async fn probe_aligner(&mut self, aligner: &dyn Aligner) {
        let status = probe(aligner.name(), aligner.is_available().await);
        self.tools.aligner = Some(status);
    }

    pub async fn probe_tree_searcher(&mut self, searcher: &dyn TreeSearcher) {
        let status = probe(searcher.name(), searcher.is_available().await);
        self.tools.tree_searcher = Some(status);
    }

    /// Fails unless an aligner was probed and found executable.
    pub fn require_aligner(&self) -> DomainResult<()> {
        require(self.tools.aligner.as_ref(), "aligner")
    }

    /// Fails unless a tree searcher was probed and found executable.
    pub fn require_tree_searcher(&self) -> DomainResult<()> {
        require(self.tools.tree_searcher.as_ref(), "tree searcher")
    }
}

fn probe(name: &str, available: bool) -> ToolStatus {
    if available {
        info!(tool = name, "external tool found");
    } else {
        warn!(tool = name, "external tool not executable");
    }
    ToolStatus {
        name: name.to_string(),
        available,
    }
}

fn require(status: Option<&ToolStatus>, role: &str) -> DomainResult<()> {
    match status {
        Some(status) if status.available => Ok(()),
        Some(status) => Err(DomainError::MissingDependency(status.name.clone())),
        None => Err(DomainError::MissingDependency(role.to_string())),
    }
}
