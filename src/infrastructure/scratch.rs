//! Per-attempt scratch directories.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// A uniquely named directory removed, with its contents, when dropped.
///
/// Solver inputs and outputs for one attempt live here, so nothing survives
/// into the next attempt whether it succeeded, failed or was cancelled.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(parent: &Path, prefix: &str) -> DomainResult<Self> {
        let path = parent.join(format!("{prefix}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).map_err(|e| DomainError::io(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
            }
        }
    }
}
