//! Subcommand implementations.

pub mod align;
pub mod consensus;
pub mod phylogeny;

use crate::domain::models::PipelineConfig;

/// Seed precedence: command line, configuration, fresh entropy.
pub(crate) fn resolve_seed(arg: Option<u64>, config: &PipelineConfig) -> u64 {
    arg.or(config.seed).unwrap_or_else(rand::random)
}

/// Parent directory for solver scratch directories.
pub(crate) fn scratch_root() -> std::path::PathBuf {
    std::env::temp_dir()
}
