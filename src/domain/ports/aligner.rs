//! Alignment solver port.

use async_trait::async_trait;

use crate::domain::errors::SolverError;
use crate::domain::models::{Alignment, Sequence};

/// An external multiple sequence alignment program.
///
/// Implementations are opaque black boxes: they receive unaligned sequences,
/// or a fixed alignment plus new sequences, and return a rectangular
/// alignment over exactly the taxa they were given.
#[async_trait]
pub trait Aligner: Send + Sync {
    /// Program name, used in logs.
    fn name(&self) -> &'static str;

    /// Whether the program can be executed.
    async fn is_available(&self) -> bool;

    /// Align a set of unaligned sequences from scratch.
    async fn align(&self, sequences: &[Sequence]) -> Result<Alignment, SolverError>;

    /// Add `sequences` to `existing`, keeping its columns as a backbone.
    async fn add(
        &self,
        existing: &Alignment,
        sequences: &[Sequence],
    ) -> Result<Alignment, SolverError>;
}
