//! MAFFT alignment adapter.
//!
//! Shells out to `mafft`, writing inputs to a scratch directory and reading
//! the aligned FASTA from standard output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::process::ProcessRunner;
use crate::domain::errors::SolverError;
use crate::domain::models::{Alignment, Sequence};
use crate::domain::ports::Aligner;
use crate::infrastructure::fasta;
use crate::infrastructure::scratch::ScratchDir;

/// Configuration for the MAFFT adapter
#[derive(Debug, Clone)]
pub struct MafftConfig {
    /// Executable name or path
    pub program: String,
    pub threads: usize,
    pub timeout_secs: u64,
    /// Parent of the per-call scratch directories
    pub work_dir: PathBuf,
}

pub struct MafftAligner {
    runner: ProcessRunner,
    threads: usize,
    work_dir: PathBuf,
}

impl MafftAligner {
    pub fn new(config: MafftConfig) -> Self {
        Self {
            runner: ProcessRunner::new(config.program, config.timeout_secs),
            threads: config.threads.max(1),
            work_dir: config.work_dir,
        }
    }

    /// Arguments for aligning `input` from scratch.
    fn align_args(&self, input: &Path) -> Vec<String> {
        vec![
            "--auto".to_string(),
            "--thread".to_string(),
            self.threads.to_string(),
            input.display().to_string(),
        ]
    }

    /// Arguments for adding `new` to the fixed alignment `existing`.
    fn add_args(&self, new: &Path, existing: &Path) -> Vec<String> {
        vec![
            "--add".to_string(),
            new.display().to_string(),
            "--thread".to_string(),
            self.threads.to_string(),
            existing.display().to_string(),
        ]
    }

    async fn run_and_parse(
        &self,
        args: &[String],
        expected_rows: usize,
    ) -> Result<Alignment, SolverError> {
        let output = self.runner.run(args, None).await?;
        let alignment = fasta::parse_alignment(output.stdout.as_slice(), Path::new("mafft stdout"))
            .map_err(|e| self.malformed(e.to_string()))?;
        if alignment.len() != expected_rows {
            return Err(self.malformed(format!(
                "expected {expected_rows} sequences, got {}",
                alignment.len()
            )));
        }
        debug!(
            rows = alignment.len(),
            columns = alignment.alignment_length(),
            "alignment parsed"
        );
        Ok(alignment)
    }

    fn malformed(&self, message: String) -> SolverError {
        SolverError::MalformedOutput {
            program: self.runner.program().to_string(),
            message,
        }
    }
}

#[async_trait]
impl Aligner for MafftAligner {
    fn name(&self) -> &'static str {
        "mafft"
    }

    async fn is_available(&self) -> bool {
        self.runner.is_available(&["--version"]).await
    }

    #[instrument(skip(self, sequences), fields(n = sequences.len()))]
    async fn align(&self, sequences: &[Sequence]) -> Result<Alignment, SolverError> {
        let scratch = ScratchDir::create(&self.work_dir, "mafft")?;
        let input = scratch.join("input.fasta");
        fasta::write_sequences(&input, sequences)?;
        self.run_and_parse(&self.align_args(&input), sequences.len())
            .await
    }

    #[instrument(skip(self, existing, sequences), fields(existing = existing.len(), n = sequences.len()))]
    async fn add(
        &self,
        existing: &Alignment,
        sequences: &[Sequence],
    ) -> Result<Alignment, SolverError> {
        let scratch = ScratchDir::create(&self.work_dir, "mafft")?;
        let existing_path = scratch.join("existing.fasta");
        let new_path = scratch.join("new.fasta");
        fasta::write_alignment(&existing_path, existing)?;
        fasta::write_sequences(&new_path, sequences)?;
        self.run_and_parse(
            &self.add_args(&new_path, &existing_path),
            existing.len() + sequences.len(),
        )
        .await
    }
}
