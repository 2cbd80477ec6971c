//! RAxML tree-search adapter.
//!
//! Each search runs inside its own scratch directory holding the PHYLIP
//! input, the partition table, the constraint tree and every `RAxML_*`
//! file the program leaves behind. The directory goes away with the call.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::process::ProcessRunner;
use crate::domain::errors::{DomainError, SolverError};
use crate::domain::models::Tree;
use crate::domain::ports::{ConstraintKind, SearchRequest, TreeSearcher};
use crate::infrastructure::phylip;
use crate::infrastructure::scratch::ScratchDir;

const INPUT_FILE: &str = "input.phy";
const PARTITION_FILE: &str = "partitions.txt";
const CONSTRAINT_FILE: &str = "constraint.tre";
const RUN_NAME: &str = "out";

/// Taxa above which the faster CAT approximation replaces GAMMA.
pub const CAT_MODEL_THRESHOLD: usize = 100;

/// Configuration for the RAxML adapter
#[derive(Debug, Clone)]
pub struct RaxmlConfig {
    /// Executable name or path
    pub program: String,
    pub timeout_secs: u64,
    /// Parent of the per-call scratch directories
    pub work_dir: PathBuf,
}

pub struct RaxmlSearcher {
    runner: ProcessRunner,
    work_dir: PathBuf,
}

/// Substitution model for an alignment of `ntaxa` taxa.
pub const fn model_for(ntaxa: usize) -> &'static str {
    if ntaxa > CAT_MODEL_THRESHOLD {
        "GTRCAT"
    } else {
        "GTRGAMMA"
    }
}

impl RaxmlSearcher {
    pub fn new(config: RaxmlConfig) -> Self {
        Self {
            runner: ProcessRunner::new(config.program, config.timeout_secs),
            work_dir: config.work_dir,
        }
    }

    /// Command line for `request`, with file names relative to the scratch dir.
    fn arguments(request: &SearchRequest) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            INPUT_FILE.to_string(),
            "-n".to_string(),
            RUN_NAME.to_string(),
            "-m".to_string(),
            model_for(request.alignment.len()).to_string(),
            "-p".to_string(),
            request.seed.to_string(),
            "-T".to_string(),
            request.threads.max(1).to_string(),
        ];
        if let Some(outgroup) = &request.outgroup {
            args.push("-o".to_string());
            args.push(outgroup.clone());
        }
        if request.partitions.is_some() {
            args.push("-q".to_string());
            args.push(PARTITION_FILE.to_string());
        }
        if let Some(constraint) = &request.constraint {
            let flag = match constraint.kind {
                ConstraintKind::Resolved => "-r",
                ConstraintKind::Backbone => "-g",
            };
            args.push(flag.to_string());
            args.push(CONSTRAINT_FILE.to_string());
        }
        args
    }
}

#[async_trait]
impl TreeSearcher for RaxmlSearcher {
    fn name(&self) -> &'static str {
        "raxml"
    }

    async fn is_available(&self) -> bool {
        self.runner.is_available(&["-v"]).await
    }

    #[instrument(skip(self, request), fields(taxa = request.alignment.len(), seed = request.seed))]
    async fn search(&self, request: SearchRequest) -> Result<Tree, SolverError> {
        let scratch = ScratchDir::create(&self.work_dir, "raxml")?;
        phylip::write_phylip(&scratch.join(INPUT_FILE), &request.alignment)?;
        if let Some(partitions) = &request.partitions {
            let path = scratch.join(PARTITION_FILE);
            std::fs::write(&path, partitions).map_err(|e| DomainError::io(&path, e))?;
        }
        if let Some(constraint) = &request.constraint {
            let path = scratch.join(CONSTRAINT_FILE);
            std::fs::write(&path, format!("{}\n", constraint.tree.to_newick()))
                .map_err(|e| DomainError::io(&path, e))?;
        }

        let args = Self::arguments(&request);
        debug!(?args, "starting tree search");
        self.runner.run(&args, Some(scratch.path())).await?;

        let best = scratch.join(&format!("RAxML_bestTree.{RUN_NAME}"));
        let text = std::fs::read_to_string(&best).map_err(|e| SolverError::MalformedOutput {
            program: self.runner.program().to_string(),
            message: format!("cannot read {}: {e}", best.display()),
        })?;
        Tree::from_newick(&text).map_err(|e| SolverError::MalformedOutput {
            program: self.runner.program().to_string(),
            message: e.to_string(),
        })
    }
}
