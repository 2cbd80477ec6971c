//! Phylogeny stage driver.
//!
//! Fills `distribution.tre` up to `nphylos` trees, resuming from whatever
//! the file already holds, writes the majority-rule `consensus.tre`, and in
//! the constrained-then-unconstrained mode repeats the generation without a
//! constraint into `distribution_unconstrained.tre`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::context::RunContext;
use crate::domain::models::{ConstraintMode, PipelineConfig, Tree};
use crate::domain::ports::TreeSearcher;
use crate::infrastructure::tree_file;
use crate::services::retry::RetryOutcome;
use crate::services::{consensus, AlignmentStore, GeneratorSettings, Lineages, PhylogenyGenerator};

pub const DISTRIBUTION_FILE: &str = "distribution.tre";
pub const UNCONSTRAINED_DISTRIBUTION_FILE: &str = "distribution_unconstrained.tre";
pub const CONSENSUS_FILE: &str = "consensus.tre";

/// Split frequency a clade needs to enter the stage's consensus tree.
pub const CONSENSUS_MIN_FREQ: f64 = 0.5;

/// Inputs of the phylogeny stage besides the configuration
#[derive(Debug, Clone)]
pub struct PhylogenyInputs {
    /// Output root of the alignment stage
    pub alignment_dir: PathBuf,
    /// Taxonomic reference tree for constraints and outgroups
    pub reference: Option<Tree>,
    pub lineages: Lineages,
    pub seed: u64,
}

/// One generation pass into one distribution file
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub file: PathBuf,
    pub constrained: bool,
    pub requested: usize,
    /// Trees found in the file before this pass
    pub existing: usize,
    pub generated: usize,
    pub stopped: Option<String>,
}

impl PassReport {
    pub fn total(&self) -> usize {
        self.existing + self.generated
    }

    pub fn is_complete(&self) -> bool {
        self.total() >= self.requested
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusReport {
    pub file: PathBuf,
    pub trees: usize,
    pub taxa: usize,
    pub min_freq: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhylogenyStageReport {
    pub passes: Vec<PassReport>,
    /// Absent when the trees share too few taxa
    pub consensus: Option<ConsensusReport>,
}

pub struct PhylogenyStage {
    searcher: Arc<dyn TreeSearcher>,
    config: PipelineConfig,
    context: RunContext,
}

impl PhylogenyStage {
    pub fn new(searcher: Arc<dyn TreeSearcher>, config: PipelineConfig, context: RunContext) -> Self {
        Self {
            searcher,
            config,
            context,
        }
    }

    #[instrument(skip(self, inputs), fields(nphylos = self.config.nphylos, mode = ?self.config.constraint))]
    pub async fn run(&self, inputs: PhylogenyInputs, output_dir: &Path) -> Result<PhylogenyStageReport> {
        self.context.require_tree_searcher()?;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let store = AlignmentStore::discover(&inputs.alignment_dir, &self.config, inputs.lineages)
            .context("Failed to open the alignment store")?;
        let mut settings = GeneratorSettings::from_config(&self.config, inputs.reference, inputs.seed);
        settings.threads = self.context.threads;
        let mut generator = PhylogenyGenerator::new(store, Arc::clone(&self.searcher), settings);

        let mut passes = Vec::new();
        passes.push(self.fill(&mut generator, &output_dir.join(DISTRIBUTION_FILE)).await?);

        let consensus = write_consensus(
            &output_dir.join(DISTRIBUTION_FILE),
            &output_dir.join(CONSENSUS_FILE),
            CONSENSUS_MIN_FREQ,
            true,
        )?;
        if consensus.is_none() {
            warn!("no consensus tree produced");
        }

        if self.config.constraint == ConstraintMode::ConstrainedThenUnconstrained {
            generator.reset();
            generator.set_constrained(false);
            let path = output_dir.join(UNCONSTRAINED_DISTRIBUTION_FILE);
            passes.push(self.fill(&mut generator, &path).await?);
        }

        Ok(PhylogenyStageReport { passes, consensus })
    }

    /// Generates trees into `path` until it holds `nphylos` of them or the
    /// generator gives up.
    #[instrument(skip(self, generator), fields(constrained = generator.is_constrained()))]
    async fn fill(&self, generator: &mut PhylogenyGenerator, path: &Path) -> Result<PassReport> {
        let existing = tree_file::count_trees(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let requested = self.config.nphylos;
        if existing > 0 {
            info!(existing, requested, "resuming distribution");
        }

        let mut generated = 0;
        let mut stopped = None;
        while existing + generated < requested {
            match generator.run().await {
                RetryOutcome::Success { value, .. } => {
                    tree_file::append_tree(path, &value)?;
                    generated += 1;
                }
                RetryOutcome::ExhaustedRetries { attempts, last_error } => {
                    let reason = last_error.map_or_else(
                        || format!("no tree after {attempts} attempts"),
                        |e| format!("no tree after {attempts} attempts: {e}"),
                    );
                    stopped = Some(reason);
                    break;
                }
                RetryOutcome::Aborted { error, .. } => {
                    stopped = Some(error.to_string());
                    break;
                }
            }
        }

        let report = PassReport {
            file: path.to_path_buf(),
            constrained: generator.is_constrained(),
            requested,
            existing,
            generated,
            stopped,
        };
        if report.is_complete() {
            info!(trees = report.total(), "distribution complete");
        } else {
            warn!(trees = report.total(), requested, "distribution incomplete");
        }
        Ok(report)
    }
}

/// Writes the consensus of the trees in `trees_path` to `output`.
///
/// Returns `None`, and writes nothing, when no consensus can be formed.
pub fn write_consensus(
    trees_path: &Path,
    output: &Path,
    min_freq: f64,
    rooted: bool,
) -> Result<Option<ConsensusReport>> {
    let trees = tree_file::read_trees(trees_path)
        .with_context(|| format!("Failed to read {}", trees_path.display()))?;
    let Some(tree) = consensus(&trees, min_freq, rooted) else {
        return Ok(None);
    };
    tree_file::write_tree(output, &tree)?;
    info!(file = %output.display(), trees = trees.len(), "consensus written");
    Ok(Some(ConsensusReport {
        file: output.to_path_buf(),
        trees: trees.len(),
        taxa: tree.num_leaves(),
        min_freq,
    }))
}

/// Reads a taxon → lineage map (YAML or JSON), taxonomy ids root first.
pub fn load_lineages(path: &Path) -> Result<Lineages> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Reads the taxonomic reference tree.
pub fn load_reference(path: &Path) -> Result<Tree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Tree::from_newick(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
