//! Alignment stage driver.
//!
//! For every cluster directory of downloaded sequences, builds `naligns`
//! alignments and writes them as `<i>_nspp<species>_len<columns>.faa` into
//! a directory of the same name under the output root. When a cluster ends
//! up with fewer alignments than requested, the files of this run are
//! removed again; anything already in the directory stays.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::context::RunContext;
use crate::domain::models::PipelineConfig;
use crate::domain::ports::Aligner;
use crate::infrastructure::fasta;
use crate::services::retry::{Attempt, RetryBudget, RetryOutcome};
use crate::services::{AlignmentBuilder, BuildParams, SequencePool};

/// Outcome for one cluster
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub cluster: String,
    pub species: usize,
    pub requested: usize,
    pub produced: usize,
    /// Output directory, absent when the cluster was dropped
    pub output: Option<PathBuf>,
    /// Why the batch stopped early
    pub stopped: Option<String>,
}

impl ClusterReport {
    pub fn is_complete(&self) -> bool {
        self.produced >= self.requested
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlignmentStageReport {
    pub clusters: Vec<ClusterReport>,
    /// Kept alignments each taxon appears in
    pub tally: BTreeMap<String, usize>,
}

impl AlignmentStageReport {
    pub fn total_alignments(&self) -> usize {
        self.clusters
            .iter()
            .filter(|c| c.output.is_some())
            .map(|c| c.produced)
            .sum()
    }
}

/// Mutable state threaded through the retry loop of one alignment.
struct BuildState<'a> {
    builder: &'a AlignmentBuilder,
    pool: &'a mut SequencePool,
    rng: &'a mut StdRng,
}

pub struct AlignmentStage {
    aligner: Arc<dyn Aligner>,
    config: PipelineConfig,
    context: RunContext,
}

impl AlignmentStage {
    pub fn new(aligner: Arc<dyn Aligner>, config: PipelineConfig, context: RunContext) -> Self {
        Self {
            aligner,
            config,
            context,
        }
    }

    /// Aligns every cluster found under `input_dir`.
    #[instrument(skip(self, rng), fields(naligns = self.config.naligns))]
    pub async fn run(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        rng: &mut StdRng,
    ) -> Result<AlignmentStageReport> {
        self.context.require_aligner()?;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let clusters = cluster_dirs(input_dir)?;
        info!(clusters = clusters.len(), "alignment stage started");

        let mut report = AlignmentStageReport::default();
        for cluster in clusters {
            let (cluster_report, taxa) = self
                .run_cluster(&cluster, input_dir, output_dir, rng)
                .await?;
            if cluster_report.output.is_some() {
                for taxon in taxa {
                    *report.tally.entry(taxon).or_default() += 1;
                }
            }
            report.clusters.push(cluster_report);
        }

        info!(
            alignments = report.total_alignments(),
            taxa = report.tally.len(),
            "alignment stage finished"
        );
        Ok(report)
    }

    /// Builds the batch of one cluster. Returns the report and the taxa of
    /// every written alignment, one entry per alignment.
    #[instrument(skip(self, input_dir, output_dir, rng))]
    async fn run_cluster(
        &self,
        cluster: &str,
        input_dir: &Path,
        output_dir: &Path,
        rng: &mut StdRng,
    ) -> Result<(ClusterReport, Vec<String>)> {
        let gene = self.config.gene_for_cluster(cluster);
        let mut pool = SequencePool::from_dir(&input_dir.join(cluster), gene.minfails)
            .with_context(|| format!("Failed to read sequences of {cluster}"))?;
        let species = pool.len();
        let builder = AlignmentBuilder::new(
            Arc::clone(&self.aligner),
            BuildParams::from_config(gene, self.config.min_species),
        );
        let budget = RetryBudget::new(gene.maxtrys);

        let cluster_dir = output_dir.join(cluster);
        let existed = cluster_dir.is_dir();
        std::fs::create_dir_all(&cluster_dir)
            .with_context(|| format!("Failed to create {}", cluster_dir.display()))?;
        info!(species, "aligning cluster");

        let mut taxa = Vec::new();
        let mut written = Vec::new();
        let mut produced = 0;
        let mut stopped = None;
        let mut state = BuildState {
            builder: &builder,
            pool: &mut pool,
            rng,
        };
        while produced < self.config.naligns {
            let outcome = budget
                .run(&mut state, |state, _| {
                    async move {
                        match state.builder.build(&mut *state.pool, &mut *state.rng).await {
                            Ok(alignment) => Attempt::Done(alignment),
                            Err(failure) if failure.is_terminal() => Attempt::Abort(failure),
                            Err(failure) => Attempt::Retry(failure),
                        }
                    }
                    .boxed_local()
                })
                .await;

            match outcome {
                RetryOutcome::Success { value, .. } => {
                    let index = produced + 1;
                    let name = format!(
                        "{index}_nspp{}_len{}.faa",
                        value.len(),
                        value.alignment_length()
                    );
                    let path = cluster_dir.join(&name);
                    fasta::write_alignment(&path, &value)?;
                    info!(file = %name, "alignment written");
                    written.push(path);
                    taxa.extend(value.taxa().map(str::to_string));
                    produced = index;
                }
                RetryOutcome::Aborted { error, .. } => {
                    warn!(%error, "alignment batch aborted");
                    stopped = Some(error.to_string());
                    break;
                }
                RetryOutcome::ExhaustedRetries { attempts, .. } => {
                    warn!(attempts, "no alignment within the retry budget");
                    stopped = Some(format!("no alignment after {attempts} attempts"));
                    break;
                }
            }
        }

        let output = if produced < self.config.naligns {
            warn!(produced, requested = self.config.naligns, "too few alignments, cluster dropped");
            discard(&cluster_dir, &written, existed)?;
            None
        } else {
            Some(cluster_dir)
        };

        let report = ClusterReport {
            cluster: cluster.to_string(),
            species,
            requested: self.config.naligns,
            produced,
            output,
            stopped,
        };
        Ok((report, taxa))
    }
}

/// Removes the alignments written by this run. The cluster directory goes
/// too when this run created it.
fn discard(cluster_dir: &Path, written: &[PathBuf], existed: bool) -> Result<()> {
    for path in written {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    if !existed {
        std::fs::remove_dir(cluster_dir)
            .with_context(|| format!("Failed to remove {}", cluster_dir.display()))?;
    }
    Ok(())
}

/// Non-hidden subdirectories of `dir`, sorted by name.
fn cluster_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
