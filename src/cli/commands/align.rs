//! `phylogen align`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use super::{resolve_seed, scratch_root};
use crate::application::{AlignmentStage, AlignmentStageReport, RunContext};
use crate::cli::output::{number, output, table, truncate, CommandOutput};
use crate::domain::models::PipelineConfig;
use crate::domain::ports::Aligner;
use crate::infrastructure::solvers::{MafftAligner, MafftConfig};

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Directory holding one subdirectory of FASTA files per gene cluster
    pub input: PathBuf,

    /// Output root, receives one directory of alignments per cluster
    #[arg(short, long, default_value = "alignments")]
    pub output: PathBuf,

    /// Random seed, overrides the configured one
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AlignOutput {
    pub seed: u64,
    #[serde(flatten)]
    pub report: AlignmentStageReport,
}

impl CommandOutput for AlignOutput {
    fn to_human(&self) -> String {
        if self.report.clusters.is_empty() {
            return "No gene clusters found.".to_string();
        }

        let mut t = table(&["Cluster", "Species", "Alignments", "Status"]);
        for cluster in &self.report.clusters {
            let status = match (&cluster.output, &cluster.stopped) {
                (Some(_), _) => "complete".to_string(),
                (None, Some(reason)) => format!("dropped: {}", truncate(reason, 48)),
                (None, None) => "dropped".to_string(),
            };
            t.add_row(vec![
                Cell::new(&cluster.cluster),
                number(cluster.species),
                number(format!("{}/{}", cluster.produced, cluster.requested)),
                Cell::new(status),
            ]);
        }

        format!(
            "{t}\nGenerated {} alignment(s) covering {} taxa (seed {}).",
            self.report.total_alignments(),
            self.report.tally.len(),
            self.seed
        )
    }
}

pub async fn execute(args: AlignArgs, config: PipelineConfig, json_mode: bool) -> Result<()> {
    let seed = resolve_seed(args.seed, &config);
    let mut context = RunContext::new(config.threads, scratch_root());
    let aligner = Arc::new(MafftAligner::new(mafft_config(&config, &context)));
    context.probe_aligner(aligner.as_ref()).await;

    let stage = AlignmentStage::new(aligner as Arc<dyn Aligner>, config, context);
    let mut rng = StdRng::seed_from_u64(seed);
    let report = stage.run(&args.input, &args.output, &mut rng).await?;

    output(&AlignOutput { seed, report }, json_mode);
    Ok(())
}

/// Aligner settings for this run; scratch directories go under the run's work dir.
fn mafft_config(config: &PipelineConfig, context: &RunContext) -> MafftConfig {
    MafftConfig {
        program: config.tools.mafft.clone(),
        threads: context.threads,
        timeout_secs: config.alignment_timeout_secs,
        work_dir: context.work_dir().to_path_buf(),
    }
}
