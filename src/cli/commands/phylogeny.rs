//! `phylogen phylogeny`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use super::{resolve_seed, scratch_root};
use crate::application::{
    load_lineages, load_reference, PhylogenyInputs, PhylogenyStage, PhylogenyStageReport,
    RunContext,
};
use crate::cli::output::{number, output, table, truncate, CommandOutput};
use crate::domain::models::PipelineConfig;
use crate::domain::ports::TreeSearcher;
use crate::infrastructure::solvers::{RaxmlConfig, RaxmlSearcher};
use crate::services::Lineages;

#[derive(Args, Debug)]
pub struct PhylogenyArgs {
    /// Output root of the alignment stage
    pub alignments: PathBuf,

    /// Directory for the distribution and consensus files
    #[arg(short, long, default_value = "phylogeny")]
    pub output: PathBuf,

    /// Taxonomic reference tree (Newick) used for constraints and outgroups
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Taxon to lineage map (YAML or JSON) used to pick genetic codes
    #[arg(short, long)]
    pub lineages: Option<PathBuf>,

    /// Random seed, overrides the configured one
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PhylogenyOutput {
    pub seed: u64,
    #[serde(flatten)]
    pub report: PhylogenyStageReport,
}

impl CommandOutput for PhylogenyOutput {
    fn to_human(&self) -> String {
        let mut t = table(&["Distribution", "Constrained", "Trees", "Status"]);
        for pass in &self.report.passes {
            let status = if pass.is_complete() {
                "complete".to_string()
            } else {
                pass.stopped
                    .as_deref()
                    .map_or_else(|| "incomplete".to_string(), |r| truncate(r, 48))
            };
            t.add_row(vec![
                Cell::new(pass.file.display()),
                Cell::new(if pass.constrained { "yes" } else { "no" }),
                number(format!("{}/{}", pass.total(), pass.requested)),
                Cell::new(status),
            ]);
        }

        let consensus = self.report.consensus.as_ref().map_or_else(
            || "No consensus tree produced.".to_string(),
            |c| {
                format!(
                    "Consensus of {} trees over {} taxa written to {}.",
                    c.trees,
                    c.taxa,
                    c.file.display()
                )
            },
        );
        format!("{t}\n{consensus} (seed {})", self.seed)
    }
}

pub async fn execute(args: PhylogenyArgs, config: PipelineConfig, json_mode: bool) -> Result<()> {
    let seed = resolve_seed(args.seed, &config);
    let reference = args.reference.as_deref().map(load_reference).transpose()?;
    let lineages = args
        .lineages
        .as_deref()
        .map(load_lineages)
        .transpose()?
        .unwrap_or_else(Lineages::new);

    let mut context = RunContext::new(config.threads, scratch_root());
    let searcher = Arc::new(RaxmlSearcher::new(raxml_config(&config, &context)));
    context.probe_tree_searcher(searcher.as_ref()).await;

    let stage = PhylogenyStage::new(searcher as Arc<dyn TreeSearcher>, config, context);
    let inputs = PhylogenyInputs {
        alignment_dir: args.alignments,
        reference,
        lineages,
        seed,
    };
    let report = stage.run(inputs, &args.output).await?;

    output(&PhylogenyOutput { seed, report }, json_mode);
    Ok(())
}

/// Tree-search settings for this run; scratch directories go under the run's work dir.
fn raxml_config(config: &PipelineConfig, context: &RunContext) -> RaxmlConfig {
    RaxmlConfig {
        program: config.tools.raxml.clone(),
        timeout_secs: config.search_timeout_secs,
        work_dir: context.work_dir().to_path_buf(),
    }
}
