//! `phylogen consensus`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::application::{write_consensus, ConsensusReport};
use crate::cli::output::{output, CommandOutput};

#[derive(Args, Debug)]
pub struct ConsensusArgs {
    /// Newick file with one or more trees
    pub trees: PathBuf,

    /// Where to write the consensus tree
    #[arg(short, long, default_value = "consensus.tre")]
    pub output: PathBuf,

    /// Smallest split frequency kept in the consensus
    #[arg(short, long, default_value_t = 0.5)]
    pub min_freq: f64,

    /// Treat the trees as unrooted
    #[arg(long)]
    pub unrooted: bool,
}

#[derive(Debug, Serialize)]
pub struct ConsensusOutput {
    pub success: bool,
    pub consensus: Option<ConsensusReport>,
}

impl CommandOutput for ConsensusOutput {
    fn to_human(&self) -> String {
        match &self.consensus {
            Some(c) => format!(
                "Consensus of {} trees over {} taxa (min frequency {:.2}) written to {}.",
                c.trees,
                c.taxa,
                c.min_freq,
                c.file.display()
            ),
            None => "No consensus tree produced: too few taxa shared by the trees.".to_string(),
        }
    }
}

pub async fn execute(args: ConsensusArgs, json_mode: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&args.min_freq) {
        anyhow::bail!("--min-freq must lie in [0, 1], got {}", args.min_freq);
    }
    let consensus = write_consensus(&args.trees, &args.output, args.min_freq, !args.unrooted)?;
    output(
        &ConsensusOutput {
            success: consensus.is_some(),
            consensus,
        },
        json_mode,
    );
    Ok(())
}
