//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::models::PipelineConfig;
use crate::infrastructure::config::ConfigLoader;

#[derive(Parser, Debug)]
#[command(name = "phylogen")]
#[command(about = "Phylogen - alignment building and constrained phylogeny generation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file; defaults to phylogen.yaml in the working directory
    #[arg(short, long, global = true, env = "PHYLOGEN_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build alignments for every gene cluster
    Align(commands::align::AlignArgs),
    /// Generate a phylogeny distribution and its consensus
    Phylogeny(commands::phylogeny::PhylogenyArgs),
    /// Build a consensus tree from a file of trees
    Consensus(commands::consensus::ConsensusArgs),
}

impl Cli {
    /// The configuration named by `--config`, or the layered default.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        match &self.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Prints a command error and exits with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let value = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
