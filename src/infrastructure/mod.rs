//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - External solver adapters (MAFFT, RAxML) and the subprocess runner
//! - FASTA, PHYLIP and Newick tree files
//! - Scratch directories
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod fasta;
pub mod logging;
pub mod phylip;
pub mod scratch;
pub mod solvers;
pub mod tree_file;
