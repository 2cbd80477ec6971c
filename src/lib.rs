//! Phylogen - unattended alignment building and phylogeny generation
//!
//! Phylogen grows quality-checked multiple sequence alignments for gene
//! clusters, then repeatedly builds constrained maximum-likelihood trees
//! from them, keeps those that pass a root-to-tip consistency test, and
//! summarises the distribution as a majority-rule consensus.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): sequences, alignments, trees, genetic
//!   codes, configuration, and the solver ports
//! - **Service Layer** (`services`): alignment growth, alignment selection,
//!   supermatrix assembly, constraints, tree generation, consensus
//! - **Application Layer** (`application`): the alignment and phylogeny
//!   stage drivers
//! - **Infrastructure Layer** (`infrastructure`): MAFFT and RAxML adapters,
//!   file formats, configuration loading, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use phylogen::services::consensus;
//! use phylogen::Tree;
//!
//! let trees = vec![
//!     Tree::from_newick("((A,B),(C,D));").unwrap(),
//!     Tree::from_newick("((A,B),C,D);").unwrap(),
//! ];
//! let tree = consensus(&trees, 0.5, true).unwrap();
//! println!("{}", tree.to_newick());
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{AlignmentStage, PhylogenyStage, RunContext};
pub use domain::models::{
    AlignedSequence, Alignment, ConstraintMode, GeneConfig, GeneticCode, GenomeCompartment,
    PipelineConfig, SelectionPolicy, Sequence, StopCodons, Tree,
};
pub use domain::ports::{Aligner, TreeSearcher};
pub use domain::{DomainError, DomainResult, SolverError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AlignmentBuilder, PhylogenyGenerator, RetryBudget, RetryOutcome, SequencePool};
