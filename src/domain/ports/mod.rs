//! Port trait definitions (Hexagonal Architecture)
//!
//! The pipeline drives two external programs through these traits:
//! - Aligner: multiple sequence alignment (MAFFT)
//! - TreeSearcher: maximum-likelihood tree search (RAxML)
//!
//! Services depend only on the traits, so tests substitute in-memory fakes.

pub mod aligner;
pub mod tree_searcher;

pub use aligner::Aligner;
pub use tree_searcher::{Constraint, ConstraintKind, SearchRequest, TreeSearcher};
