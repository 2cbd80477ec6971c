//! Maximum-likelihood tree search port.

use async_trait::async_trait;

use crate::domain::errors::SolverError;
use crate::domain::models::{Alignment, Tree};

/// How a constraint topology is handed to the tree search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Fully bifurcating: every split is enforced.
    Resolved,
    /// Multifurcating: only the splits present are enforced.
    Backbone,
}

impl ConstraintKind {
    pub fn for_tree(tree: &Tree) -> Self {
        if tree.is_bifurcating() {
            Self::Resolved
        } else {
            Self::Backbone
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub tree: Tree,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(tree: Tree) -> Self {
        let kind = ConstraintKind::for_tree(&tree);
        Self { tree, kind }
    }
}

/// Everything one tree search needs.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Concatenated alignment
    pub alignment: Alignment,
    /// Partition table text, only for concatenated loci
    pub partitions: Option<String>,
    pub constraint: Option<Constraint>,
    pub outgroup: Option<String>,
    /// Pseudo-random seed for the search
    pub seed: u64,
    /// Thread-count hint
    pub threads: usize,
}

/// An external maximum-likelihood tree search program.
#[async_trait]
pub trait TreeSearcher: Send + Sync {
    /// Program name, used in logs.
    fn name(&self) -> &'static str;

    /// Whether the program can be executed.
    async fn is_available(&self) -> bool;

    /// Run one search and return the best tree found.
    async fn search(&self, request: SearchRequest) -> Result<Tree, SolverError>;
}
