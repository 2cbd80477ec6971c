//! Unaligned candidate sequences.

use serde::{Deserialize, Serialize};

/// A downloaded, unaligned candidate sequence for one taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Taxon identifier (FASTA record id)
    pub taxon: String,

    /// Raw residues as downloaded
    pub residues: String,

    /// Source metadata (FASTA description), e.g. accession and gene name
    pub description: Option<String>,
}

impl Sequence {
    pub fn new(taxon: impl Into<String>, residues: impl Into<String>) -> Self {
        Self {
            taxon: taxon.into(),
            residues: residues.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Number of residues.
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}
