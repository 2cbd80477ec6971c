//! Relaxed PHYLIP output, the input format of the tree search.

use std::fmt::Write as _;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Alignment;

/// Sequential relaxed PHYLIP: a `ntaxa ncolumns` header, then one
/// `taxon residues` line per row.
pub fn to_phylip(alignment: &Alignment) -> String {
    let mut out = String::with_capacity(alignment.len() * (alignment.alignment_length() + 32));
    let _ = writeln!(out, "{} {}", alignment.len(), alignment.alignment_length());
    for row in alignment {
        let _ = writeln!(out, "{} {}", row.taxon, row.residues);
    }
    out
}

pub fn write_phylip(path: &Path, alignment: &Alignment) -> DomainResult<()> {
    std::fs::write(path, to_phylip(alignment)).map_err(|e| DomainError::io(path, e))
}
