//! Newick tree files: distributions (one tree per line) and single trees.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::newick;
use crate::domain::models::Tree;

/// Reads every tree of a Newick file. A missing file holds no trees.
pub fn read_trees(path: &Path) -> DomainResult<Vec<Tree>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| DomainError::io(path, e))?;
    newick::parse_trees(&text)
}

/// Number of trees already in a distribution file.
pub fn count_trees(path: &Path) -> DomainResult<usize> {
    read_trees(path).map(|trees| trees.len())
}

/// Appends `tree` as one line, creating the file if needed.
pub fn append_tree(path: &Path, tree: &Tree) -> DomainResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DomainError::io(path, e))?;
    writeln!(file, "{}", tree.to_newick()).map_err(|e| DomainError::io(path, e))
}

/// Writes `tree` as the only content of `path`.
pub fn write_tree(path: &Path, tree: &Tree) -> DomainResult<()> {
    std::fs::write(path, format!("{}\n", tree.to_newick())).map_err(|e| DomainError::io(path, e))
}
