//! Multiple sequence alignments.
//!
//! An [`Alignment`] is an ordered list of [`AlignedSequence`]s that all share
//! the same number of columns. Construction validates that invariant, so every
//! alignment handed around the pipeline is rectangular and has unique taxa.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Gap symbol written when filling absent taxa.
pub const GAP: u8 = b'-';

/// Returns whether a column symbol counts as a gap.
pub const fn is_gap(symbol: u8) -> bool {
    matches!(symbol, b'-' | b'?' | b'.')
}

/// One row of an alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedSequence {
    pub taxon: String,
    pub residues: String,
}

impl AlignedSequence {
    pub fn new(taxon: impl Into<String>, residues: impl Into<String>) -> Self {
        Self {
            taxon: taxon.into(),
            residues: residues.into(),
        }
    }

    /// A row made only of gaps, used for taxa missing from a locus.
    pub fn gaps(taxon: impl Into<String>, length: usize) -> Self {
        Self::new(taxon, "-".repeat(length))
    }

    pub fn gap_count(&self) -> usize {
        self.residues.bytes().filter(|&b| is_gap(b)).count()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len() - self.gap_count()
    }

    /// Fraction of columns in this row that are gaps.
    pub fn gap_fraction(&self) -> f64 {
        if self.residues.is_empty() {
            return 1.0;
        }
        self.gap_count() as f64 / self.residues.len() as f64
    }
}

/// A rectangular multiple sequence alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    records: Vec<AlignedSequence>,
    length: usize,
}

impl Alignment {
    /// Builds an alignment, checking it is non-empty, rectangular and has unique taxa.
    pub fn new(records: Vec<AlignedSequence>) -> DomainResult<Self> {
        let Some(first) = records.first() else {
            return Err(DomainError::EmptyAlignment);
        };
        let length = first.residues.len();

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.residues.len() != length {
                return Err(DomainError::RaggedAlignment {
                    taxon: record.taxon.clone(),
                    expected: length,
                    found: record.residues.len(),
                });
            }
            if !seen.insert(record.taxon.as_str()) {
                return Err(DomainError::DuplicateTaxon(record.taxon.clone()));
            }
        }

        Ok(Self { records, length })
    }

    /// Number of sequences (taxa).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of columns.
    pub fn alignment_length(&self) -> usize {
        self.length
    }

    pub fn records(&self) -> &[AlignedSequence] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignedSequence> {
        self.records.iter()
    }

    pub fn taxa(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.taxon.as_str())
    }

    pub fn contains(&self, taxon: &str) -> bool {
        self.get(taxon).is_some()
    }

    pub fn get(&self, taxon: &str) -> Option<&AlignedSequence> {
        self.records.iter().find(|r| r.taxon == taxon)
    }

    /// Largest gap fraction over all rows.
    pub fn max_gap_fraction(&self) -> f64 {
        self.records
            .iter()
            .map(AlignedSequence::gap_fraction)
            .fold(0.0, f64::max)
    }

    /// Number of columns where `taxon` has a residue and at least one other
    /// row has a residue too.
    ///
    /// Returns `None` if the taxon is not part of this alignment.
    pub fn overlap(&self, taxon: &str) -> Option<usize> {
        let row = self.get(taxon)?.residues.as_bytes();
        let others: Vec<&[u8]> = self
            .records
            .iter()
            .filter(|r| r.taxon != taxon)
            .map(|r| r.residues.as_bytes())
            .collect();

        let overlap = (0..self.length)
            .filter(|&col| !is_gap(row[col]) && others.iter().any(|o| !is_gap(o[col])))
            .count();
        Some(overlap)
    }

    /// Keeps columns `start..end` of every row.
    pub fn columns(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.length);
        let start = start.min(end);
        let records = self
            .records
            .iter()
            .map(|r| AlignedSequence::new(r.taxon.clone(), &r.residues[start..end]))
            .collect();
        Self {
            records,
            length: end - start,
        }
    }

    /// Reverse complement of every row (gaps are kept in place).
    pub fn reverse_complement(&self) -> Self {
        let records = self
            .records
            .iter()
            .map(|r| {
                let rc = bio::alphabets::dna::revcomp(r.residues.as_bytes());
                AlignedSequence::new(r.taxon.clone(), String::from_utf8_lossy(&rc).into_owned())
            })
            .collect();
        Self {
            records,
            length: self.length,
        }
    }
}

impl<'a> IntoIterator for &'a Alignment {
    type Item = &'a AlignedSequence;
    type IntoIter = std::slice::Iter<'a, AlignedSequence>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(rows: &[(&str, &str)]) -> Alignment {
        Alignment::new(
            rows.iter()
                .map(|(t, r)| AlignedSequence::new(*t, *r))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = Alignment::new(vec![
            AlignedSequence::new("A", "ACGT"),
            AlignedSequence::new("B", "ACG"),
        ]);
        assert!(matches!(
            result,
            Err(DomainError::RaggedAlignment { expected: 4, found: 3, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_taxa() {
        let result = Alignment::new(vec![
            AlignedSequence::new("A", "ACGT"),
            AlignedSequence::new("A", "ACGA"),
        ]);
        assert!(matches!(result, Err(DomainError::DuplicateTaxon(t)) if t == "A"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            Alignment::new(vec![]),
            Err(DomainError::EmptyAlignment)
        ));
    }

    #[test]
    fn test_gap_fraction() {
        let row = AlignedSequence::new("A", "AC--");
        assert_eq!(row.gap_count(), 2);
        assert_eq!(row.residue_count(), 2);
        assert!((row.gap_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_counts_shared_columns() {
        let aln = alignment(&[("A", "ACGT--"), ("B", "--GTAC"), ("C", "------")]);
        assert_eq!(aln.overlap("A"), Some(2));
        assert_eq!(aln.overlap("B"), Some(2));
        assert_eq!(aln.overlap("C"), Some(0));
        assert_eq!(aln.overlap("Z"), None);
    }

    #[test]
    fn test_columns_and_reverse_complement() {
        let aln = alignment(&[("A", "AACGT-"), ("B", "ATTGCA")]);
        let cut = aln.columns(1, 4);
        assert_eq!(cut.alignment_length(), 3);
        assert_eq!(cut.get("A").unwrap().residues, "ACG");

        let rc = aln.reverse_complement();
        assert_eq!(rc.get("A").unwrap().residues, "-ACGTT");
        assert_eq!(rc.get("B").unwrap().residues, "TGCAAT");
    }
}
