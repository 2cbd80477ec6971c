//! Concatenation of per-cluster alignments into one supermatrix, and the
//! partition table that tells the tree searcher where each locus lives.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AlignedSequence, Alignment};

/// Concatenates `alignments` in order.
///
/// The taxa of the result are the union of all taxa in order of first
/// occurrence. A taxon absent from an alignment gets that alignment's
/// length in gap characters. Returns the column range of every input.
pub fn concatenate(alignments: &[&Alignment]) -> DomainResult<(Alignment, Vec<Range<usize>>)> {
    if alignments.is_empty() {
        return Err(DomainError::EmptyAlignment);
    }

    let mut taxa: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for alignment in alignments {
        for taxon in alignment.taxa() {
            if seen.insert(taxon) {
                taxa.push(taxon);
            }
        }
    }

    let total: usize = alignments.iter().map(|a| a.alignment_length()).sum();
    let mut rows: HashMap<&str, String> = taxa
        .iter()
        .map(|&taxon| (taxon, String::with_capacity(total)))
        .collect();

    let mut ranges = Vec::with_capacity(alignments.len());
    let mut start = 0;
    for alignment in alignments {
        let length = alignment.alignment_length();
        for (&taxon, row) in &mut rows {
            match alignment.get(taxon) {
                Some(record) => row.push_str(&record.residues),
                None => row.extend(std::iter::repeat_n('-', length)),
            }
        }
        ranges.push(start..start + length);
        start += length;
    }

    let records = taxa
        .into_iter()
        .map(|taxon| {
            let residues = rows.remove(taxon).unwrap_or_default();
            AlignedSequence::new(taxon, residues)
        })
        .collect();
    Ok((Alignment::new(records)?, ranges))
}

/// One line of a partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    /// First column, 1-based
    pub start: usize,
    /// Last column, 1-based and inclusive
    pub end: usize,
    /// Every third column from `start`
    pub codon_position: bool,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DNA, {} = {}-{}", self.name, self.start, self.end)?;
        if self.codon_position {
            f.write_str("\\3")?;
        }
        Ok(())
    }
}

/// A locus placed in a supermatrix.
#[derive(Debug, Clone)]
pub struct Locus<'a> {
    pub gene: &'a str,
    pub cluster: &'a str,
    /// 0-based, half-open
    pub columns: Range<usize>,
    /// Trimmed to a reading frame; split by codon position
    pub coding: bool,
}

/// Partitions for the given loci, in locus order.
///
/// A single locus needs no partitioning and yields an empty table. A gene
/// name used by more than one locus is replaced by the cluster name.
pub fn partitions(loci: &[Locus<'_>]) -> Vec<Partition> {
    if loci.len() < 2 {
        return Vec::new();
    }

    let mut gene_counts: HashMap<&str, usize> = HashMap::new();
    for locus in loci {
        *gene_counts.entry(locus.gene).or_default() += 1;
    }

    let mut out = Vec::new();
    for locus in loci {
        let name = if gene_counts[locus.gene] > 1 {
            locus.cluster
        } else {
            locus.gene
        };
        let start = locus.columns.start + 1;
        let end = locus.columns.end;
        if locus.coding && end >= start + 2 {
            out.extend((0..3).map(|k| Partition {
                name: format!("{name}_codon{}", k + 1),
                start: start + k,
                end,
                codon_position: true,
            }));
        } else {
            out.push(Partition {
                name: name.to_string(),
                start,
                end,
                codon_position: false,
            });
        }
    }
    out
}

/// Partition file contents, one newline-terminated line per partition.
pub fn partition_text(partitions: &[Partition]) -> String {
    partitions.iter().map(|p| format!("{p}\n")).collect()
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

    fn locus<'a>(gene: &'a str, cluster: &'a str, columns: Range<usize>) -> Locus<'a> {
        Locus {
            gene,
            cluster,
            columns,
            coding: false,
        }
    }

    #[test]
    fn test_concatenate_fills_missing_taxa_with_gaps() {
        let a = alignment(&[("A", "AC"), ("B", "AG")]);
        let b = alignment(&[("B", "TTT"), ("C", "TTA")]);
        let (matrix, ranges) = concatenate(&[&a, &b]).unwrap();

        assert_eq!(matrix.taxa().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(matrix.get("A").unwrap().residues, "AC---");
        assert_eq!(matrix.get("B").unwrap().residues, "AGTTT");
        assert_eq!(matrix.get("C").unwrap().residues, "--TTA");
        assert_eq!(ranges, vec![0..2, 2..5]);
    }

    #[test]
    fn test_concatenate_single_alignment_is_identity() {
        let a = alignment(&[("A", "ACGT"), ("B", "ACGA")]);
        let (matrix, ranges) = concatenate(&[&a]).unwrap();
        assert_eq!(matrix, a);
        assert_eq!(ranges, vec![0..4]);
    }

    #[test]
    fn test_concatenate_nothing() {
        assert!(matches!(concatenate(&[]), Err(DomainError::EmptyAlignment)));
    }

    #[test]
    fn test_two_gene_partition_text() {
        let parts = partitions(&[
            locus("gene1", "gene1_cluster0", 0..1761),
            locus("gene2", "gene2_cluster0", 1761..3141),
        ]);
        assert_eq!(
            partition_text(&parts),
            "DNA, gene1 = 1-1761\nDNA, gene2 = 1762-3141\n"
        );
    }

    #[test]
    fn test_single_locus_has_no_partitions() {
        assert!(partitions(&[locus("gene1", "gene1_cluster0", 0..100)]).is_empty());
    }

    #[test]
    fn test_coding_locus_splits_by_codon_position() {
        let mut coding = locus("COI", "COI_cluster0", 0..9);
        coding.coding = true;
        let parts = partitions(&[coding, locus("ssu", "ssu_cluster0", 9..20)]);
        assert_eq!(
            partition_text(&parts),
            "DNA, COI_codon1 = 1-9\\3\nDNA, COI_codon2 = 2-9\\3\nDNA, COI_codon3 = 3-9\\3\nDNA, ssu = 10-20\n"
        );
    }

    #[test]
    fn test_duplicate_gene_names_use_cluster_names() {
        let parts = partitions(&[
            locus("rbcl", "rbcl_cluster0", 0..10),
            locus("rbcl", "rbcl_cluster1", 10..20),
        ]);
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["rbcl_cluster0", "rbcl_cluster1"]);
    }
}
