//! Taxonomic constraint trees and outgroup choice.

use std::collections::HashSet;

use crate::domain::models::{Alignment, Tree};
use crate::domain::ports::Constraint;

/// Taxon name that is always chosen as outgroup when present.
pub const OUTGROUP_SENTINEL: &str = "outgroup";

/// Prunes the reference tree to the taxa of `alignment`.
///
/// Returns `None` when fewer than three alignment taxa occur in the
/// reference, since such a tree constrains nothing.
pub fn constraint_tree(reference: &Tree, alignment: &Alignment) -> Option<Constraint> {
    let keep: HashSet<&str> = alignment.taxa().collect();
    let pruned = reference.pruned(&keep)?;
    if pruned.num_leaves() < 3 {
        return None;
    }
    Some(Constraint::new(pruned))
}

/// Picks the outgroup for a search over `alignment`.
///
/// A taxon literally named `outgroup` wins. Otherwise the alignment taxon
/// closest to the root of the constraint tree, counted in edges, is chosen,
/// the first one in alignment order on ties. Without a constraint tree
/// there is nothing to measure and no outgroup.
pub fn select_outgroup(alignment: &Alignment, constraint: Option<&Tree>) -> Option<String> {
    if alignment.contains(OUTGROUP_SENTINEL) {
        return Some(OUTGROUP_SENTINEL.to_string());
    }
    let tree = constraint?;

    let mut best: Option<(&str, usize)> = None;
    for taxon in alignment.taxa() {
        let Some(index) = tree.find_leaf(taxon) else {
            continue;
        };
        let depth = tree.depth(index);
        if best.is_none_or(|(_, min)| depth < min) {
            best = Some((taxon, depth));
        }
    }
    best.map(|(taxon, _)| taxon.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AlignedSequence;
    use crate::domain::ports::ConstraintKind;

    fn alignment(taxa: &[&str]) -> Alignment {
        Alignment::new(
            taxa.iter()
                .map(|t| AlignedSequence::new(*t, "ACGT"))
                .collect(),
        )
        .unwrap()
    }

    fn reference() -> Tree {
        Tree::from_newick("(((A,B),(C,(D,E))),outgroup,((W,X),(Y,Z)));").unwrap()
    }

    #[test]
    fn test_constraint_keeps_exactly_the_alignment_taxa() {
        let aln = alignment(&["A", "B", "C", "D", "E", "outgroup"]);
        let constraint = constraint_tree(&reference(), &aln).unwrap();
        let mut leaves = constraint.tree.leaf_labels();
        leaves.sort_unstable();
        assert_eq!(leaves, vec!["A", "B", "C", "D", "E", "outgroup"]);
        assert_eq!(constraint.kind, ConstraintKind::Resolved);
    }

    #[test]
    fn test_multifurcating_constraint_is_a_backbone() {
        let reference = Tree::from_newick("((A,B,C),(D,E));").unwrap();
        let constraint = constraint_tree(&reference, &alignment(&["A", "B", "C", "D"])).unwrap();
        assert_eq!(constraint.kind, ConstraintKind::Backbone);
    }

    #[test]
    fn test_constraint_needs_three_shared_taxa() {
        assert!(constraint_tree(&reference(), &alignment(&["A", "B", "Q"])).is_none());
        assert!(constraint_tree(&reference(), &alignment(&["Q", "R", "S"])).is_none());
    }

    #[test]
    fn test_sentinel_outgroup_always_wins() {
        let aln = alignment(&["A", "B", "outgroup"]);
        assert_eq!(select_outgroup(&aln, None).as_deref(), Some("outgroup"));
        let tree = Tree::from_newick("(outgroup,(A,B));").unwrap();
        assert_eq!(select_outgroup(&aln, Some(&tree)).as_deref(), Some("outgroup"));
    }

    #[test]
    fn test_outgroup_is_the_most_basal_taxon() {
        let tree = Tree::from_newick("((((A,B),C),D),E);").unwrap();
        let aln = alignment(&["A", "B", "C", "D", "E"]);
        assert_eq!(select_outgroup(&aln, Some(&tree)).as_deref(), Some("E"));
    }

    #[test]
    fn test_outgroup_ignores_taxa_outside_the_constraint() {
        let tree = Tree::from_newick("(((A,B),C),D);").unwrap();
        let aln = alignment(&["Q", "A", "B", "C", "D"]);
        assert_eq!(select_outgroup(&aln, Some(&tree)).as_deref(), Some("D"));
    }

    #[test]
    fn test_outgroup_ties_go_to_first_taxon() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let aln = alignment(&["C", "A", "B", "D"]);
        assert_eq!(select_outgroup(&aln, Some(&tree)).as_deref(), Some("C"));
    }

    #[test]
    fn test_no_constraint_no_outgroup() {
        assert_eq!(select_outgroup(&alignment(&["A", "B", "C"]), None), None);
    }
}
