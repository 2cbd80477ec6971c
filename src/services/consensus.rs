//! Majority-rule consensus from split frequencies.
//!
//! Every tree is pruned to the taxa all trees share. Each internal node
//! then induces a clade, kept as a bitset over the shared taxa. Clades are
//! counted once per tree, and those reaching `min_freq` are combined
//! greedily, most frequent first, skipping any clade that conflicts with one
//! already accepted. The consensus labels each clade with its frequency and
//! gives it the mean branch length over the trees that contain it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::models::{NodeIndex, Tree};

/// Clade over the shared taxa, one bit per taxon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Clade(Vec<u64>);

impl Clade {
    fn empty(ntaxa: usize) -> Self {
        Self(vec![0; ntaxa.div_ceil(64)])
    }

    fn insert(&mut self, taxon: usize) {
        self.0[taxon / 64] |= 1u64 << (taxon % 64);
    }

    fn contains(&self, taxon: usize) -> bool {
        self.0[taxon / 64] & (1u64 << (taxon % 64)) != 0
    }

    fn union_with(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= b;
        }
    }

    fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn is_subset(&self, other: &Self) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & !b == 0)
    }

    fn is_disjoint(&self, other: &Self) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & b == 0)
    }

    fn compatible(&self, other: &Self) -> bool {
        self.is_disjoint(other) || self.is_subset(other) || other.is_subset(self)
    }

    fn complement(&self, ntaxa: usize) -> Self {
        let mut out = Self::empty(ntaxa);
        for taxon in 0..ntaxa {
            if !self.contains(taxon) {
                out.insert(taxon);
            }
        }
        out
    }
}

/// Occurrences of one clade or one terminal branch.
#[derive(Debug, Default, Clone)]
struct Tally {
    count: usize,
    length_sum: f64,
    lengths: usize,
}

impl Tally {
    fn add(&mut self, length: Option<f64>) {
        self.count += 1;
        if let Some(length) = length {
            self.length_sum += length;
            self.lengths += 1;
        }
    }

    fn mean_length(&self) -> Option<f64> {
        (self.lengths > 0).then(|| self.length_sum / self.lengths as f64)
    }
}

/// Builds the consensus of `trees`.
///
/// Clades with a frequency of at least `min_freq` enter the consensus. With
/// `rooted` false, clades are read as bipartitions of an unrooted tree.
/// Returns `None` when there is no tree or fewer than three taxa are shared
/// by all trees.
pub fn consensus(trees: &[Tree], min_freq: f64, rooted: bool) -> Option<Tree> {
    let first = trees.first()?;

    let mut shared: HashSet<&str> = first.leaf_labels().into_iter().collect();
    for tree in &trees[1..] {
        let labels: HashSet<&str> = tree.leaf_labels().into_iter().collect();
        shared.retain(|label| labels.contains(label));
    }
    if shared.len() < 3 {
        debug!(shared = shared.len(), trees = trees.len(), "too few shared taxa for a consensus");
        return None;
    }

    let taxa: Vec<&str> = first
        .leaf_labels()
        .into_iter()
        .filter(|label| shared.contains(label))
        .collect();
    let index: HashMap<&str, usize> = taxa.iter().enumerate().map(|(i, &t)| (t, i)).collect();
    let ntaxa = taxa.len();
    let max_size = if rooted { ntaxa - 1 } else { ntaxa - 2 };

    let mut clades: HashMap<Clade, Tally> = HashMap::new();
    let mut terminals: Vec<Tally> = vec![Tally::default(); ntaxa];
    for tree in trees {
        let pruned = tree.pruned(&shared)?;
        let mut below: HashMap<NodeIndex, Clade> = HashMap::new();
        let mut seen: HashSet<Clade> = HashSet::new();

        for node in pruned.post_order_iter() {
            let mut clade = Clade::empty(ntaxa);
            if node.is_leaf() {
                if let Some(&taxon) = node.label().and_then(|l| index.get(l)) {
                    clade.insert(taxon);
                    terminals[taxon].add(node.branch_length());
                }
            } else {
                for child in node.children() {
                    if let Some(child_clade) = below.remove(child) {
                        clade.union_with(&child_clade);
                    }
                }
                if !node.is_root() {
                    let split = if !rooted && clade.contains(0) {
                        clade.complement(ntaxa)
                    } else {
                        clade.clone()
                    };
                    let size = split.len();
                    if (2..=max_size).contains(&size) && seen.insert(split.clone()) {
                        clades.entry(split).or_default().add(node.branch_length());
                    }
                }
            }
            below.insert(node.index(), clade);
        }
    }

    let ntrees = trees.len() as f64;
    let mut candidates: Vec<(Clade, Tally)> = clades
        .into_iter()
        .filter(|(_, tally)| tally.count as f64 / ntrees >= min_freq)
        .collect();
    candidates.sort_by(|(a, ta), (b, tb)| {
        tb.count
            .cmp(&ta.count)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.cmp(b))
    });

    let mut accepted: Vec<(Clade, Tally)> = Vec::new();
    for (clade, tally) in candidates {
        if accepted.iter().all(|(other, _)| clade.compatible(other)) {
            accepted.push((clade, tally));
        }
    }
    accepted.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    debug!(taxa = ntaxa, trees = trees.len(), clades = accepted.len(), "consensus clades");

    let mut out = Tree::new();
    let root = out.root_index();
    let mut placed: Vec<(&Clade, NodeIndex)> = Vec::with_capacity(accepted.len());
    for (clade, tally) in &accepted {
        let parent = placed
            .iter()
            .rev()
            .find(|(outer, _)| clade.is_subset(outer))
            .map_or(root, |&(_, node)| node);
        let label = format!("{:.2}", tally.count as f64 / ntrees);
        let node = out.add_child(parent, Some(label), tally.mean_length());
        placed.push((clade, node));
    }
    for (taxon, &label) in taxa.iter().enumerate() {
        let parent = placed
            .iter()
            .rev()
            .find(|(clade, _)| clade.contains(taxon))
            .map_or(root, |&(_, node)| node);
        out.add_child(parent, Some(label.to_string()), terminals[taxon].mean_length());
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn tree(newick: &str) -> Tree {
        Tree::from_newick(newick).unwrap()
    }

    /// Leaf sets of every internal non-root node.
    fn clade_sets(tree: &Tree) -> BTreeSet<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for node in tree.pre_order_iter() {
            if node.is_leaf() || node.is_root() {
                continue;
            }
            let mut stack = vec![node.index()];
            let mut leaves = BTreeSet::new();
            while let Some(i) = stack.pop() {
                let n = tree.node(i);
                if n.is_leaf() {
                    leaves.insert(n.label().unwrap().to_string());
                }
                stack.extend(n.children());
            }
            out.insert(leaves);
        }
        out
    }

    #[test]
    fn test_no_trees_no_consensus() {
        assert!(consensus(&[], 0.5, true).is_none());
    }

    #[test]
    fn test_too_few_shared_taxa() {
        let trees = vec![tree("((A,B),(C,D));"), tree("((A,B),(E,F));")];
        assert!(consensus(&trees, 0.5, true).is_none());
    }

    #[test]
    fn test_majority_clades_with_frequencies() {
        let trees = vec![
            tree("(((A,B),C),(D,E));"),
            tree("(((A,B),D),(C,E));"),
            tree("(((A,B),C),(D,E));"),
        ];
        let result = consensus(&trees, 0.5, true).unwrap();
        let clades = clade_sets(&result);
        let expected: BTreeSet<BTreeSet<String>> = [
            vec!["A", "B"],
            vec!["A", "B", "C"],
            vec!["D", "E"],
        ]
        .into_iter()
        .map(|c| c.into_iter().map(String::from).collect())
        .collect();
        assert_eq!(clades, expected);

        let ab = result
            .pre_order_iter()
            .find(|n| n.label() == Some("1.00"))
            .unwrap();
        assert_eq!(ab.children().len(), 2);
        assert!(result.pre_order_iter().any(|n| n.label() == Some("0.67")));
    }

    #[test]
    fn test_minority_clades_are_dropped() {
        let trees = vec![tree("((A,B),(C,D),E);"), tree("((A,C),(B,D),E);")];
        let result = consensus(&trees, 0.6, true).unwrap();
        assert!(clade_sets(&result).is_empty());
        assert_eq!(result.root().children().len(), 5);
    }

    #[test]
    fn test_taxa_missing_from_some_trees_are_pruned() {
        let trees = vec![tree("((A,B),(C,(D,X)));"), tree("((A,B),(C,D));")];
        let result = consensus(&trees, 0.5, true).unwrap();
        let mut leaves = result.leaf_labels();
        leaves.sort_unstable();
        assert_eq!(leaves, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_mean_branch_lengths() {
        let trees = vec![
            tree("((A:1,B:1):2,(C:1,D:1):2);"),
            tree("((A:3,B:1):4,(C:1,D:1):2);"),
        ];
        let result = consensus(&trees, 0.5, true).unwrap();
        let a = result.node(result.find_leaf("A").unwrap());
        assert_eq!(a.branch_length(), Some(2.0));
        let ab = result.node(a.parent().unwrap());
        assert_eq!(ab.branch_length(), Some(3.0));
    }

    #[test]
    fn test_unrooted_mode_ignores_root_position() {
        // Same unrooted topology, rooted on different edges.
        let trees = vec![
            tree("((A,B),(C,(D,E)));"),
            tree("(E,(D,(C,(A,B))));"),
        ];
        let rooted = consensus(&trees, 1.0, true).unwrap();
        let unrooted = consensus(&trees, 1.0, false).unwrap();
        assert_eq!(clade_sets(&rooted).len(), 1);
        assert_eq!(clade_sets(&unrooted).len(), 2);
        assert!(clade_sets(&unrooted).contains(
            &["D", "E"].iter().map(|s| (*s).to_string()).collect()
        ));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        /// A random rooted tree over `n` taxa, built by merging two or three
        /// subtrees until one is left.
        fn random_newick(n: usize, seed: u64) -> String {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut parts: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
            while parts.len() > 1 {
                let k = if parts.len() >= 3 && rng.gen_bool(0.3) { 3 } else { 2 };
                let mut merged = Vec::with_capacity(k);
                for _ in 0..k {
                    let i = rng.gen_range(0..parts.len());
                    merged.push(parts.swap_remove(i));
                }
                parts.push(format!("({})", merged.join(",")));
            }
            format!("{};", parts[0])
        }

        proptest! {
            #[test]
            fn consensus_of_copies_has_same_topology(
                n in 3usize..15,
                seed in any::<u64>(),
                copies in 2usize..5,
                min_freq in 0.0f64..=1.0,
            ) {
                let original = tree(&random_newick(n, seed));
                let trees = vec![original.clone(); copies];
                let result = consensus(&trees, min_freq, true).unwrap();
                prop_assert_eq!(clade_sets(&result), clade_sets(&original));
            }
        }
    }
}
