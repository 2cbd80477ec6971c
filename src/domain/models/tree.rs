//! Rooted phylogenetic trees.
//!
//! [`Tree`] uses the arena pattern: all nodes live in one vector and refer to
//! each other by [`NodeIndex`]. Unlike a strictly binary model, a node may
//! have any number of children, since taxonomic reference trees and
//! consensus trees are usually multifurcating.
//!
//! # Structure
//! - The root is a node without parent; its index is kept in the tree.
//! - Leaves carry the taxon label, internal nodes may carry a label too
//!   (e.g. a support value on consensus trees).
//! - Branch lengths are optional; missing lengths count as zero in distances.

use std::collections::HashSet;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::newick;

/// Index of a node in a tree (arena).
pub type NodeIndex = usize;

/// A node of a [`Tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    index: NodeIndex,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
    label: Option<String>,
    branch_length: Option<f64>,
}

impl Node {
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn branch_length(&self) -> Option<f64> {
        self.branch_length
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A rooted tree with optional branch lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeIndex,
}

// ============================================================================
// Construction & accessors
// ============================================================================
impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree consisting of a single unlabelled root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                index: 0,
                parent: None,
                children: Vec::new(),
                label: None,
                branch_length: None,
            }],
            root: 0,
        }
    }

    /// Adds a node below `parent` and returns its index.
    ///
    /// # Panics
    /// Panics if `parent` is not a node of this tree.
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        label: Option<String>,
        branch_length: Option<f64>,
    ) -> NodeIndex {
        let index = self.nodes.len();
        self.nodes.push(Node {
            index,
            parent: Some(parent),
            children: Vec::new(),
            label,
            branch_length,
        });
        self.nodes[parent].children.push(index);
        index
    }

    pub fn set_label(&mut self, index: NodeIndex, label: Option<String>) {
        self.nodes[index].label = label;
    }

    pub fn set_branch_length(&mut self, index: NodeIndex, branch_length: Option<f64>) {
        self.nodes[index].branch_length = branch_length;
    }

    pub fn root_index(&self) -> NodeIndex {
        self.root
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    /// Number of nodes reachable from the root.
    pub fn num_nodes(&self) -> usize {
        self.pre_order_iter().count()
    }

    /// Leaf indices, left to right.
    pub fn leaves(&self) -> Vec<NodeIndex> {
        self.pre_order_iter()
            .filter(|n| n.is_leaf())
            .map(Node::index)
            .collect()
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves().len()
    }

    /// Leaf labels, left to right; unlabelled leaves are skipped.
    pub fn leaf_labels(&self) -> Vec<&str> {
        self.pre_order_iter()
            .filter(|n| n.is_leaf())
            .filter_map(Node::label)
            .collect()
    }

    pub fn find_leaf(&self, label: &str) -> Option<NodeIndex> {
        self.pre_order_iter()
            .find(|n| n.is_leaf() && n.label() == Some(label))
            .map(Node::index)
    }

    /// Checks whether every internal node has exactly two children.
    ///
    /// The root may have three, which is how unrooted binary trees are written.
    pub fn is_bifurcating(&self) -> bool {
        self.pre_order_iter().all(|node| {
            let n = node.children.len();
            if node.index == self.root {
                n == 2 || n == 3
            } else {
                n == 0 || n == 2
            }
        })
    }
}

// ============================================================================
// Distances
// ============================================================================
impl Tree {
    /// Number of edges between the root and `index`.
    pub fn depth(&self, index: NodeIndex) -> usize {
        self.ancestors(index).count()
    }

    /// Sum of branch lengths from the root down to `index`.
    ///
    /// The root's own branch length is not part of the path.
    pub fn distance_from_root(&self, index: NodeIndex) -> f64 {
        let mut distance = 0.0;
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            distance += self.nodes[current].branch_length.unwrap_or(0.0);
            current = parent;
        }
        distance
    }

    /// Root-to-tip distance for every leaf, left to right.
    pub fn root_to_tip_distances(&self) -> Vec<f64> {
        self.leaves()
            .into_iter()
            .map(|leaf| self.distance_from_root(leaf))
            .collect()
    }

    /// Number of edges on the path between two nodes.
    pub fn topological_distance(&self, a: NodeIndex, b: NodeIndex) -> usize {
        let path_a: Vec<NodeIndex> = std::iter::once(a).chain(self.ancestors(a)).collect();
        let on_path_a: HashSet<NodeIndex> = path_a.iter().copied().collect();

        let mut steps_b = 0;
        let mut current = b;
        while !on_path_a.contains(&current) {
            match self.nodes[current].parent {
                Some(parent) => {
                    current = parent;
                    steps_b += 1;
                }
                None => break,
            }
        }
        let steps_a = path_a.iter().position(|&n| n == current).unwrap_or(0);
        steps_a + steps_b
    }

    fn ancestors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.nodes[index].parent, move |&n| self.nodes[n].parent)
    }
}

// ============================================================================
// Pruning
// ============================================================================
impl Tree {
    /// Returns a copy restricted to the leaves whose label is in `keep`.
    ///
    /// Internal nodes left with a single child are collapsed into that child,
    /// adding up branch lengths. If the root ends up with a single child, that
    /// child becomes the new root and loses its branch length.
    /// Returns `None` if no leaf is kept.
    pub fn pruned<S>(&self, keep: &HashSet<S>) -> Option<Tree>
    where
        S: std::hash::Hash + Eq + std::borrow::Borrow<str>,
    {
        let mut pruned = Tree::new();
        let root = pruned.root_index();
        self.copy_kept(self.root, keep, &mut pruned, root)?;
        Some(pruned.compacted())
    }

    /// Copies the subtree at `index` below `target` in `out`, keeping only
    /// wanted leaves. For the root, `target` is the output root itself.
    fn copy_kept<S>(
        &self,
        index: NodeIndex,
        keep: &HashSet<S>,
        out: &mut Tree,
        target: NodeIndex,
    ) -> Option<NodeIndex>
    where
        S: std::hash::Hash + Eq + std::borrow::Borrow<str>,
    {
        let node = &self.nodes[index];
        if node.is_leaf() {
            let wanted = node.label().is_some_and(|l| keep.contains(l));
            if !wanted {
                return None;
            }
            if index == self.root {
                out.nodes[target].label = node.label.clone();
                return Some(target);
            }
            return Some(out.add_child(target, node.label.clone(), node.branch_length));
        }

        let here = if index == self.root {
            target
        } else {
            out.add_child(target, node.label.clone(), node.branch_length)
        };
        let kept = node
            .children
            .iter()
            .filter_map(|&child| self.copy_kept(child, keep, out, here))
            .count();

        if kept == 0 {
            if here != target {
                out.detach(here);
            }
            return None;
        }
        Some(here)
    }

    fn detach(&mut self, index: NodeIndex) {
        if let Some(parent) = self.nodes[index].parent {
            self.nodes[parent].children.retain(|&c| c != index);
        }
        self.nodes[index].parent = None;
    }

    /// Rebuilds the arena from the root, collapsing unary nodes and dropping
    /// detached nodes.
    fn compacted(&self) -> Tree {
        let mut root = self.root;
        while self.nodes[root].children.len() == 1 {
            root = self.nodes[root].children[0];
        }

        let mut out = Tree::new();
        out.nodes[0].label = self.nodes[root].label.clone();
        let out_root = out.root;
        for &child in &self.nodes[root].children {
            self.copy_collapsed(child, 0.0, &mut out, out_root);
        }
        out
    }

    fn copy_collapsed(&self, index: NodeIndex, carried: f64, out: &mut Tree, parent: NodeIndex) {
        let node = &self.nodes[index];
        if node.children.len() == 1 {
            let carried = carried + node.branch_length.unwrap_or(0.0);
            self.copy_collapsed(node.children[0], carried, out, parent);
            return;
        }

        let branch_length = if carried > 0.0 {
            Some(node.branch_length.unwrap_or(0.0) + carried)
        } else {
            node.branch_length
        };
        let here = out.add_child(parent, node.label.clone(), branch_length);
        for &child in &node.children {
            self.copy_collapsed(child, 0.0, out, here);
        }
    }
}

// ============================================================================
// Newick
// ============================================================================
impl Tree {
    /// Parses a single Newick tree.
    pub fn from_newick(text: &str) -> DomainResult<Self> {
        let mut trees = newick::parse_trees(text)?;
        match trees.len() {
            1 => Ok(trees.remove(0)),
            0 => Err(DomainError::EmptyTree),
            n => Err(DomainError::NewickSyntax {
                position: text.len(),
                message: format!("expected a single tree, found {n}"),
            }),
        }
    }

    /// Newick representation with closing semicolon.
    pub fn to_newick(&self) -> String {
        newick::write_tree(self)
    }
}

// ============================================================================
// Iterators
// ============================================================================
impl Tree {
    /// Iterates over nodes reachable from the root, parents before children,
    /// children left to right.
    pub fn pre_order_iter(&self) -> PreOrderIter<'_> {
        PreOrderIter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Iterates over nodes reachable from the root, children before parents.
    pub fn post_order_iter(&self) -> PostOrderIter<'_> {
        PostOrderIter {
            tree: self,
            stack: vec![(self.root, false)],
        }
    }
}

/// Stack-based pre-order traversal.
pub struct PreOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeIndex>,
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let node = &self.tree.nodes[index];
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Stack-based post-order traversal.
pub struct PostOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeIndex, bool)>, // (index, children_visited)
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let node = &self.tree.nodes[index];
            if children_visited || node.is_leaf() {
                return Some(node);
            }
            self.stack.push((index, true));
            self.stack
                .extend(node.children.iter().rev().map(|&c| (c, false)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(newick: &str) -> Tree {
        Tree::from_newick(newick).unwrap()
    }

    fn keep(labels: &[&'static str]) -> HashSet<&'static str> {
        labels.iter().copied().collect()
    }

    #[test]
    fn test_leaves_in_order() {
        let t = tree("((A,B),(C,(D,E)));");
        assert_eq!(t.leaf_labels(), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(t.num_leaves(), 5);
    }

    #[test]
    fn test_is_bifurcating() {
        assert!(tree("((A,B),(C,D));").is_bifurcating());
        assert!(tree("(A,B,(C,D));").is_bifurcating());
        assert!(!tree("((A,B,C),(D,E));").is_bifurcating());
        assert!(!tree("(A,B,C,D);").is_bifurcating());
    }

    #[test]
    fn test_root_to_tip_distances() {
        let t = tree("((A:1,B:2):0.5,C:3);");
        assert_eq!(t.root_to_tip_distances(), vec![1.5, 2.5, 3.0]);
    }

    #[test]
    fn test_missing_branch_lengths_count_as_zero() {
        let t = tree("((A,B):1,C);");
        assert_eq!(t.root_to_tip_distances(), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_topological_distance() {
        let t = tree("((A,B),(C,(D,E)));");
        let a = t.find_leaf("A").unwrap();
        let b = t.find_leaf("B").unwrap();
        let e = t.find_leaf("E").unwrap();
        assert_eq!(t.topological_distance(a, b), 2);
        assert_eq!(t.topological_distance(a, e), 5);
        assert_eq!(t.topological_distance(e, e), 0);
        assert_eq!(t.depth(e), 3);
    }

    #[test]
    fn test_pruned_keeps_only_wanted_leaves() {
        let t = tree("((A,B),(C,(D,E)),((W,X),(Y,Z)));");
        let pruned = t.pruned(&keep(&["A", "B", "D", "E"])).unwrap();
        assert_eq!(pruned.leaf_labels(), vec!["A", "B", "D", "E"]);
        assert_eq!(pruned.to_newick(), "((A,B),(D,E));");
    }

    #[test]
    fn test_pruned_collapses_unary_nodes_and_sums_lengths() {
        let t = tree("((A:1,B:1):1,(C:1,D:2):3);");
        let pruned = t.pruned(&keep(&["A", "B", "D"])).unwrap();
        assert_eq!(pruned.to_newick(), "((A:1,B:1):1,D:5);");
    }

    #[test]
    fn test_pruned_moves_root_down() {
        let t = tree("((A:1,B:1):2,C:1);");
        let pruned = t.pruned(&keep(&["A", "B"])).unwrap();
        assert_eq!(pruned.to_newick(), "(A:1,B:1);");
    }

    #[test]
    fn test_pruned_to_nothing() {
        let t = tree("((A,B),C);");
        assert!(t.pruned(&keep(&["Q"])).is_none());
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let t = tree("((A,B)ab,C)root;");
        let labels: Vec<_> = t.post_order_iter().filter_map(Node::label).collect();
        assert_eq!(labels, vec!["A", "B", "ab", "C", "root"]);
    }
}
