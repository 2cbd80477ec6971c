//! Common test utilities for integration tests
//!
//! Provides shared fixtures, fake solvers, and helpers used across
//! multiple integration test files.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use phylogen::domain::ports::tree_searcher::SearchRequest;
use phylogen::infrastructure::fasta;
use phylogen::{
    AlignedSequence, Aligner, Alignment, Sequence, SolverError, Tree, TreeSearcher,
};

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Random nucleotide string of `len` residues.
pub fn random_dna(rng: &mut StdRng, len: usize) -> String {
    const BASES: &[u8] = b"ACGT";
    (0..len)
        .map(|_| BASES[rng.gen_range(0..BASES.len())] as char)
        .collect()
}

/// Writes `taxa` random sequences of `len` residues into
/// `<root>/<cluster>/sequences.fasta`.
pub fn write_cluster(root: &Path, cluster: &str, taxa: usize, len: usize, seed: u64) {
    let dir = root.join(cluster);
    std::fs::create_dir_all(&dir).expect("Failed to create cluster dir");
    let mut rng = StdRng::seed_from_u64(seed);
    let sequences: Vec<Sequence> = (0..taxa)
        .map(|i| Sequence::new(format!("taxon{i}"), random_dna(&mut rng, len)))
        .collect();
    fasta::write_sequences(&dir.join("sequences.fasta"), &sequences)
        .expect("Failed to write cluster sequences");
}

/// Writes one ready-made alignment file into `<root>/<cluster>/<file>`.
pub fn write_alignment(root: &Path, cluster: &str, file: &str, rows: &[(&str, &str)]) {
    let dir = root.join(cluster);
    std::fs::create_dir_all(&dir).expect("Failed to create cluster dir");
    let alignment = Alignment::new(
        rows.iter()
            .map(|(taxon, residues)| AlignedSequence::new(*taxon, *residues))
            .collect(),
    )
    .expect("Fixture alignment must be valid");
    fasta::write_alignment(&dir.join(file), &alignment).expect("Failed to write alignment");
}

/// Aligner that pads every row on the right to the longest one.
#[derive(Default)]
pub struct PadAligner {
    pub available: bool,
}

impl PadAligner {
    pub fn new() -> Self {
        Self { available: true }
    }
}

fn pad(rows: Vec<(String, String)>) -> Result<Alignment, SolverError> {
    let width = rows.iter().map(|(_, r)| r.len()).max().unwrap_or(0);
    Ok(Alignment::new(
        rows.into_iter()
            .map(|(t, r)| AlignedSequence::new(t, format!("{r:-<width$}")))
            .collect(),
    )?)
}

#[async_trait]
impl Aligner for PadAligner {
    fn name(&self) -> &'static str {
        "pad"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn align(&self, sequences: &[Sequence]) -> Result<Alignment, SolverError> {
        pad(sequences
            .iter()
            .map(|s| (s.taxon.clone(), s.residues.clone()))
            .collect())
    }

    async fn add(
        &self,
        existing: &Alignment,
        sequences: &[Sequence],
    ) -> Result<Alignment, SolverError> {
        pad(existing
            .iter()
            .map(|r| (r.taxon.clone(), r.residues.clone()))
            .chain(sequences.iter().map(|s| (s.taxon.clone(), s.residues.clone())))
            .collect())
    }
}

/// Padding aligner that refuses every seed alignment after the first `seeds`.
pub struct ExhaustingAligner {
    inner: PadAligner,
    seeds: usize,
    calls: AtomicUsize,
}

impl ExhaustingAligner {
    pub fn new(seeds: usize) -> Self {
        Self {
            inner: PadAligner::new(),
            seeds,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Aligner for ExhaustingAligner {
    fn name(&self) -> &'static str {
        "exhausting"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn align(&self, sequences: &[Sequence]) -> Result<Alignment, SolverError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.seeds {
            return Err(SolverError::Unavailable("exhausting".to_string()));
        }
        self.inner.align(sequences).await
    }

    async fn add(
        &self,
        existing: &Alignment,
        sequences: &[Sequence],
    ) -> Result<Alignment, SolverError> {
        self.inner.add(existing, sequences).await
    }
}

/// Tree searcher that returns a star tree over the requested taxa.
///
/// Leaf `i` gets branch length `1 + skew * i`, so `skew = 0.0` yields a
/// perfectly clock-like tree. Every request is recorded.
pub struct StarSearcher {
    pub skew: f64,
    pub requests: Mutex<Vec<SearchRequest>>,
    calls: AtomicUsize,
}

impl StarSearcher {
    pub fn clocklike() -> Self {
        Self::skewed(0.0)
    }

    pub fn skewed(skew: f64) -> Self {
        Self {
            skew,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl TreeSearcher for StarSearcher {
    fn name(&self) -> &'static str {
        "star"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, request: SearchRequest) -> Result<Tree, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut tree = Tree::new();
        let root = tree.root_index();
        for (i, taxon) in request.alignment.taxa().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let length = self.skew.mul_add(i as f64, 1.0);
            tree.add_child(root, Some(taxon.to_string()), Some(length));
        }
        self.requests.lock().expect("poisoned").push(request);
        Ok(tree)
    }
}
