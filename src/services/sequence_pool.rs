//! Candidate sequences of one gene cluster, with failure bookkeeping.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Sequence;
use crate::infrastructure::fasta;

/// File extensions read as FASTA from a cluster directory.
const FASTA_EXTENSIONS: &[&str] = &["fasta", "fa", "fas", "fna"];

/// In-memory catalog of per-taxon candidate sequences for one cluster.
///
/// Taxa keep the order in which they were first seen. A taxon whose failure
/// counter goes above `minfails` is excluded for the rest of the run; while
/// it is eligible its counter is at most `minfails`.
#[derive(Debug, Clone)]
pub struct SequencePool {
    order: Vec<String>,
    candidates: HashMap<String, Vec<Sequence>>,
    failures: HashMap<String, u32>,
    excluded: HashSet<String>,
    minfails: u32,
}

impl SequencePool {
    pub fn new(sequences: Vec<Sequence>, minfails: u32) -> Self {
        let mut order = Vec::new();
        let mut candidates: HashMap<String, Vec<Sequence>> = HashMap::new();
        for sequence in sequences.into_iter().filter(|s| !s.is_empty()) {
            if !candidates.contains_key(&sequence.taxon) {
                order.push(sequence.taxon.clone());
            }
            candidates
                .entry(sequence.taxon.clone())
                .or_default()
                .push(sequence);
        }
        Self {
            order,
            candidates,
            failures: HashMap::new(),
            excluded: HashSet::new(),
            minfails,
        }
    }

    /// Reads every FASTA file of a cluster's sequence directory, by file name.
    pub fn from_dir(dir: &Path, minfails: u32) -> DomainResult<Self> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| DomainError::io(dir, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| FASTA_EXTENSIONS.contains(&ext))
            })
            .collect();
        files.sort();

        let mut sequences = Vec::new();
        for file in &files {
            sequences.extend(fasta::read_sequences(file)?);
        }
        let pool = Self::new(sequences, minfails);
        info!(
            dir = %dir.display(),
            files = files.len(),
            taxa = pool.len(),
            "sequence pool loaded"
        );
        Ok(pool)
    }

    /// Number of taxa, excluded ones included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Taxa still available for sampling, in pool order.
    pub fn eligible(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|taxon| !self.excluded.contains(*taxon))
            .map(String::as_str)
            .collect()
    }

    pub fn num_eligible(&self) -> usize {
        self.order.len() - self.excluded.len()
    }

    pub fn is_eligible(&self, taxon: &str) -> bool {
        self.candidates.contains_key(taxon) && !self.excluded.contains(taxon)
    }

    pub fn candidates(&self, taxon: &str) -> &[Sequence] {
        self.candidates.get(taxon).map_or(&[], Vec::as_slice)
    }

    /// One candidate for `taxon`, drawn at random.
    pub fn pick<R: Rng + ?Sized>(&self, taxon: &str, rng: &mut R) -> Option<&Sequence> {
        self.candidates(taxon).choose(rng)
    }

    pub fn failures(&self, taxon: &str) -> u32 {
        self.failures.get(taxon).copied().unwrap_or(0)
    }

    /// Counts one disqualifying growth step against `taxon`.
    ///
    /// Returns `true` when this failure excluded the taxon.
    pub fn record_failure(&mut self, taxon: &str) -> bool {
        if !self.is_eligible(taxon) {
            return false;
        }
        let count = self.failures.entry(taxon.to_string()).or_insert(0);
        *count += 1;
        if *count > self.minfails {
            self.excluded.insert(taxon.to_string());
            debug!(taxon, failures = *count, "taxon excluded from pool");
            true
        } else {
            false
        }
    }
}
