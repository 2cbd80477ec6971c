//! Phylogeny generation: set up a search from the stored alignments, run
//! the tree search, validate the result and retry within a bounded budget.

use std::sync::Arc;

use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::alignment_store::AlignmentStore;
use super::constraint::{constraint_tree, select_outgroup};
use super::reading_frame::{find_orf, trim_to_frame};
use super::retry::{Attempt, RetryBudget, RetryOutcome};
use super::supermatrix::{concatenate, partition_text, partitions, Locus};
use crate::domain::errors::{DomainError, DomainResult, SolverError};
use crate::domain::models::{Alignment, ConstraintMode, PipelineConfig, Tree};
use crate::domain::ports::{SearchRequest, TreeSearcher};

/// Exclusive upper bound of the seeds handed to the tree search.
const MAX_SEARCH_SEED: u64 = 10_000_000;

/// Why one generation attempt produced no phylogeny.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("tree search failed: {0}")]
    Solver(#[from] SolverError),

    #[error("root-to-tip standard deviation {std:.4} is not below {threshold}")]
    Rejected { std: f64, threshold: f64 },

    #[error("could not load alignments: {0}")]
    Store(#[from] DomainError),
}

impl GenerationFailure {
    /// Store failures repeat on every attempt; the others may not.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Generator parameters
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Taxonomic reference tree for constraints
    pub reference: Option<Tree>,
    pub rttstat: f64,
    /// Attempts per phylogeny
    pub maxtrys: u32,
    pub threads: usize,
    pub constrained: bool,
    pub seed: u64,
}

impl GeneratorSettings {
    pub fn from_config(config: &PipelineConfig, reference: Option<Tree>, seed: u64) -> Self {
        Self {
            reference,
            rttstat: config.rttstat,
            maxtrys: config.maxtrys,
            threads: config.threads,
            constrained: config.constraint != ConstraintMode::Unconstrained,
            seed,
        }
    }
}

/// Produces validated phylogenies one at a time and keeps those accepted.
pub struct PhylogenyGenerator {
    store: AlignmentStore,
    searcher: Arc<dyn TreeSearcher>,
    reference: Option<Tree>,
    rttstat: f64,
    budget: RetryBudget,
    threads: usize,
    constrained: bool,
    rng: StdRng,
    phylogenies: Vec<Tree>,
}

impl PhylogenyGenerator {
    pub fn new(
        store: AlignmentStore,
        searcher: Arc<dyn TreeSearcher>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            store,
            searcher,
            reference: settings.reference,
            rttstat: settings.rttstat,
            budget: RetryBudget::new(settings.maxtrys),
            threads: settings.threads.max(1),
            constrained: settings.constrained,
            rng: StdRng::seed_from_u64(settings.seed),
            phylogenies: Vec::new(),
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    pub fn set_constrained(&mut self, constrained: bool) {
        self.constrained = constrained;
    }

    /// Accepted phylogenies, oldest first.
    pub fn phylogenies(&self) -> &[Tree] {
        &self.phylogenies
    }

    /// Forgets every accepted phylogeny.
    pub fn reset(&mut self) {
        self.phylogenies.clear();
    }

    /// Generates one phylogeny within the retry budget and keeps it on success.
    #[instrument(skip(self), fields(constrained = self.constrained, accepted = self.phylogenies.len()))]
    pub async fn run(&mut self) -> RetryOutcome<Tree, GenerationFailure> {
        let budget = self.budget;
        let outcome = budget
            .run(self, |generator, attempt| generator.attempt(attempt).boxed_local())
            .await;

        match &outcome {
            RetryOutcome::Success { value, attempts } => {
                self.phylogenies.push(value.clone());
                info!(
                    attempts,
                    total = self.phylogenies.len(),
                    taxa = value.num_leaves(),
                    "phylogeny accepted"
                );
            }
            RetryOutcome::ExhaustedRetries { attempts, last_error } => {
                warn!(
                    attempts,
                    last_error = last_error.as_ref().map(ToString::to_string),
                    "no acceptable phylogeny within budget"
                );
            }
            RetryOutcome::Aborted { error, .. } => {
                warn!(%error, "phylogeny generation aborted");
            }
        }
        outcome
    }

    async fn attempt(&mut self, attempt: u32) -> Attempt<Tree, GenerationFailure> {
        let request = match self.set_up() {
            Ok(request) => request,
            Err(error) => return Attempt::Abort(GenerationFailure::Store(error)),
        };
        debug!(
            attempt,
            taxa = request.alignment.len(),
            columns = request.alignment.alignment_length(),
            outgroup = request.outgroup.as_deref(),
            constraint = request.constraint.is_some(),
            "searching"
        );

        let tree = match self.searcher.search(request).await {
            Ok(tree) => tree,
            Err(error) => return Attempt::Retry(GenerationFailure::Solver(error)),
        };

        let std = rtt_standard_deviation(&tree);
        if std < self.rttstat {
            Attempt::Done(tree)
        } else {
            Attempt::Retry(GenerationFailure::Rejected {
                std,
                threshold: self.rttstat,
            })
        }
    }

    /// Builds the next search: pulls alignments, trims coding loci to their
    /// reading frame, concatenates, and derives constraint and outgroup.
    pub fn set_up(&mut self) -> DomainResult<SearchRequest> {
        let pulled = self.store.pull(&mut self.rng)?;

        let mut trimmed: Vec<(Alignment, bool)> = Vec::with_capacity(pulled.len());
        for cluster in &pulled {
            let frame = cluster
                .stops
                .as_ref()
                .and_then(|stops| find_orf(&cluster.alignment, stops));
            match frame {
                Some(frame) => trimmed.push((trim_to_frame(&cluster.alignment, frame), true)),
                None => {
                    if cluster.stops.is_some() {
                        debug!(cluster = %cluster.cluster, "no open reading frame, treated as non-coding");
                    }
                    trimmed.push((cluster.alignment.clone(), false));
                }
            }
        }

        let alignments: Vec<&Alignment> = trimmed.iter().map(|(a, _)| a).collect();
        let (alignment, ranges) = concatenate(&alignments)?;
        let loci: Vec<Locus<'_>> = pulled
            .iter()
            .zip(&trimmed)
            .zip(ranges)
            .map(|((cluster, (_, coding)), columns)| Locus {
                gene: &cluster.gene,
                cluster: &cluster.cluster,
                columns,
                coding: *coding,
            })
            .collect();
        let table = partitions(&loci);
        let partitions = (!table.is_empty()).then(|| partition_text(&table));

        let constraint = if self.constrained {
            self.reference
                .as_ref()
                .and_then(|reference| constraint_tree(reference, &alignment))
        } else {
            None
        };
        let outgroup = select_outgroup(&alignment, constraint.as_ref().map(|c| &c.tree));

        Ok(SearchRequest {
            alignment,
            partitions,
            constraint,
            outgroup,
            seed: self.rng.gen_range(0..MAX_SEARCH_SEED),
            threads: self.threads,
        })
    }
}

/// Population standard deviation of the root-to-tip distances.
pub fn rtt_standard_deviation(tree: &Tree) -> f64 {
    let distances = tree.root_to_tip_distances();
    if distances.is_empty() {
        return 0.0;
    }
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Whether `tree` is clock-like enough to keep.
pub fn passes_rtt(tree: &Tree, rttstat: f64) -> bool {
    rtt_standard_deviation(tree) < rttstat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SelectionPolicy;
    use crate::services::alignment_store::{ClusterSpec, Lineages};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns queued trees, then fails.
    struct ScriptedSearcher {
        trees: Mutex<Vec<Result<Tree, SolverError>>>,
        requests: Mutex<Vec<SearchRequest>>,
    }

    impl ScriptedSearcher {
        fn new(script: Vec<Result<&str, SolverError>>) -> Self {
            let mut trees: Vec<_> = script
                .into_iter()
                .map(|r| r.map(|nwk| Tree::from_newick(nwk).unwrap()))
                .collect();
            trees.reverse();
            Self {
                trees: Mutex::new(trees),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TreeSearcher for ScriptedSearcher {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn search(&self, request: SearchRequest) -> Result<Tree, SolverError> {
            self.requests.lock().unwrap().push(request);
            self.trees
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SolverError::Unavailable("script exhausted".into())))
        }
    }

    const CLOCKLIKE: &str = "((A:1,B:1):1,(C:1,outgroup:1):1);";
    const SKEWED: &str = "((A:1,B:9):1,(C:1,outgroup:1):1);";

    fn store(dir: &std::path::Path, clusters: &[(&str, &[(&str, &str)])]) -> AlignmentStore {
        let mut specs = Vec::new();
        for (name, rows) in clusters {
            let cluster_dir = dir.join(name);
            std::fs::create_dir_all(&cluster_dir).unwrap();
            let text: String = rows.iter().map(|(t, r)| format!(">{t}\n{r}\n")).collect();
            std::fs::write(cluster_dir.join("1.faa"), text).unwrap();
            specs.push(ClusterSpec {
                name: (*name).to_string(),
                coding: None,
            });
        }
        AlignmentStore::new(dir, specs, Lineages::new(), SelectionPolicy::Random)
    }

    fn settings(maxtrys: u32, reference: Option<&str>) -> GeneratorSettings {
        GeneratorSettings {
            reference: reference.map(|nwk| Tree::from_newick(nwk).unwrap()),
            rttstat: 0.5,
            maxtrys,
            threads: 2,
            constrained: true,
            seed: 7,
        }
    }

    const ROWS: &[(&str, &str)] = &[
        ("A", "ACGTACGT"),
        ("B", "ACGTACGA"),
        ("C", "ACGAACGT"),
        ("outgroup", "TCGTACGT"),
    ];

    #[tokio::test]
    async fn test_accepts_first_clocklike_tree() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = Arc::new(ScriptedSearcher::new(vec![Ok(CLOCKLIKE)]));
        let mut generator = PhylogenyGenerator::new(
            store(dir.path(), &[("gene1_cluster0", ROWS)]),
            searcher.clone(),
            settings(3, None),
        );

        let outcome = generator.run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(generator.phylogenies().len(), 1);

        let requests = searcher.requests.lock().unwrap();
        assert_eq!(requests[0].outgroup.as_deref(), Some("outgroup"));
        assert!(requests[0].partitions.is_none());
        assert_eq!(requests[0].threads, 2);
        assert!(requests[0].seed < MAX_SEARCH_SEED);
    }

    #[tokio::test]
    async fn test_retries_rejected_and_failed_searches() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = Arc::new(ScriptedSearcher::new(vec![
            Ok(SKEWED),
            Err(SolverError::Timeout {
                program: "raxml".into(),
                secs: 1,
            }),
            Ok(CLOCKLIKE),
        ]));
        let mut generator = PhylogenyGenerator::new(
            store(dir.path(), &[("gene1_cluster0", ROWS)]),
            searcher,
            settings(5, None),
        );

        let outcome = generator.run().await;
        assert_eq!(outcome.attempts(), 3);
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_exhausted_budget_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = Arc::new(ScriptedSearcher::new(vec![Ok(SKEWED), Ok(SKEWED), Ok(SKEWED)]));
        let mut generator = PhylogenyGenerator::new(
            store(dir.path(), &[("gene1_cluster0", ROWS)]),
            searcher,
            settings(2, None),
        );

        let outcome = generator.run().await;
        match outcome {
            RetryOutcome::ExhaustedRetries { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last_error, Some(GenerationFailure::Rejected { .. })));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(generator.phylogenies().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty_cluster0")).unwrap();
        let store = AlignmentStore::new(
            dir.path(),
            vec![ClusterSpec {
                name: "empty_cluster0".into(),
                coding: None,
            }],
            Lineages::new(),
            SelectionPolicy::Random,
        );
        let mut generator = PhylogenyGenerator::new(
            store,
            Arc::new(ScriptedSearcher::new(vec![])),
            settings(5, None),
        );
        let outcome = generator.run().await;
        assert!(matches!(
            outcome,
            RetryOutcome::Aborted {
                error: GenerationFailure::Store(_),
                attempts: 1
            }
        ));
    }

    #[test]
    fn test_set_up_concatenates_and_constrains() {
        let dir = tempfile::tempdir().unwrap();
        let other: &[(&str, &str)] = &[("A", "GGGG"), ("D", "GGGA"), ("E", "GGAA")];
        let mut generator = PhylogenyGenerator::new(
            store(dir.path(), &[("gene1_cluster0", ROWS), ("gene2_cluster0", other)]),
            Arc::new(ScriptedSearcher::new(vec![])),
            settings(1, Some("((((A,B),C),(D,E)),outgroup,(X,Y));")),
        );

        let request = generator.set_up().unwrap();
        assert_eq!(request.alignment.len(), 6);
        assert_eq!(request.alignment.alignment_length(), 12);
        assert_eq!(
            request.partitions.as_deref(),
            Some("DNA, gene1 = 1-8\nDNA, gene2 = 9-12\n")
        );
        let constraint = request.constraint.unwrap();
        assert_eq!(constraint.tree.num_leaves(), 6);
        assert_eq!(request.outgroup.as_deref(), Some("outgroup"));

        generator.set_constrained(false);
        assert!(generator.set_up().unwrap().constraint.is_none());
    }

    #[test]
    fn test_reset_clears_phylogenies() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = PhylogenyGenerator::new(
            store(dir.path(), &[("gene1_cluster0", ROWS)]),
            Arc::new(ScriptedSearcher::new(vec![])),
            settings(1, None),
        );
        generator.phylogenies.push(Tree::from_newick(CLOCKLIKE).unwrap());
        generator.reset();
        assert!(generator.phylogenies().is_empty());
    }

    #[test]
    fn test_rtt_threshold_is_strict() {
        let tree = Tree::from_newick("(A:1,B:3);").unwrap();
        assert!((rtt_standard_deviation(&tree) - 1.0).abs() < 1e-12);
        assert!(!passes_rtt(&tree, 1.0));
        assert!(passes_rtt(&tree, 1.0 + 1e-9));
        assert!(passes_rtt(&Tree::from_newick(CLOCKLIKE).unwrap(), 0.5));
    }
}
