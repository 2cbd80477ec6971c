//! Access to the alignments produced by the alignment stage.
//!
//! The store knows one directory per gene cluster. Every pull picks one
//! stored alignment per cluster according to the [`SelectionPolicy`] and,
//! for protein-coding clusters, the stop codons shared by its taxa.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::stop_codons::StopCodonRetriever;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::gene_name;
use crate::domain::models::{Alignment, GenomeCompartment, PipelineConfig, SelectionPolicy, StopCodons};
use crate::infrastructure::fasta;

/// File extensions recognised as stored alignments.
const ALIGNMENT_EXTENSIONS: &[&str] = &["faa", "fasta", "fa"];

/// Taxonomy ids from the root down to each taxon, keyed by taxon.
pub type Lineages = HashMap<String, Vec<u32>>;

/// A gene cluster known to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Directory name, e.g. `rbcl_cluster0`
    pub name: String,
    /// Compartment of a protein-coding gene, `None` for non-coding loci
    pub coding: Option<GenomeCompartment>,
}

/// The alignment chosen for one cluster in one pull.
#[derive(Debug, Clone)]
pub struct ClusterAlignment {
    pub cluster: String,
    /// Gene name used for partitions
    pub gene: String,
    pub path: PathBuf,
    pub alignment: Alignment,
    /// Stop codons for frame detection; `None` skips it
    pub stops: Option<StopCodons>,
}

pub struct AlignmentStore {
    input_dir: PathBuf,
    clusters: Vec<ClusterSpec>,
    lineages: Lineages,
    policy: SelectionPolicy,
    retriever: StopCodonRetriever,
}

impl AlignmentStore {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        clusters: Vec<ClusterSpec>,
        lineages: Lineages,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            clusters,
            lineages,
            policy,
            retriever: StopCodonRetriever::new(),
        }
    }

    /// Every non-hidden subdirectory of `input_dir` is a cluster, sorted by name.
    pub fn discover(
        input_dir: &Path,
        config: &PipelineConfig,
        lineages: Lineages,
    ) -> DomainResult<Self> {
        let mut names: Vec<String> = std::fs::read_dir(input_dir)
            .map_err(|e| DomainError::io(input_dir, e))?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        let clusters = names
            .into_iter()
            .map(|name| {
                let coding = config.gene_for_cluster(&name).coding;
                ClusterSpec { name, coding }
            })
            .collect::<Vec<_>>();
        info!(dir = %input_dir.display(), clusters = clusters.len(), "alignment store opened");
        Ok(Self::new(input_dir, clusters, lineages, config.selection))
    }

    pub fn clusters(&self) -> &[ClusterSpec] {
        &self.clusters
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// One alignment per cluster, in cluster order.
    pub fn pull<R: Rng + ?Sized>(&self, rng: &mut R) -> DomainResult<Vec<ClusterAlignment>> {
        self.clusters
            .iter()
            .map(|cluster| self.pull_cluster(cluster, rng))
            .collect()
    }

    fn pull_cluster<R: Rng + ?Sized>(
        &self,
        cluster: &ClusterSpec,
        rng: &mut R,
    ) -> DomainResult<ClusterAlignment> {
        let dir = self.input_dir.join(&cluster.name);
        let files = alignment_files(&dir)?;
        if files.is_empty() {
            return Err(DomainError::NoAlignmentFiles {
                cluster: cluster.name.clone(),
                dir,
            });
        }

        let (path, alignment) = self.select(&files, rng)?;
        let stops = cluster
            .coding
            .and_then(|compartment| self.stop_codons(compartment, &alignment));
        debug!(
            cluster = %cluster.name,
            file = %path.display(),
            coding = stops.is_some(),
            "alignment selected"
        );
        Ok(ClusterAlignment {
            cluster: cluster.name.clone(),
            gene: gene_name(&cluster.name).to_string(),
            path,
            alignment,
            stops,
        })
    }

    /// Applies the selection policy to a non-empty, name-sorted file list.
    fn select<R: Rng + ?Sized>(
        &self,
        files: &[PathBuf],
        rng: &mut R,
    ) -> DomainResult<(PathBuf, Alignment)> {
        let chosen = match self.policy {
            SelectionPolicy::Random => files.choose(rng),
            SelectionPolicy::Latest => {
                let mut best: Option<(&PathBuf, SystemTime)> = None;
                for file in files {
                    let modified = std::fs::metadata(file)
                        .and_then(|m| m.modified())
                        .map_err(|e| DomainError::io(file, e))?;
                    if best.is_none_or(|(_, t)| modified > t) {
                        best = Some((file, modified));
                    }
                }
                best.map(|(file, _)| file)
            }
            SelectionPolicy::Longest | SelectionPolicy::MostSpecies => {
                let mut best: Option<(PathBuf, Alignment, usize)> = None;
                for file in files {
                    let alignment = fasta::read_alignment(file)?;
                    let score = if self.policy == SelectionPolicy::Longest {
                        alignment.alignment_length()
                    } else {
                        alignment.len()
                    };
                    if best.as_ref().is_none_or(|(_, _, s)| score > *s) {
                        best = Some((file.clone(), alignment, score));
                    }
                }
                return best
                    .map(|(path, alignment, _)| (path, alignment))
                    .ok_or(DomainError::EmptyAlignment);
            }
        };
        let path = chosen.ok_or(DomainError::EmptyAlignment)?.clone();
        let alignment = fasta::read_alignment(&path)?;
        Ok((path, alignment))
    }

    fn stop_codons(&self, compartment: GenomeCompartment, alignment: &Alignment) -> Option<StopCodons> {
        let lineages = alignment
            .taxa()
            .map(|taxon| self.lineages.get(taxon).map_or(&[][..], Vec::as_slice));
        self.retriever.retrieve(compartment, lineages)
    }
}

/// Stored alignment files of a cluster directory, sorted by file name.
fn alignment_files(dir: &Path) -> DomainResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| DomainError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ALIGNMENT_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn write(dir: &Path, cluster: &str, file: &str, rows: &[(&str, &str)]) {
        let cluster_dir = dir.join(cluster);
        std::fs::create_dir_all(&cluster_dir).unwrap();
        let text: String = rows
            .iter()
            .map(|(t, r)| format!(">{t}\n{r}\n"))
            .collect();
        std::fs::write(cluster_dir.join(file), text).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "COI_cluster0", "1_nspp2_len6.faa", &[("A", "ATGAAA"), ("B", "ATGAAG")]);
        write(
            dir.path(),
            "COI_cluster0",
            "2_nspp3_len3.faa",
            &[("A", "ATG"), ("B", "ATG"), ("C", "ATG")],
        );
        write(dir.path(), "ssu_cluster0", "1_nspp2_len4.faa", &[("A", "ACGT"), ("C", "ACGA")]);
        std::fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        dir
    }

    fn config(selection: SelectionPolicy) -> PipelineConfig {
        let mut config = PipelineConfig {
            selection,
            ..PipelineConfig::default()
        };
        config.genes.insert(
            "COI".to_string(),
            crate::domain::models::GeneConfig {
                coding: Some(GenomeCompartment::Mitochondrial),
                ..Default::default()
            },
        );
        config
    }

    fn lineages() -> Lineages {
        ["A", "B", "C"]
            .iter()
            .map(|t| (t.to_string(), vec![2759, 33208, 7742]))
            .collect()
    }

    #[test]
    fn test_discover_sorts_clusters_and_skips_hidden() {
        let dir = fixture();
        let store =
            AlignmentStore::discover(dir.path(), &config(SelectionPolicy::Random), lineages())
                .unwrap();
        let names: Vec<_> = store.clusters().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["COI_cluster0", "ssu_cluster0"]);
        assert_eq!(store.clusters()[0].coding, Some(GenomeCompartment::Mitochondrial));
        assert_eq!(store.clusters()[1].coding, None);
    }

    #[test]
    fn test_longest_and_most_species() {
        let dir = fixture();
        let mut rng = StdRng::seed_from_u64(0);

        let store =
            AlignmentStore::discover(dir.path(), &config(SelectionPolicy::Longest), lineages())
                .unwrap();
        let pulled = store.pull(&mut rng).unwrap();
        assert_eq!(pulled[0].alignment.alignment_length(), 6);
        assert_eq!(pulled[0].gene, "COI");

        let store = AlignmentStore::discover(
            dir.path(),
            &config(SelectionPolicy::MostSpecies),
            lineages(),
        )
        .unwrap();
        let pulled = store.pull(&mut rng).unwrap();
        assert_eq!(pulled[0].alignment.len(), 3);
    }

    #[test]
    fn test_random_selection_is_reproducible() {
        let dir = fixture();
        let store =
            AlignmentStore::discover(dir.path(), &config(SelectionPolicy::Random), lineages())
                .unwrap();
        let first = store.pull(&mut StdRng::seed_from_u64(11)).unwrap();
        let second = store.pull(&mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(first[0].path, second[0].path);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_stop_codons_only_for_coding_clusters() {
        let dir = fixture();
        let store =
            AlignmentStore::discover(dir.path(), &config(SelectionPolicy::Longest), lineages())
                .unwrap();
        let pulled = store.pull(&mut StdRng::seed_from_u64(0)).unwrap();
        let stops = pulled[0].stops.as_ref().unwrap();
        assert_eq!(stops.forward().as_str(), "(taa|tag|aga|agg)");
        assert!(pulled[1].stops.is_none());
    }

    #[test]
    fn test_unknown_lineage_disables_mitochondrial_stops() {
        let dir = fixture();
        let store = AlignmentStore::discover(
            dir.path(),
            &config(SelectionPolicy::Longest),
            Lineages::new(),
        )
        .unwrap();
        let pulled = store.pull(&mut StdRng::seed_from_u64(0)).unwrap();
        assert!(pulled[0].stops.is_none());
    }

    #[test]
    fn test_empty_cluster_is_an_error() {
        let dir = fixture();
        std::fs::create_dir_all(dir.path().join("empty_cluster0")).unwrap();
        let store =
            AlignmentStore::discover(dir.path(), &config(SelectionPolicy::Random), lineages())
                .unwrap();
        let err = store.pull(&mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, DomainError::NoAlignmentFiles { ref cluster, .. } if cluster == "empty_cluster0"));
    }
}
