use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::genetic_code::GenomeCompartment;

/// Run-wide configuration for the alignment and phylogeny stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Alignments to produce per gene cluster
    #[serde(default = "default_naligns")]
    pub naligns: usize,

    /// Accepted phylogenies per distribution
    #[serde(default = "default_nphylos")]
    pub nphylos: usize,

    /// Consecutive failed generation attempts tolerated per phylogeny
    #[serde(default = "default_maxtrys")]
    pub maxtrys: u32,

    /// Upper bound (exclusive) on the standard deviation of root-to-tip distances
    #[serde(default = "default_rttstat")]
    pub rttstat: f64,

    #[serde(default)]
    pub constraint: ConstraintMode,

    /// Fewest species an accepted alignment may hold
    #[serde(default = "default_min_species")]
    pub min_species: usize,

    /// How the phylogeny stage picks one stored alignment per cluster
    #[serde(default)]
    pub selection: SelectionPolicy,

    /// Thread-count hint passed to the external solvers
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Seed for every random choice; drawn from entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default = "default_alignment_timeout_secs")]
    pub alignment_timeout_secs: u64,

    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Parameters for clusters without an entry in `genes`
    #[serde(default)]
    pub default_gene: GeneConfig,

    /// Per-gene parameters keyed by gene name
    #[serde(default)]
    pub genes: HashMap<String, GeneConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_naligns() -> usize {
    10
}

const fn default_nphylos() -> usize {
    100
}

const fn default_maxtrys() -> u32 {
    10
}

const fn default_rttstat() -> f64 {
    0.5
}

const fn default_min_species() -> usize {
    5
}

const fn default_threads() -> usize {
    1
}

const fn default_alignment_timeout_secs() -> u64 {
    600
}

const fn default_search_timeout_secs() -> u64 {
    3600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            naligns: default_naligns(),
            nphylos: default_nphylos(),
            maxtrys: default_maxtrys(),
            rttstat: default_rttstat(),
            constraint: ConstraintMode::default(),
            min_species: default_min_species(),
            selection: SelectionPolicy::default(),
            threads: default_threads(),
            seed: None,
            alignment_timeout_secs: default_alignment_timeout_secs(),
            search_timeout_secs: default_search_timeout_secs(),
            tools: ToolsConfig::default(),
            default_gene: GeneConfig::default(),
            genes: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parameters for a cluster directory named `<gene>_cluster<k>`.
    pub fn gene_for_cluster(&self, cluster: &str) -> &GeneConfig {
        self.genes
            .get(gene_name(cluster))
            .unwrap_or(&self.default_gene)
    }
}

/// Gene name of a cluster: `gene1_cluster0` → `gene1`.
pub fn gene_name(cluster: &str) -> &str {
    match cluster.rfind("_cluster") {
        Some(pos) if cluster[pos + "_cluster".len()..].bytes().all(|b| b.is_ascii_digit()) => {
            &cluster[..pos]
        }
        _ => cluster,
    }
}

/// Alignment parameters for one gene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneConfig {
    /// Largest gap fraction allowed in any row, in [0, 1]
    #[serde(default = "default_mingaps")]
    pub mingaps: f64,

    /// Fewest columns a new sequence must share with the alignment
    #[serde(default = "default_minoverlap")]
    pub minoverlap: usize,

    /// Failures after which a taxon leaves the pool
    #[serde(default = "default_minfails")]
    pub minfails: u32,

    /// Build attempts per requested alignment
    #[serde(default = "default_gene_maxtrys")]
    pub maxtrys: u32,

    #[serde(default = "default_minseedsize")]
    pub minseedsize: usize,

    #[serde(default = "default_maxseedsize")]
    pub maxseedsize: usize,

    #[serde(default = "default_maxseedtrys")]
    pub maxseedtrys: u32,

    /// Genome compartment of a protein-coding gene; absent for non-coding loci
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding: Option<GenomeCompartment>,

    /// Taxon that must survive alignment growth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgroup: Option<String>,
}

const fn default_mingaps() -> f64 {
    0.5
}

const fn default_minoverlap() -> usize {
    200
}

const fn default_minfails() -> u32 {
    10
}

const fn default_gene_maxtrys() -> u32 {
    10
}

const fn default_minseedsize() -> usize {
    5
}

const fn default_maxseedsize() -> usize {
    20
}

const fn default_maxseedtrys() -> u32 {
    10
}

impl Default for GeneConfig {
    fn default() -> Self {
        Self {
            mingaps: default_mingaps(),
            minoverlap: default_minoverlap(),
            minfails: default_minfails(),
            maxtrys: default_gene_maxtrys(),
            minseedsize: default_minseedsize(),
            maxseedsize: default_maxseedsize(),
            maxseedtrys: default_maxseedtrys(),
            coding: None,
            outgroup: None,
        }
    }
}

/// Use of the taxonomic constraint during tree search.
///
/// Serialized as the integers 0, 1 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ConstraintMode {
    /// Every search is constrained
    #[default]
    Constrained,
    /// No search is constrained
    Unconstrained,
    /// A constrained distribution, then a separate unconstrained one
    ConstrainedThenUnconstrained,
}

impl TryFrom<u8> for ConstraintMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Constrained),
            1 => Ok(Self::Unconstrained),
            3 => Ok(Self::ConstrainedThenUnconstrained),
            other => Err(format!("invalid constraint mode {other}, expected 0, 1 or 3")),
        }
    }
}

impl From<ConstraintMode> for u8 {
    fn from(mode: ConstraintMode) -> Self {
        match mode {
            ConstraintMode::Constrained => 0,
            ConstraintMode::Unconstrained => 1,
            ConstraintMode::ConstrainedThenUnconstrained => 3,
        }
    }
}

/// Which stored alignment represents a cluster in the phylogeny stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Uniformly at random, from the run's seeded generator
    #[default]
    Random,
    /// Most alignment columns
    Longest,
    /// Most taxa
    MostSpecies,
    /// Most recently modified file
    Latest,
}

/// External tool executables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    #[serde(default = "default_mafft")]
    pub mafft: String,

    #[serde(default = "default_raxml")]
    pub raxml: String,
}

fn default_mafft() -> String {
    "mafft".to_string()
}

fn default_raxml() -> String {
    "raxml".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mafft: default_mafft(),
            raxml: default_raxml(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for the rolling log file; stdout only when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_name_strips_cluster_suffix() {
        assert_eq!(gene_name("gene1_cluster0"), "gene1");
        assert_eq!(gene_name("rbcl_cluster12"), "rbcl");
        assert_eq!(gene_name("COI"), "COI");
        assert_eq!(gene_name("odd_clusterx"), "odd_clusterx");
    }

    #[test]
    fn test_gene_for_cluster_falls_back_to_default() {
        let mut config = PipelineConfig::default();
        config.genes.insert(
            "rbcl".to_string(),
            GeneConfig {
                minoverlap: 50,
                ..GeneConfig::default()
            },
        );
        assert_eq!(config.gene_for_cluster("rbcl_cluster1").minoverlap, 50);
        assert_eq!(config.gene_for_cluster("COI_cluster0").minoverlap, 200);
    }

    #[test]
    fn test_constraint_mode_integers() {
        let mode: ConstraintMode = serde_yaml::from_str("3").unwrap();
        assert_eq!(mode, ConstraintMode::ConstrainedThenUnconstrained);
        assert_eq!(serde_yaml::to_string(&ConstraintMode::Unconstrained).unwrap().trim(), "1");
        assert!(serde_yaml::from_str::<ConstraintMode>("2").is_err());
    }

    #[test]
    fn test_gene_config_yaml() {
        let yaml = "
mingaps: 0.1
minoverlap: 30
coding: mitochondrial
outgroup: Gallus_gallus
";
        let gene: GeneConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((gene.mingaps - 0.1).abs() < f64::EPSILON);
        assert_eq!(gene.minoverlap, 30);
        assert_eq!(gene.coding, Some(GenomeCompartment::Mitochondrial));
        assert_eq!(gene.outgroup.as_deref(), Some("Gallus_gallus"));
        assert_eq!(gene.maxseedtrys, 10);
    }
}
