//! Domain errors for the phylogen pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Domain-level errors that can occur while handling sequences, alignments and trees.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Alignment is empty")]
    EmptyAlignment,

    #[error("Ragged alignment: taxon {taxon} has {found} columns, expected {expected}")]
    RaggedAlignment {
        taxon: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate taxon in alignment: {0}")]
    DuplicateTaxon(String),

    #[error("Newick syntax error at byte {position}: {message}")]
    NewickSyntax { position: usize, message: String },

    #[error("Tree has no leaves")]
    EmptyTree,

    #[error("FASTA error in {path}: {message}")]
    Fasta { path: PathBuf, message: String },

    #[error("No alignment files found for cluster {cluster} in {dir}")]
    NoAlignmentFiles { cluster: String, dir: PathBuf },

    #[error("Required external program not available: {0}")]
    MissingDependency(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of an external solver invocation.
///
/// Every variant is transient from the pipeline's point of view: callers
/// count it against their retry budget instead of aborting the run.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("{0} is not installed or not executable")]
    Unavailable(String),

    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} produced malformed output: {message}")]
    MalformedOutput { program: String, message: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}
