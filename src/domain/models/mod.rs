pub mod alignment;
pub mod config;
pub mod genetic_code;
pub mod newick;
pub mod sequence;
pub mod tree;

pub use alignment::{AlignedSequence, Alignment};
pub use config::{
    ConstraintMode, GeneConfig, LoggingConfig, PipelineConfig, SelectionPolicy, ToolsConfig,
};
pub use genetic_code::{GeneticCode, GenomeCompartment, StopCodons};
pub use sequence::Sequence;
pub use tree::{NodeIndex, Tree};
