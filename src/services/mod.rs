pub mod alignment_builder;
pub mod alignment_store;
pub mod consensus;
pub mod constraint;
pub mod phylogeny_generator;
pub mod reading_frame;
pub mod retry;
pub mod sequence_pool;
pub mod stop_codons;
pub mod supermatrix;

pub use alignment_builder::{AlignmentBuilder, BuildFailure, BuildParams};
pub use alignment_store::{AlignmentStore, ClusterAlignment, ClusterSpec, Lineages};
pub use consensus::consensus;
pub use constraint::{constraint_tree, select_outgroup, OUTGROUP_SENTINEL};
pub use phylogeny_generator::{
    passes_rtt, rtt_standard_deviation, GenerationFailure, GeneratorSettings, PhylogenyGenerator,
};
pub use reading_frame::{find_orf, trim_to_frame, ReadingFrame, Strand};
pub use retry::{Attempt, RetryBudget, RetryOutcome};
pub use sequence_pool::SequencePool;
pub use stop_codons::{CodeRule, StopCodonRetriever};
pub use supermatrix::{concatenate, partition_text, partitions, Locus, Partition};
