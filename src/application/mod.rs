pub mod alignment_stage;
pub mod context;
pub mod phylogeny_stage;

pub use alignment_stage::{AlignmentStage, AlignmentStageReport, ClusterReport};
pub use context::{RunContext, ToolAvailability, ToolStatus};
pub use phylogeny_stage::{
    load_lineages, load_reference, write_consensus, ConsensusReport, PassReport, PhylogenyInputs,
    PhylogenyStage, PhylogenyStageReport,
};
