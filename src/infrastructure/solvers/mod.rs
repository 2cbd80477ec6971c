//! External solver adapters
//!
//! - `process`: subprocess execution with a wall-clock timeout
//! - `mafft`: the [`Aligner`](crate::domain::ports::Aligner) port
//! - `raxml`: the [`TreeSearcher`](crate::domain::ports::TreeSearcher) port

pub mod mafft;
pub mod process;
pub mod raxml;

pub use mafft::{MafftAligner, MafftConfig};
pub use process::{ProcessOutput, ProcessRunner};
pub use raxml::{RaxmlConfig, RaxmlSearcher};
