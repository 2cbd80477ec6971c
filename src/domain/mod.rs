//! Domain layer for the phylogen pipeline
//!
//! Sequences, alignments, trees and configuration, plus the ports through
//! which external solvers are driven.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, SolverError};
