//! Iterative alignment growth from a [`SequencePool`].
//!
//! A build seeds a small alignment from a random subset of the pool, then
//! offers every other eligible taxon to the aligner one sequence at a time,
//! keeping the grown alignment only when it still meets the gap and overlap
//! thresholds. Each admission is decided on its own; a rejected taxon gets a
//! failure counted against it and is skipped for the rest of this build.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::sequence_pool::SequencePool;
use crate::domain::models::{Alignment, GeneConfig, Sequence};
use crate::domain::ports::Aligner;

/// Quality and sufficiency thresholds for one build
#[derive(Debug, Clone)]
pub struct BuildParams {
    /// Largest gap fraction allowed in any row
    pub mingaps: f64,
    /// Fewest columns a sequence must share with the rest of the alignment
    pub minoverlap: usize,
    pub minseedsize: usize,
    pub maxseedsize: usize,
    pub maxseedtrys: u32,
    /// Fewest species a finished alignment may hold
    pub min_species: usize,
    /// Taxon that must be part of every finished alignment
    pub outgroup: Option<String>,
}

impl BuildParams {
    pub fn from_config(gene: &GeneConfig, min_species: usize) -> Self {
        Self {
            mingaps: gene.mingaps,
            minoverlap: gene.minoverlap,
            minseedsize: gene.minseedsize,
            maxseedsize: gene.maxseedsize,
            maxseedtrys: gene.maxseedtrys,
            min_species,
            outgroup: gene.outgroup.clone(),
        }
    }
}

/// Why a build produced no alignment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFailure {
    #[error("no acceptable seed alignment after {attempts} attempts")]
    Unseedable { attempts: u32 },

    #[error("outgroup {0} is missing from the alignment")]
    OutgroupDropped(String),

    #[error("only {found} species available, {required} required")]
    InsufficientTaxa { found: usize, required: usize },
}

impl BuildFailure {
    /// Whether further builds for the same cluster are pointless.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unseedable { .. })
    }
}

pub struct AlignmentBuilder {
    aligner: Arc<dyn Aligner>,
    params: BuildParams,
}

impl AlignmentBuilder {
    pub fn new(aligner: Arc<dyn Aligner>, params: BuildParams) -> Self {
        Self { aligner, params }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    /// Build one alignment, updating the pool's failure counters.
    #[instrument(skip_all, fields(eligible = pool.num_eligible()))]
    pub async fn build<R: Rng>(
        &self,
        pool: &mut SequencePool,
        rng: &mut R,
    ) -> Result<Alignment, BuildFailure> {
        let eligible = pool.num_eligible();
        if eligible < self.params.min_species {
            return Err(BuildFailure::InsufficientTaxa {
                found: eligible,
                required: self.params.min_species,
            });
        }
        if let Some(outgroup) = &self.params.outgroup {
            if !pool.is_eligible(outgroup) {
                return Err(BuildFailure::OutgroupDropped(outgroup.clone()));
            }
        }

        let (mut alignment, seeded) = self.seed(pool, rng).await?;
        debug!(seed = seeded.len(), columns = alignment.alignment_length(), "seeded");

        let remaining: Vec<String> = pool
            .eligible()
            .into_iter()
            .filter(|taxon| !seeded.contains(*taxon))
            .map(str::to_string)
            .collect();
        for taxon in remaining {
            let Some(candidate) = pool.pick(&taxon, rng).cloned() else {
                continue;
            };
            match self
                .aligner
                .add(&alignment, std::slice::from_ref(&candidate))
                .await
            {
                Ok(grown) if self.admits(&grown, &taxon) => alignment = grown,
                Ok(_) => {
                    let excluded = pool.record_failure(&taxon);
                    debug!(%taxon, failures = pool.failures(&taxon), excluded, "sequence rejected");
                }
                Err(e) => {
                    let excluded = pool.record_failure(&taxon);
                    warn!(%taxon, error = %e, excluded, "aligner failed while adding sequence");
                }
            }
        }

        self.check_sufficiency(&alignment)?;
        info!(
            species = alignment.len(),
            columns = alignment.alignment_length(),
            "alignment built"
        );
        Ok(alignment)
    }

    /// Align a random subset of the pool until the result passes the checks.
    async fn seed<R: Rng>(
        &self,
        pool: &SequencePool,
        rng: &mut R,
    ) -> Result<(Alignment, HashSet<String>), BuildFailure> {
        for attempt in 1..=self.params.maxseedtrys {
            let sequences = self.draw_seed(pool, rng);
            match self.aligner.align(&sequences).await {
                Ok(alignment) if self.seed_acceptable(&alignment) => {
                    let taxa = alignment.taxa().map(str::to_string).collect();
                    return Ok((alignment, taxa));
                }
                Ok(alignment) => debug!(
                    attempt,
                    max_gap_fraction = alignment.max_gap_fraction(),
                    "seed rejected"
                ),
                Err(e) => warn!(attempt, error = %e, "aligner failed on seed"),
            }
        }
        Err(BuildFailure::Unseedable {
            attempts: self.params.maxseedtrys,
        })
    }

    /// One candidate each for a random subset of eligible taxa.
    ///
    /// The required outgroup, when eligible, is always part of the subset.
    fn draw_seed<R: Rng>(&self, pool: &SequencePool, rng: &mut R) -> Vec<Sequence> {
        let eligible = pool.eligible();
        let upper = self.params.maxseedsize.min(eligible.len());
        let lower = self.params.minseedsize.min(upper);
        let size = rng.gen_range(lower..=upper);

        let outgroup = self
            .params
            .outgroup
            .as_deref()
            .filter(|o| pool.is_eligible(o));
        let others: Vec<&str> = eligible
            .iter()
            .copied()
            .filter(|taxon| Some(*taxon) != outgroup)
            .collect();

        let mut chosen: Vec<&str> = outgroup.into_iter().collect();
        let wanted = size.saturating_sub(chosen.len());
        chosen.extend(others.choose_multiple(rng, wanted).copied());

        chosen
            .into_iter()
            .filter_map(|taxon| pool.pick(taxon, rng).cloned())
            .collect()
    }

    fn seed_acceptable(&self, alignment: &Alignment) -> bool {
        alignment.max_gap_fraction() <= self.params.mingaps
            && alignment.alignment_length() >= self.params.minoverlap
            && alignment
                .taxa()
                .all(|taxon| self.overlap_ok(alignment, taxon))
    }

    fn admits(&self, grown: &Alignment, taxon: &str) -> bool {
        grown.max_gap_fraction() <= self.params.mingaps && self.overlap_ok(grown, taxon)
    }

    fn overlap_ok(&self, alignment: &Alignment, taxon: &str) -> bool {
        alignment
            .overlap(taxon)
            .is_some_and(|overlap| overlap >= self.params.minoverlap)
    }

    fn check_sufficiency(&self, alignment: &Alignment) -> Result<(), BuildFailure> {
        if alignment.len() < self.params.min_species {
            return Err(BuildFailure::InsufficientTaxa {
                found: alignment.len(),
                required: self.params.min_species,
            });
        }
        if let Some(outgroup) = &self.params.outgroup {
            if !alignment.contains(outgroup) {
                return Err(BuildFailure::OutgroupDropped(outgroup.clone()));
            }
        }
        Ok(())
    }
}
