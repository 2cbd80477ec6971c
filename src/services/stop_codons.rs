//! Stop-codon lookup by genome compartment and taxonomic lineage.

use tracing::{debug, warn};

use crate::domain::models::{GeneticCode, GenomeCompartment, StopCodons};

/// One exception group: taxa below `taxid` use `code` in `compartment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRule {
    pub compartment: GenomeCompartment,
    pub taxid: u32,
    pub code: GeneticCode,
}

const fn rule(compartment: GenomeCompartment, taxid: u32, code: GeneticCode) -> CodeRule {
    CodeRule {
        compartment,
        taxid,
        code,
    }
}

/// NCBI genetic-code groups, keyed by NCBI taxonomy id.
const DEFAULT_RULES: &[CodeRule] = &[
    // Nuclear
    rule(GenomeCompartment::Nuclear, 5878, GeneticCode::CiliateNuclear), // Ciliophora
    // NCBI transl_table 6 covers Hexamita nuclear genes: taa and tag read as
    // Gln, tga is the only stop.
    rule(GenomeCompartment::Nuclear, 5739, GeneticCode::CiliateNuclear), // Hexamitidae
    rule(GenomeCompartment::Nuclear, 5935, GeneticCode::EuplotidNuclear), // Euplotidae
    // Mitochondrial
    rule(GenomeCompartment::Mitochondrial, 33208, GeneticCode::InvertebrateMitochondrial), // Metazoa
    rule(GenomeCompartment::Mitochondrial, 7742, GeneticCode::VertebrateMitochondrial), // Vertebrata
    rule(GenomeCompartment::Mitochondrial, 7713, GeneticCode::AscidianMitochondrial), // Ascidiacea
    rule(GenomeCompartment::Mitochondrial, 7586, GeneticCode::EchinodermMitochondrial), // Echinodermata
    rule(GenomeCompartment::Mitochondrial, 6157, GeneticCode::EchinodermMitochondrial), // Platyhelminthes
    rule(GenomeCompartment::Mitochondrial, 6199, GeneticCode::AlternativeFlatwormMitochondrial), // Cestoda
    rule(GenomeCompartment::Mitochondrial, 4751, GeneticCode::MoldProtozoanMitochondrial), // Fungi
    rule(GenomeCompartment::Mitochondrial, 4893, GeneticCode::YeastMitochondrial), // Saccharomycetaceae
    rule(GenomeCompartment::Mitochondrial, 5878, GeneticCode::MoldProtozoanMitochondrial), // Ciliophora
    rule(GenomeCompartment::Mitochondrial, 33090, GeneticCode::Standard), // Viridiplantae
    // Plastid
    rule(GenomeCompartment::Plastid, 33090, GeneticCode::BacterialPlastid), // Viridiplantae
];

/// Resolves the stop codons of a protein-coding cluster.
#[derive(Debug, Clone)]
pub struct StopCodonRetriever {
    rules: Vec<CodeRule>,
}

impl Default for StopCodonRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl StopCodonRetriever {
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    pub fn with_rules(rules: Vec<CodeRule>) -> Self {
        Self { rules }
    }

    /// Code of one taxon: the most specific rule on its lineage, else the
    /// compartment default.
    ///
    /// `lineage` runs from the root towards the taxon. Mitochondrial genomes
    /// have no default, since no single code covers them.
    pub fn code_for(&self, compartment: GenomeCompartment, lineage: &[u32]) -> Option<GeneticCode> {
        lineage
            .iter()
            .rev()
            .find_map(|taxid| {
                self.rules
                    .iter()
                    .find(|r| r.compartment == compartment && r.taxid == *taxid)
            })
            .map(|r| r.code)
            .or(match compartment {
                GenomeCompartment::Nuclear | GenomeCompartment::Plastid => {
                    Some(GeneticCode::Standard)
                }
                GenomeCompartment::Mitochondrial => None,
            })
    }

    /// Stop codons shared by every taxon of a cluster.
    ///
    /// Returns `None` when any taxon has no known code or when taxa disagree.
    pub fn retrieve<'a, I>(&self, compartment: GenomeCompartment, lineages: I) -> Option<StopCodons>
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        let mut shared: Option<GeneticCode> = None;
        for lineage in lineages {
            let code = self.code_for(compartment, lineage)?;
            match shared {
                None => shared = Some(code),
                Some(existing) if existing == code => {}
                Some(existing) => {
                    debug!(%existing, other = %code, "taxa disagree on genetic code");
                    return None;
                }
            }
        }
        let code = shared?;
        match StopCodons::for_code(code) {
            Ok(stops) => Some(stops),
            Err(e) => {
                warn!(%code, error = %e, "stop codon pattern failed to compile");
                None
            }
        }
    }
}
