//! Genetic codes and their stop-codon signatures.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Genome a protein-coding locus lives in; decides which code applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenomeCompartment {
    Nuclear,
    Mitochondrial,
    Plastid,
}

/// NCBI translation tables that differ in their stop codons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneticCode {
    Standard,
    VertebrateMitochondrial,
    YeastMitochondrial,
    MoldProtozoanMitochondrial,
    InvertebrateMitochondrial,
    CiliateNuclear,
    EchinodermMitochondrial,
    EuplotidNuclear,
    BacterialPlastid,
    AscidianMitochondrial,
    AlternativeFlatwormMitochondrial,
}

impl GeneticCode {
    /// NCBI `transl_table` number.
    pub const fn ncbi_id(self) -> u8 {
        match self {
            Self::Standard => 1,
            Self::VertebrateMitochondrial => 2,
            Self::YeastMitochondrial => 3,
            Self::MoldProtozoanMitochondrial => 4,
            Self::InvertebrateMitochondrial => 5,
            Self::CiliateNuclear => 6,
            Self::EchinodermMitochondrial => 9,
            Self::EuplotidNuclear => 10,
            Self::BacterialPlastid => 11,
            Self::AscidianMitochondrial => 13,
            Self::AlternativeFlatwormMitochondrial => 14,
        }
    }

    /// Stop codons, lower case.
    pub const fn stop_codons(self) -> &'static [&'static str] {
        match self {
            Self::Standard | Self::BacterialPlastid => &["taa", "tag", "tga"],
            Self::VertebrateMitochondrial => &["taa", "tag", "aga", "agg"],
            Self::YeastMitochondrial
            | Self::MoldProtozoanMitochondrial
            | Self::InvertebrateMitochondrial
            | Self::EchinodermMitochondrial
            | Self::EuplotidNuclear
            | Self::AscidianMitochondrial => &["taa", "tag"],
            Self::CiliateNuclear => &["tga"],
            Self::AlternativeFlatwormMitochondrial => &["tag"],
        }
    }
}

impl fmt::Display for GeneticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (transl_table={})", self, self.ncbi_id())
    }
}

/// Stop-codon descriptor for one locus: the forward stop pattern and the
/// pattern of its reverse complements, both case-insensitive.
#[derive(Debug, Clone)]
pub struct StopCodons {
    code: Option<GeneticCode>,
    forward: Regex,
    reverse: Regex,
}

impl StopCodons {
    /// Descriptor for a known genetic code.
    pub fn for_code(code: GeneticCode) -> Result<Self, regex::Error> {
        let mut stops = Self::from_codons(code.stop_codons())?;
        stops.code = Some(code);
        Ok(stops)
    }

    /// Descriptor for an arbitrary set of stop codons.
    pub fn from_codons(codons: &[&str]) -> Result<Self, regex::Error> {
        let reverse: Vec<String> = codons
            .iter()
            .map(|c| String::from_utf8_lossy(&bio::alphabets::dna::revcomp(c.as_bytes())).into_owned())
            .collect();
        Ok(Self {
            code: None,
            forward: Self::compile(codons)?,
            reverse: Self::compile(&reverse)?,
        })
    }

    fn compile<S: AsRef<str>>(codons: &[S]) -> Result<Regex, regex::Error> {
        let alternatives: Vec<String> = codons
            .iter()
            .map(|c| regex::escape(&c.as_ref().to_lowercase()))
            .collect();
        let pattern = if alternatives.len() == 1 {
            alternatives[0].clone()
        } else {
            format!("({})", alternatives.join("|"))
        };
        RegexBuilder::new(&pattern).case_insensitive(true).build()
    }

    pub fn code(&self) -> Option<GeneticCode> {
        self.code
    }

    /// Pattern matching stop codons read on the forward strand.
    pub fn forward(&self) -> &Regex {
        &self.forward
    }

    /// Pattern matching stop codons of the reverse strand, written forward.
    pub fn reverse(&self) -> &Regex {
        &self.reverse
    }
}
