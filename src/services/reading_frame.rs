//! Reading-frame detection for protein-coding clusters.

use serde::Serialize;

use crate::domain::models::alignment::is_gap;
use crate::domain::models::{Alignment, StopCodons};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    Forward,
    Reverse,
}

/// A frame free of internal stop codons in every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadingFrame {
    pub strand: Strand,
    /// First column of the first whole codon, 0, 1 or 2
    pub offset: usize,
}

/// First clean frame of `alignment`, forward frames first.
///
/// Reverse-strand frames are tested by reading the forward rows for the
/// reverse complements of the stop codons, which is the same as reading the
/// reverse complement for the stops themselves. `None` means no clean frame
/// exists for these stop codons, so the cluster is handled as non-coding.
pub fn find_orf(alignment: &Alignment, stops: &StopCodons) -> Option<ReadingFrame> {
    let forward = (0..3).map(|offset| (Strand::Forward, offset));
    let reverse = (0..3).map(|offset| (Strand::Reverse, offset));
    forward
        .chain(reverse)
        .find(|&(strand, offset)| {
            let pattern = match strand {
                Strand::Forward => stops.forward(),
                Strand::Reverse => stops.reverse(),
            };
            alignment
                .iter()
                .all(|row| !has_stop(row.residues.as_bytes(), offset, pattern))
        })
        .map(|(strand, offset)| ReadingFrame { strand, offset })
}

fn has_stop(residues: &[u8], offset: usize, pattern: &regex::Regex) -> bool {
    residues
        .get(offset..)
        .unwrap_or_default()
        .chunks_exact(3)
        .filter(|codon| !codon.iter().any(|&b| is_gap(b)))
        .any(|codon| std::str::from_utf8(codon).is_ok_and(|c| pattern.is_match(c)))
}

/// Whole codons of `frame`, reverse complemented for the reverse strand.
pub fn trim_to_frame(alignment: &Alignment, frame: ReadingFrame) -> Alignment {
    let whole = (alignment.alignment_length().saturating_sub(frame.offset)) / 3 * 3;
    let trimmed = alignment.columns(frame.offset, frame.offset + whole);
    match frame.strand {
        Strand::Forward => trimmed,
        Strand::Reverse => trimmed.reverse_complement(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AlignedSequence, GeneticCode};

    fn alignment(rows: &[&str]) -> Alignment {
        Alignment::new(
            rows.iter()
                .enumerate()
                .map(|(i, r)| AlignedSequence::new(format!("t{i}"), *r))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_zero_clean() {
        let aln = alignment(&["ATGGCCAAAGGG", "ATGGCC---GGG"]);
        let stops = StopCodons::from_codons(&["taa", "tag"]).unwrap();
        assert_eq!(
            find_orf(&aln, &stops),
            Some(ReadingFrame {
                strand: Strand::Forward,
                offset: 0
            })
        );
    }

    #[test]
    fn test_skips_frames_with_stops() {
        // frame 0 reads TAA, frame 1 is clean
        let aln = alignment(&["TAAGCCGCCGCC", "CCCGCCGCCGCC"]);
        let stops = StopCodons::from_codons(&["taa", "tag"]).unwrap();
        assert_eq!(
            find_orf(&aln, &stops),
            Some(ReadingFrame {
                strand: Strand::Forward,
                offset: 1
            })
        );
    }

    #[test]
    fn test_stop_case_is_ignored() {
        let aln = alignment(&["taataataa", "taataataa"]);
        let stops = StopCodons::from_codons(&["taa"]).unwrap();
        let frame = find_orf(&aln, &stops).unwrap();
        assert_ne!(
            frame,
            ReadingFrame {
                strand: Strand::Forward,
                offset: 0
            }
        );
    }

    #[test]
    fn test_no_frame_with_nonsense_stops() {
        let stops = StopCodons::from_codons(&["tct", "aca"]).unwrap();
        assert_eq!(stops.reverse().as_str(), "(aga|tgt)");
        // the first row hits tct in every forward frame, the second aga in
        // every reverse one
        let aln = alignment(&["TCTCTCTCTCTC", "AGAGAGAGAGAG"]);
        assert!(find_orf(&aln, &stops).is_none());
    }

    #[test]
    fn test_trim_to_frame() {
        let aln = alignment(&["XATGGCCAA", "XATGGCC--"]);
        let trimmed = trim_to_frame(
            &aln,
            ReadingFrame {
                strand: Strand::Forward,
                offset: 1,
            },
        );
        assert_eq!(trimmed.alignment_length(), 6);
        assert_eq!(trimmed.get("t0").unwrap().residues, "ATGGCC");

        let reversed = trim_to_frame(
            &alignment(&["ATGGCC"]),
            ReadingFrame {
                strand: Strand::Reverse,
                offset: 0,
            },
        );
        assert_eq!(reversed.get("t0").unwrap().residues, "GGCCAT");
    }

    #[test]
    fn test_standard_code_lookup() {
        let stops = StopCodons::for_code(GeneticCode::Standard).unwrap();
        let aln = alignment(&["ATGTGAATG"]);
        let frame = find_orf(&aln, &stops).unwrap();
        assert_eq!(frame.offset, 1);
    }
}
