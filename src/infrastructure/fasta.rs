//! FASTA reading and writing on top of `bio::io::fasta`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bio::io::fasta;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AlignedSequence, Alignment, Sequence};

/// Reads every record of `path` as an unaligned sequence.
///
/// The record id is the taxon, the description is kept as source metadata.
pub fn read_sequences(path: &Path) -> DomainResult<Vec<Sequence>> {
    let file = File::open(path).map_err(|e| DomainError::io(path, e))?;
    parse_sequences(BufReader::new(file), path)
}

/// Reads an aligned FASTA file.
pub fn read_alignment(path: &Path) -> DomainResult<Alignment> {
    let file = File::open(path).map_err(|e| DomainError::io(path, e))?;
    parse_alignment(BufReader::new(file), path)
}

pub fn parse_sequences<R: Read>(reader: R, source: &Path) -> DomainResult<Vec<Sequence>> {
    let mut sequences = Vec::new();
    for record in fasta::Reader::new(reader).records() {
        let record = record.map_err(|e| fasta_error(source, e))?;
        record
            .check()
            .map_err(|message| fasta_error(source, message))?;
        let mut sequence = Sequence::new(
            record.id(),
            String::from_utf8_lossy(record.seq()).into_owned(),
        );
        if let Some(desc) = record.desc() {
            sequence = sequence.with_description(desc);
        }
        sequences.push(sequence);
    }
    Ok(sequences)
}

/// Parses aligned FASTA, e.g. a solver's standard output.
pub fn parse_alignment<R: Read>(reader: R, source: &Path) -> DomainResult<Alignment> {
    let records = parse_sequences(reader, source)?
        .into_iter()
        .map(|s| AlignedSequence::new(s.taxon, s.residues))
        .collect();
    Alignment::new(records)
}

pub fn write_sequences(path: &Path, sequences: &[Sequence]) -> DomainResult<()> {
    let file = File::create(path).map_err(|e| DomainError::io(path, e))?;
    let mut writer = fasta::Writer::new(file);
    for sequence in sequences {
        writer
            .write(
                &sequence.taxon,
                sequence.description.as_deref(),
                sequence.residues.as_bytes(),
            )
            .map_err(|e| DomainError::io(path, e))?;
    }
    writer.flush().map_err(|e| DomainError::io(path, e))
}

pub fn write_alignment(path: &Path, alignment: &Alignment) -> DomainResult<()> {
    let file = File::create(path).map_err(|e| DomainError::io(path, e))?;
    let mut writer = fasta::Writer::new(file);
    for row in alignment {
        writer
            .write(&row.taxon, None, row.residues.as_bytes())
            .map_err(|e| DomainError::io(path, e))?;
    }
    writer.flush().map_err(|e| DomainError::io(path, e))
}

fn fasta_error(path: &Path, message: impl ToString) -> DomainError {
    DomainError::Fasta {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequences_keeps_description() {
        let text = ">Homo_sapiens AB123.1 rbcL\nACGT\nAC\n>Pan_troglodytes\nACGTTT\n";
        let seqs = parse_sequences(text.as_bytes(), Path::new("mem")).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].taxon, "Homo_sapiens");
        assert_eq!(seqs[0].residues, "ACGTAC");
        assert_eq!(seqs[0].description.as_deref(), Some("AB123.1 rbcL"));
        assert_eq!(seqs[1].description, None);
    }

    #[test]
    fn test_parse_alignment_rejects_ragged() {
        let text = ">A\nACGT\n>B\nAC\n";
        assert!(matches!(
            parse_alignment(text.as_bytes(), Path::new("mem")),
            Err(DomainError::RaggedAlignment { .. })
        ));
    }

    #[test]
    fn test_alignment_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_nspp2_len4.faa");
        let alignment = Alignment::new(vec![
            AlignedSequence::new("A", "AC-T"),
            AlignedSequence::new("B", "ACGT"),
        ])
        .unwrap();
        write_alignment(&path, &alignment).unwrap();
        assert_eq!(read_alignment(&path).unwrap(), alignment);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_sequences(Path::new("/nonexistent/seqs.fasta")).unwrap_err();
        assert!(matches!(err, DomainError::Io { .. }));
    }
}
