//! # Format Scanner
//!
//! Inspects a candidate input: detects its encoding, extracts structural
//! metadata through the format's handler, and collects warnings about the
//! decoded records. Scanning never fails on structural oddities; only I/O
//! and parse errors are returned as `Err`.

use std::collections::HashSet;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::data::{ScanOutcome, ScanWarning, Sequences};
use crate::error::{RephaseError, Result};
use crate::io::format::detect_format;

/// IUPAC nucleotide codes plus gap and missing markers
fn is_nucleotide_code(c: char) -> bool {
    matches!(
        c.to_ascii_uppercase(),
        'A' | 'C' | 'G' | 'T' | 'U' | 'R' | 'Y' | 'S' | 'W' | 'K' | 'M' | 'B' | 'D' | 'H' | 'V'
            | 'N' | '-' | '?'
    )
}

/// Distinct invalid characters of a sequence, in first-seen order
fn invalid_characters(sequence: &str) -> String {
    let mut seen = HashSet::new();
    sequence
        .chars()
        .filter(|c| !is_nucleotide_code(*c) && seen.insert(*c))
        .collect()
}

/// Structural warnings for decoded records, ordered by record
pub fn scan_sequences(sequences: &Sequences) -> Vec<ScanWarning> {
    if sequences.is_empty() {
        return vec![ScanWarning::NoRecords];
    }

    let invalid: Vec<String> = sequences
        .records()
        .par_iter()
        .map(|r| invalid_characters(&r.sequence))
        .collect();

    let expected_len = sequences
        .iter()
        .map(|r| r.sequence.chars().count())
        .find(|&n| n > 0);

    let mut warnings = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut reported_dups: HashSet<&str> = HashSet::new();

    for (record, bad) in sequences.iter().zip(invalid) {
        let id = record.identifier.as_str();
        if !seen_ids.insert(id) && reported_dups.insert(id) {
            warnings.push(ScanWarning::DuplicateIdentifier {
                identifier: id.to_string(),
            });
        }

        let len = record.sequence.chars().count();
        if len == 0 {
            warnings.push(ScanWarning::EmptySequence {
                identifier: id.to_string(),
            });
            continue;
        }

        if !bad.is_empty() {
            warnings.push(ScanWarning::InvalidCharacters {
                identifier: id.to_string(),
                characters: bad,
            });
        }

        if let Some(expected) = expected_len {
            if len != expected {
                warnings.push(ScanWarning::UnequalLength {
                    identifier: id.to_string(),
                    expected,
                    found: len,
                });
            }
        }
    }

    warnings
}

/// Scan a file. An invalid descriptor is returned as-is with no warnings;
/// the caller must check `descriptor.is_valid()` before proceeding.
#[instrument(skip_all, fields(path = ?path))]
pub fn scan_file(path: &Path) -> Result<ScanOutcome> {
    let byte_size = std::fs::metadata(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RephaseError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => RephaseError::Io(e),
        })?
        .len();

    let format = detect_format(path)?;
    let handler = format.handler();
    let descriptor = (handler.describe)(path, byte_size)?;
    debug!(format = %format, valid = descriptor.is_valid(), "descriptor built");

    let warnings = if descriptor.is_valid() {
        let sequences = (handler.read)(&descriptor)?;
        scan_sequences(&sequences)
    } else {
        Vec::new()
    };

    info!(
        format = %format,
        bytes = byte_size,
        warnings = warnings.len(),
        "scanned input"
    );
    Ok(ScanOutcome {
        descriptor,
        warnings,
    })
}
