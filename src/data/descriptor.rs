//! # Input Descriptors
//!
//! Structural facts extracted from an input file by the scanner. A descriptor
//! is immutable once built and is replaced wholesale when a new file is opened.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::data::haplotype::ALLELE_FIELD;

/// Grouping tag used by record-tag files and by FASTA output when no tabular
/// grouping header overrides it
pub const DEFAULT_GROUPING_TAG: &str = "organism";

/// Separators allowed between identifier and grouping token
pub const GROUPING_SEPARATORS: [char; 2] = ['|', '.'];

/// Default grouping separator
pub const DEFAULT_GROUPING_SEPARATOR: char = '|';

/// The two supported input encodings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Tab-delimited with a header row
    Tabfile,
    /// Record-tag encoding (`>identifier` header lines)
    Fasta,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Tabfile => "Tabfile",
            FileFormat::Fasta => "Fasta",
        }
    }

    /// Extension used when writing this encoding
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Tabfile => ".tsv",
            FileFormat::Fasta => ".fas",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format-specific structure of an input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    Tabfile {
        headers: Vec<String>,
        identifier_column: Option<usize>,
        sequence_column: Option<usize>,
        grouping_column: Option<usize>,
    },
    Fasta {
        /// Separator between identifier and grouping token, when every
        /// record carries one
        grouping_separator: Option<char>,
    },
}

/// Description of a scanned input file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDescriptor {
    pub path: PathBuf,
    pub byte_size: u64,
    pub layout: Layout,
}

impl InputDescriptor {
    pub fn format(&self) -> FileFormat {
        match self.layout {
            Layout::Tabfile { .. } => FileFormat::Tabfile,
            Layout::Fasta { .. } => FileFormat::Fasta,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column headers; empty for record-tag inputs
    pub fn headers(&self) -> &[String] {
        match &self.layout {
            Layout::Tabfile { headers, .. } => headers,
            Layout::Fasta { .. } => &[],
        }
    }

    /// A descriptor is usable only if identifier and sequence resolve to
    /// distinct columns. Record-tag inputs always carry both roles.
    pub fn is_valid(&self) -> bool {
        match &self.layout {
            Layout::Tabfile {
                identifier_column: Some(id),
                sequence_column: Some(seq),
                ..
            } => id != seq,
            Layout::Tabfile { .. } => false,
            Layout::Fasta { .. } => true,
        }
    }

    /// Human-readable reason for invalidity, `None` when valid
    pub fn invalid_reason(&self) -> Option<String> {
        match &self.layout {
            Layout::Tabfile {
                identifier_column,
                sequence_column,
                ..
            } => match (identifier_column, sequence_column) {
                (None, _) => Some("no identifier column found".to_string()),
                (_, None) => Some("no sequence column found".to_string()),
                (Some(a), Some(b)) if a == b => {
                    Some("identifier and sequence resolve to the same column".to_string())
                }
                _ => None,
            },
            Layout::Fasta { .. } => None,
        }
    }

    /// Whether records carry a grouping role
    pub fn has_grouping(&self) -> bool {
        match &self.layout {
            Layout::Tabfile {
                grouping_column, ..
            } => grouping_column.is_some(),
            Layout::Fasta { grouping_separator } => grouping_separator.is_some(),
        }
    }

    /// Grouping separator detected in record-tag identifiers
    pub fn grouping_separator(&self) -> Option<char> {
        match &self.layout {
            Layout::Fasta { grouping_separator } => *grouping_separator,
            Layout::Tabfile { .. } => None,
        }
    }

    pub fn identifier_header(&self) -> Option<&str> {
        self.header_at(|layout| match layout {
            Layout::Tabfile {
                identifier_column, ..
            } => *identifier_column,
            Layout::Fasta { .. } => None,
        })
    }

    pub fn sequence_header(&self) -> Option<&str> {
        self.header_at(|layout| match layout {
            Layout::Tabfile {
                sequence_column, ..
            } => *sequence_column,
            Layout::Fasta { .. } => None,
        })
    }

    pub fn grouping_header(&self) -> Option<&str> {
        self.header_at(|layout| match layout {
            Layout::Tabfile {
                grouping_column, ..
            } => *grouping_column,
            Layout::Fasta { .. } => None,
        })
    }

    fn header_at(&self, column: impl Fn(&Layout) -> Option<usize>) -> Option<&str> {
        column(&self.layout)
            .and_then(|idx| self.headers().get(idx))
            .map(String::as_str)
    }

    /// Headers that play no role (identifier, sequence, grouping, allele),
    /// in original header order
    pub fn extra_headers(&self) -> Vec<&str> {
        let reserved = [
            self.identifier_header(),
            self.sequence_header(),
            self.grouping_header(),
            Some(ALLELE_FIELD),
        ];
        self.headers()
            .iter()
            .map(String::as_str)
            .filter(|h| !reserved.contains(&Some(*h)))
            .collect()
    }

    /// Whether tabular input has metadata columns beyond the role columns
    pub fn has_extras(&self) -> bool {
        !self.extra_headers().is_empty()
    }

    /// Display name for the sequence collection read from this input
    pub fn display_name(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("Sequences from {}", file_name)
    }
}

/// A structural concern found while scanning. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanWarning {
    /// The file contains no records at all
    NoRecords,
    /// A record has an empty sequence
    EmptySequence { identifier: String },
    /// An identifier occurs more than once
    DuplicateIdentifier { identifier: String },
    /// A sequence contains characters outside the nucleotide alphabet
    InvalidCharacters { identifier: String, characters: String },
    /// A sequence length differs from the first record's length
    UnequalLength {
        identifier: String,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::NoRecords => write!(f, "File contains no sequences"),
            ScanWarning::EmptySequence { identifier } => {
                write!(f, "Empty sequence for identifier \"{}\"", identifier)
            }
            ScanWarning::DuplicateIdentifier { identifier } => {
                write!(f, "Duplicate identifier \"{}\"", identifier)
            }
            ScanWarning::InvalidCharacters {
                identifier,
                characters,
            } => write!(
                f,
                "Sequence \"{}\" contains invalid characters: {}",
                identifier, characters
            ),
            ScanWarning::UnequalLength {
                identifier,
                expected,
                found,
            } => write!(
                f,
                "Sequence \"{}\" has length {}, expected {}",
                identifier, found, expected
            ),
        }
    }
}

/// Result of scanning one input file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    pub descriptor: InputDescriptor,
    pub warnings: Vec<ScanWarning>,
}

impl ScanOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
