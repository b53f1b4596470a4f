//! # Record-Tag (FASTA) Reading and Writing
//!
//! `>identifier[separator]grouping` header lines followed by one or more
//! sequence lines. When every header carries a grouping token, the scanner
//! records the separator and the reader splits it off into the `organism`
//! metadata field.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use tracing::info_span;

use crate::data::descriptor::{DEFAULT_GROUPING_TAG, GROUPING_SEPARATORS};
use crate::data::{InputDescriptor, Layout, SequenceRecord, Sequences};
use crate::error::{RephaseError, Result};
use crate::io::open_reader;

/// A raw record: full header text (without `>`) and joined sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub header: String,
    pub sequence: String,
}

/// Streaming record-tag reader
pub struct FastaReader<R: BufRead> {
    reader: R,
    line_no: usize,
    pending_header: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pending_header: None,
            done: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        Ok(Some(trimmed.to_string()))
    }

    /// Read the next record, `None` at end of input
    pub fn read_record(&mut self) -> Result<Option<RawRecord>> {
        if self.done {
            return Ok(None);
        }

        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                match self.next_line()? {
                    None => {
                        self.done = true;
                        return Ok(None);
                    }
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => match line.strip_prefix('>') {
                        Some(h) => break h.trim().to_string(),
                        None => {
                            return Err(RephaseError::parse(
                                self.line_no,
                                "sequence data before first '>' header",
                            ))
                        }
                    },
                }
            },
        };

        let mut sequence = String::new();
        loop {
            match self.next_line()? {
                None => {
                    self.done = true;
                    break;
                }
                Some(line) => {
                    if let Some(next) = line.strip_prefix('>') {
                        self.pending_header = Some(next.trim().to_string());
                        break;
                    }
                    sequence.extend(line.chars().filter(|c| !c.is_whitespace()));
                }
            }
        }

        Ok(Some(RawRecord { header, sequence }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Separator carried by every header, checked in allowed order
pub fn detect_separator<'a>(headers: impl IntoIterator<Item = &'a str> + Clone) -> Option<char> {
    let mut any = false;
    for sep in GROUPING_SEPARATORS {
        let mut all = true;
        for header in headers.clone() {
            any = true;
            if !header.contains(sep) {
                all = false;
                break;
            }
        }
        if any && all {
            return Some(sep);
        }
    }
    None
}

fn read_raw(path: &Path) -> Result<Vec<RawRecord>> {
    FastaReader::new(open_reader(path)?).collect()
}

/// Scan headers and build a descriptor
pub fn describe(path: &Path, byte_size: u64) -> Result<InputDescriptor> {
    let raw = read_raw(path)?;
    let grouping_separator = detect_separator(raw.iter().map(|r| r.header.as_str()));
    Ok(InputDescriptor {
        path: path.to_path_buf(),
        byte_size,
        layout: Layout::Fasta { grouping_separator },
    })
}

/// Read all records, splitting grouping tokens when the descriptor has a separator
pub fn read_sequences(desc: &InputDescriptor) -> Result<Sequences> {
    let _span = info_span!("fasta_read", path = ?desc.path).entered();
    let separator = match &desc.layout {
        Layout::Fasta { grouping_separator } => *grouping_separator,
        Layout::Tabfile { .. } => {
            return Err(RephaseError::invalid_input("not a record-tag input"));
        }
    };

    let records = read_raw(&desc.path)?
        .into_iter()
        .map(|raw| match separator {
            Some(sep) => {
                let (id, group) = raw
                    .header
                    .split_once(sep)
                    .unwrap_or((raw.header.as_str(), ""));
                SequenceRecord::new(id, raw.sequence.as_str()).with_field(DEFAULT_GROUPING_TAG, group)
            }
            None => SequenceRecord::new(raw.header, raw.sequence),
        })
        .collect();

    Ok(Sequences::new(desc.display_name(), records))
}

/// Header layout of written records
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastaLayout {
    pub write_grouping: bool,
    pub grouping_tag: String,
    pub grouping_separator: char,
    pub concatenated_extra_fields: Vec<String>,
}

impl FastaLayout {
    /// Compose the header: identifier, `_value` per non-empty extra field,
    /// then `separator + group` when grouping is written and non-empty
    pub fn header(&self, record: &SequenceRecord) -> String {
        let mut header = record.identifier.clone();
        for field in &self.concatenated_extra_fields {
            if let Some(value) = record.field(field).filter(|v| !v.is_empty()) {
                header.push('_');
                header.push_str(value);
            }
        }
        if self.write_grouping {
            if let Some(group) = record.field(&self.grouping_tag).filter(|g| !g.is_empty()) {
                header.push(self.grouping_separator);
                header.push_str(group);
            }
        }
        header
    }
}

/// Record-tag writer
pub struct FastaWriter {
    writer: Box<dyn Write + Send>,
    layout: FastaLayout,
}

impl FastaWriter {
    pub fn create(path: &Path, layout: FastaLayout) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(BufWriter::new(file)), layout))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, layout: FastaLayout) -> Self {
        Self { writer, layout }
    }

    pub fn write(&mut self, record: &SequenceRecord) -> Result<()> {
        writeln!(self.writer, ">{}", self.layout.header(record))?;
        writeln!(self.writer, "{}", record.sequence)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
