//! # Format Dispatch
//!
//! Maps each [`FileFormat`] variant to the functions that handle it. The set
//! of encodings is closed, so adding one means adding a variant and a row
//! here, and every `match` on `FileFormat` is checked by the compiler.

use std::io::BufRead;
use std::path::Path;

use crate::data::{FileFormat, InputDescriptor, Sequences};
use crate::error::Result;
use crate::io::{fasta, open_reader, tabfile};

/// Format-specific entry points
pub struct FormatHandler {
    pub format: FileFormat,
    /// Build a descriptor from the file's structure
    pub describe: fn(&Path, u64) -> Result<InputDescriptor>,
    /// Read every record according to a descriptor
    pub read: fn(&InputDescriptor) -> Result<Sequences>,
}

static HANDLERS: [FormatHandler; 2] = [
    FormatHandler {
        format: FileFormat::Tabfile,
        describe: tabfile::describe,
        read: tabfile::read_sequences,
    },
    FormatHandler {
        format: FileFormat::Fasta,
        describe: fasta::describe,
        read: fasta::read_sequences,
    },
];

impl FileFormat {
    pub fn handler(self) -> &'static FormatHandler {
        match self {
            FileFormat::Tabfile => &HANDLERS[0],
            FileFormat::Fasta => &HANDLERS[1],
        }
    }
}

/// Detect the encoding from the first non-blank line: a leading `>` means
/// record-tag, anything else (including an empty file) is tab-delimited
pub fn detect_format(path: &Path) -> Result<FileFormat> {
    let mut reader = open_reader(path)?;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(FileFormat::Tabfile);
        }
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(if trimmed.starts_with('>') {
            FileFormat::Fasta
        } else {
            FileFormat::Tabfile
        });
    }
}

/// Read the records described by `desc` through its format handler
pub fn read_sequences(desc: &InputDescriptor) -> Result<Sequences> {
    (desc.format().handler().read)(desc)
}
