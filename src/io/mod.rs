//! # I/O Module
//!
//! File reading/writing boundaries. Converts between the two supported
//! encodings and the in-memory `Sequences` representation.

pub mod fasta;
pub mod format;
pub mod output;
pub mod scan;
pub mod tabfile;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{RephaseError, Result};

pub use format::FormatHandler;
pub use output::{select_output, OutputMode, OutputOptions, OutputPlan, SequenceWriter};
pub use scan::scan_file;

/// Whether the path names a gzip-compressed file
pub fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false)
}

/// Open a text file for buffered reading, decompressing `.gz` transparently
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RephaseError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => RephaseError::Io(e),
    })?;

    let reader: Box<dyn BufRead + Send> = if is_gzipped(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// File name with a trailing `.gz`/`.bgz` removed, then split into stem and
/// extension (extension includes the leading dot, empty if none)
pub fn split_name(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if is_gzipped(path) {
        match name.rsplit_once('.') {
            Some((head, _)) => head.to_string(),
            None => name,
        }
    } else {
        name
    };
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (name, String::new()),
    }
}
