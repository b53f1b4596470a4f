//! # Tab-Delimited Reading and Writing
//!
//! Header row plus one record per row. Roles are resolved by exact,
//! case-sensitive header match. Uses the `csv` crate with a tab delimiter
//! and quoting disabled.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info_span;

use crate::data::{InputDescriptor, Layout, Metadata, SequenceRecord, Sequences};
use crate::error::{RephaseError, Result};
use crate::io::open_reader;

/// Header names accepted for the identifier role, in preference order
pub const IDENTIFIER_HEADERS: [&str; 2] = ["seqid", "id"];

/// Header names accepted for the sequence role, in preference order
pub const SEQUENCE_HEADERS: [&str; 3] = ["sequence", "sequences", "seq"];

/// Header names accepted for the grouping role, in preference order
pub const GROUPING_HEADERS: [&str; 2] = ["species", "genera"];

/// Fixed headers of the two-column tabular output
pub const FIXED_IDENTIFIER_HEADER: &str = "seqid";
pub const FIXED_SEQUENCE_HEADER: &str = "sequence";

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false);
    builder
}

/// First header in `candidates` present in `headers`
fn find_header(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

/// Map header names to roles. A grouping column that collides with the
/// identifier or sequence column is dropped.
pub fn resolve_layout(headers: Vec<String>) -> Layout {
    let identifier_column = find_header(&headers, &IDENTIFIER_HEADERS);
    let sequence_column = find_header(&headers, &SEQUENCE_HEADERS);
    let grouping_column = find_header(&headers, &GROUPING_HEADERS)
        .filter(|g| Some(*g) != identifier_column && Some(*g) != sequence_column);

    Layout::Tabfile {
        headers,
        identifier_column,
        sequence_column,
        grouping_column,
    }
}

/// Read only the header row and build a descriptor
pub fn describe(path: &Path, byte_size: u64) -> Result<InputDescriptor> {
    let mut reader = reader_builder().from_reader(open_reader(path)?);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let headers = if headers.len() == 1 && headers[0].is_empty() {
        Vec::new()
    } else {
        headers
    };

    Ok(InputDescriptor {
        path: path.to_path_buf(),
        byte_size,
        layout: resolve_layout(headers),
    })
}

/// Read all records. Metadata holds every non-role column in header order;
/// missing cells are `None`.
pub fn read_sequences(desc: &InputDescriptor) -> Result<Sequences> {
    let _span = info_span!("tabfile_read", path = ?desc.path).entered();
    let (headers, id_col, seq_col) = match &desc.layout {
        Layout::Tabfile {
            headers,
            identifier_column: Some(id),
            sequence_column: Some(seq),
            ..
        } => (headers, *id, *seq),
        _ => {
            return Err(RephaseError::invalid_input(
                desc.invalid_reason()
                    .unwrap_or_else(|| "not a tab-delimited input".to_string()),
            ))
        }
    };

    let mut reader = reader_builder().from_reader(open_reader(&desc.path)?);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let identifier = row.get(id_col).unwrap_or("").trim().to_string();
        let sequence = row.get(seq_col).unwrap_or("").trim().to_string();

        let mut metadata = Metadata::new();
        for (i, header) in headers.iter().enumerate() {
            if i == id_col || i == seq_col {
                continue;
            }
            metadata.insert(header.clone(), row.get(i).map(|v| v.trim().to_string()));
        }

        records.push(SequenceRecord {
            identifier,
            sequence,
            metadata,
        });
    }

    Ok(Sequences::new(desc.display_name(), records))
}

/// Column role of a tabular output column
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Column {
    Identifier(String),
    Sequence(String),
    Field(String),
}

impl Column {
    pub fn header(&self) -> &str {
        match self {
            Column::Identifier(h) | Column::Sequence(h) | Column::Field(h) => h,
        }
    }
}

/// Tab-delimited record writer
pub struct TabfileWriter {
    writer: csv::Writer<Box<dyn Write + Send>>,
    columns: Vec<Column>,
}

impl TabfileWriter {
    /// Create the file and write the header row
    pub fn create(path: &Path, columns: Vec<Column>) -> Result<Self> {
        let file = File::create(path)?;
        let sink: Box<dyn Write + Send> = Box::new(BufWriter::new(file));
        Self::from_writer(sink, columns)
    }

    pub fn from_writer(sink: Box<dyn Write + Send>, columns: Vec<Column>) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(sink);
        writer.write_record(columns.iter().map(Column::header))?;
        Ok(Self { writer, columns })
    }

    pub fn write(&mut self, record: &SequenceRecord) -> Result<()> {
        let row = self.columns.iter().map(|col| match col {
            Column::Identifier(_) => record.identifier.as_str(),
            Column::Sequence(_) => record.sequence.as_str(),
            Column::Field(key) => record.field(key).unwrap_or(""),
        });
        self.writer.write_record(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_roles() {
        let layout = resolve_layout(headers(&["seqid", "sequence", "species"]));
        assert_eq!(
            layout,
            Layout::Tabfile {
                headers: headers(&["seqid", "sequence", "species"]),
                identifier_column: Some(0),
                sequence_column: Some(1),
                grouping_column: Some(2),
            }
        );
    }

    #[test]
    fn test_grouping_preference_order() {
        let layout = resolve_layout(headers(&["genera", "id", "seq", "species"]));
        match layout {
            Layout::Tabfile {
                grouping_column, ..
            } => assert_eq!(grouping_column, Some(3)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_header_match_is_case_sensitive() {
        match resolve_layout(headers(&["SeqID", "Sequence"])) {
            Layout::Tabfile {
                identifier_column,
                sequence_column,
                ..
            } => {
                assert_eq!(identifier_column, None);
                assert_eq!(sequence_column, None);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_read_with_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.tsv");
        std::fs::write(
            &path,
            "seqid\tsequence\tspecies\tsite\nA1\tACGT\tfoo\tx\nA2\tACGA\tbar\n\n",
        )
        .unwrap();

        let desc = describe(&path, 0).unwrap();
        let seqs = read_sequences(&desc).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs.records()[0].field("site"), Some("x"));
        assert_eq!(seqs.records()[1].metadata.get("site"), Some(&None));
        assert_eq!(
            seqs.records()[1].metadata.keys().collect::<Vec<_>>(),
            vec!["species", "site"]
        );
    }

    #[test]
    fn test_writer_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut writer = TabfileWriter::create(
            &path,
            vec![
                Column::Identifier("seqid".into()),
                Column::Field("allele".into()),
                Column::Sequence("sequence".into()),
            ],
        )
        .unwrap();
        writer
            .write(&SequenceRecord::new("A1", "ACGT").with_field("allele", "a"))
            .unwrap();
        writer.flush().unwrap();
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "seqid\tallele\tsequence\nA1\ta\tACGT\n");
    }
}
