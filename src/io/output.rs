//! # Output Format Selection
//!
//! Chooses the output encoding and its field layout from the input's
//! provenance and the user's output options, then opens the matching writer.
//!
//! ## Rules
//! - `Mimic`: the input's own encoding and header naming.
//! - `Tabfile`: fixed `seqid`/`sequence` columns, nothing else.
//! - `Fasta`: grouping tag taken from the tabular grouping header when there
//!   is one; extra tabular columns optionally concatenated into the
//!   identifier, always followed by `allele`.
//!
//! Writers target a `.part` file owned by [`PartialOutput`], which is renamed
//! on commit and removed if dropped uncommitted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::data::descriptor::{DEFAULT_GROUPING_SEPARATOR, DEFAULT_GROUPING_TAG, GROUPING_SEPARATORS};
use crate::data::{FileFormat, InputDescriptor, SequenceRecord, ALLELE_FIELD};
use crate::error::{RephaseError, Result};
use crate::io::fasta::{FastaLayout, FastaWriter};
use crate::io::tabfile::{Column, TabfileWriter, FIXED_IDENTIFIER_HEADER, FIXED_SEQUENCE_HEADER};

/// User-selected output mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum OutputMode {
    /// Same encoding and layout as the input
    #[default]
    Mimic,
    /// Two-column tab-delimited file
    Tabfile,
    /// Record-tag file with composed identifiers
    Fasta,
}

/// Encoding chosen for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEncoding {
    Mimic,
    TabularFixed,
    FastaLike,
}

/// User output options, editable until a run starts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputOptions {
    pub mode: OutputMode,
    fasta_separator: char,
    pub fasta_concatenate: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Mimic,
            fasta_separator: DEFAULT_GROUPING_SEPARATOR,
            fasta_concatenate: false,
        }
    }
}

impl OutputOptions {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn fasta_separator(&self) -> char {
        self.fasta_separator
    }

    pub fn set_fasta_separator(&mut self, separator: char) -> Result<()> {
        if !GROUPING_SEPARATORS.contains(&separator) {
            return Err(RephaseError::config(format!(
                "grouping separator must be one of {:?}, got '{}'",
                GROUPING_SEPARATORS, separator
            )));
        }
        self.fasta_separator = separator;
        Ok(())
    }

    /// Adopt the separator of a record-tag input that carries one
    pub fn follow_input(&mut self, desc: &InputDescriptor) {
        if let Some(sep) = desc.grouping_separator() {
            if GROUPING_SEPARATORS.contains(&sep) {
                self.fasta_separator = sep;
            }
        }
    }
}

/// Output layout computed once per run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPlan {
    pub encoding: OutputEncoding,
    /// Concrete file encoding written
    pub format: FileFormat,
    pub grouping_tag: String,
    pub grouping_separator: char,
    pub write_grouping: bool,
    pub concatenated_extra_fields: Vec<String>,
}

impl OutputPlan {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    fn fasta_layout(&self) -> FastaLayout {
        FastaLayout {
            write_grouping: self.write_grouping,
            grouping_tag: self.grouping_tag.clone(),
            grouping_separator: self.grouping_separator,
            concatenated_extra_fields: self.concatenated_extra_fields.clone(),
        }
    }
}

/// File encoding a mode produces for a given input
pub fn output_format(desc: &InputDescriptor, mode: OutputMode) -> FileFormat {
    match mode {
        OutputMode::Mimic => desc.format(),
        OutputMode::Tabfile => FileFormat::Tabfile,
        OutputMode::Fasta => FileFormat::Fasta,
    }
}

/// Compute the plan. Grouping tag and extra fields come only from the
/// descriptor, never from record contents.
pub fn plan_output(desc: &InputDescriptor, options: &OutputOptions) -> OutputPlan {
    let format = output_format(desc, options.mode);
    match options.mode {
        OutputMode::Mimic => OutputPlan {
            encoding: OutputEncoding::Mimic,
            format,
            grouping_tag: DEFAULT_GROUPING_TAG.to_string(),
            grouping_separator: desc
                .grouping_separator()
                .unwrap_or(DEFAULT_GROUPING_SEPARATOR),
            write_grouping: desc.has_grouping(),
            concatenated_extra_fields: match format {
                FileFormat::Fasta => vec![ALLELE_FIELD.to_string()],
                FileFormat::Tabfile => Vec::new(),
            },
        },
        OutputMode::Tabfile => OutputPlan {
            encoding: OutputEncoding::TabularFixed,
            format,
            grouping_tag: DEFAULT_GROUPING_TAG.to_string(),
            grouping_separator: options.fasta_separator(),
            write_grouping: false,
            concatenated_extra_fields: Vec::new(),
        },
        OutputMode::Fasta => {
            let write_grouping = desc.has_grouping();
            let mut grouping_tag = DEFAULT_GROUPING_TAG.to_string();
            let mut extras = vec![ALLELE_FIELD.to_string()];

            if desc.format() == FileFormat::Tabfile {
                if let Some(header) = desc.grouping_header() {
                    grouping_tag = header.to_string();
                }
                if desc.has_extras() && options.fasta_concatenate {
                    extras = desc
                        .extra_headers()
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    extras.push(ALLELE_FIELD.to_string());
                }
            }

            OutputPlan {
                encoding: OutputEncoding::FastaLike,
                format,
                grouping_tag,
                grouping_separator: options.fasta_separator(),
                write_grouping,
                concatenated_extra_fields: extras,
            }
        }
    }
}

/// Tabular Mimic columns: input headers in order, then metadata keys of the
/// records that are not headers yet, in first-seen order
fn mimic_columns(desc: &InputDescriptor, records: &[SequenceRecord]) -> Vec<Column> {
    let id_header = desc.identifier_header();
    let seq_header = desc.sequence_header();

    let mut columns: Vec<Column> = desc
        .headers()
        .iter()
        .map(|h| {
            if Some(h.as_str()) == id_header {
                Column::Identifier(h.clone())
            } else if Some(h.as_str()) == seq_header {
                Column::Sequence(h.clone())
            } else {
                Column::Field(h.clone())
            }
        })
        .collect();

    for record in records {
        for key in record.metadata.keys() {
            if !columns.iter().any(|c| c.header() == key) {
                columns.push(Column::Field(key.clone()));
            }
        }
    }
    columns
}

/// Writer for any supported output encoding
pub enum SequenceWriter {
    Tabfile(TabfileWriter),
    Fasta(FastaWriter),
}

impl SequenceWriter {
    pub fn write(&mut self, record: &SequenceRecord) -> Result<()> {
        match self {
            SequenceWriter::Tabfile(w) => w.write(record),
            SequenceWriter::Fasta(w) => w.write(record),
        }
    }

    /// Flush and close the underlying file
    pub fn finish(mut self) -> Result<()> {
        match &mut self {
            SequenceWriter::Tabfile(w) => w.flush(),
            SequenceWriter::Fasta(w) => w.flush(),
        }
    }
}

/// Plan the output and open a writer bound to `path`.
///
/// `records` are the records about to be written; their metadata keys
/// complete the tabular Mimic header.
pub fn select_output(
    desc: &InputDescriptor,
    records: &[SequenceRecord],
    options: &OutputOptions,
    path: &Path,
) -> Result<(OutputPlan, SequenceWriter)> {
    let plan = plan_output(desc, options);
    debug!(?plan, path = ?path, "output plan");

    let writer = match (plan.encoding, plan.format) {
        (OutputEncoding::Mimic, FileFormat::Tabfile) => {
            SequenceWriter::Tabfile(TabfileWriter::create(path, mimic_columns(desc, records))?)
        }
        (OutputEncoding::TabularFixed, _) => SequenceWriter::Tabfile(TabfileWriter::create(
            path,
            vec![
                Column::Identifier(FIXED_IDENTIFIER_HEADER.to_string()),
                Column::Sequence(FIXED_SEQUENCE_HEADER.to_string()),
            ],
        )?),
        (_, FileFormat::Fasta) => {
            SequenceWriter::Fasta(FastaWriter::create(path, plan.fasta_layout())?)
        }
        (OutputEncoding::FastaLike, FileFormat::Tabfile) => {
            return Err(RephaseError::invalid_state(
                "FASTA output planned with a tabular file format",
            ))
        }
    };
    Ok((plan, writer))
}

/// Output file that only becomes visible under its final name on commit
pub struct PartialOutput {
    final_path: PathBuf,
    partial_path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    pub fn new(final_path: impl Into<PathBuf>) -> Self {
        let final_path = final_path.into();
        let mut partial = final_path.clone().into_os_string();
        partial.push(".part");
        Self {
            final_path,
            partial_path: PathBuf::from(partial),
            committed: false,
        }
    }

    /// Path writers should write to
    pub fn path(&self) -> &Path {
        &self.partial_path
    }

    /// Move the finished file to its final name
    pub fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.partial_path, &self.final_path)?;
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}
