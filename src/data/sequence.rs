//! # Sequence Records
//!
//! Format-agnostic representation of the records read from an input file and
//! written to an output file.

use std::sync::Arc;

use indexmap::IndexMap;

/// Ordered metadata attached to a record.
///
/// Values are `None` when the source had no cell for the field (short
/// tabular rows). Reconciled records never carry `None`.
pub type Metadata = IndexMap<String, Option<String>>;

/// One named sequence with its metadata
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceRecord {
    pub identifier: String,
    pub sequence: String,
    pub metadata: Metadata,
}

impl SequenceRecord {
    pub fn new(identifier: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            sequence: sequence.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insertion
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), Some(value.into()));
        self
    }

    /// Metadata value as a string slice; absent and missing values are both `None`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_deref())
    }

    /// Replace every absent metadata value with an empty string
    pub fn fill_missing_metadata(&mut self) {
        for value in self.metadata.values_mut() {
            if value.is_none() {
                *value = Some(String::new());
            }
        }
    }

    /// Project to the identifier/sequence pair consumed by the engine
    pub fn to_unphased(&self) -> UnphasedSequence {
        UnphasedSequence {
            identifier: self.identifier.clone(),
            sequence: self.sequence.clone(),
        }
    }
}

/// Engine input unit: an identifier and its unphased genotype sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnphasedSequence {
    pub identifier: String,
    pub sequence: String,
}

impl UnphasedSequence {
    pub fn new(identifier: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            sequence: sequence.into(),
        }
    }
}

/// An ordered, named collection of records
#[derive(Clone, Debug, Default)]
pub struct Sequences {
    name: Arc<str>,
    records: Vec<SequenceRecord>,
}

impl Sequences {
    pub fn new(name: impl Into<Arc<str>>, records: Vec<SequenceRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SequenceRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<SequenceRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a Sequences {
    type Item = &'a SequenceRecord;
    type IntoIter = std::slice::Iter<'a, SequenceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
