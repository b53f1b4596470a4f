//! # Data Module
//!
//! In-memory representations shared by every pipeline stage: sequence
//! records, the engine's phased pairs, and scanned input descriptors.
//!
//! Nothing in here touches the filesystem; readers and writers live in `io`.

pub mod descriptor;
pub mod haplotype;
pub mod sequence;

// Re-export commonly used types
pub use descriptor::{FileFormat, InputDescriptor, Layout, ScanOutcome, ScanWarning};
pub use haplotype::{AlleleTag, PhasedPair, ALLELE_FIELD};
pub use sequence::{Metadata, SequenceRecord, Sequences, UnphasedSequence};
