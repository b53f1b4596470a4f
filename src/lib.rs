//! # Rephase Library
//!
//! Phasing task orchestration for diploid sequence files.
//! Scans tab-delimited and FASTA inputs, runs them through a phasing engine,
//! and reassembles two haplotype records per individual in an output layout
//! derived from the input.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: Sequence records, phased pairs, input descriptors
//! - `error`: Error types and result aliases
//! - `io`: Format scanning, readers/writers, output selection
//! - `model`: Engine boundary and phasing parameters
//! - `pipelines`: Reconciliation, job execution, task controller
//! - `utils`: Telemetry, threading, run directories

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use data::{InputDescriptor, PhasedPair, ScanOutcome, ScanWarning, SequenceRecord, Sequences};
pub use error::{RephaseError, Result};
pub use io::{scan_file, OutputMode, OutputOptions, OutputPlan};
pub use model::{IupacEngine, PhaseParameters, PhasingEngine};
pub use pipelines::{JobResult, TaskController, TaskEvent, TaskState};
