//! # Phasing Engine Boundary
//!
//! The engine accepts `(identifier, sequence)` records plus resolved
//! parameters and yields one [`PhasedPair`] per record. Output is a lazy
//! stream: it need not follow input order and need not cover every input.
//!
//! Progress and cancellation flow through the run's
//! [`TelemetryBlackboard`], passed in at call time.
//!
//! [`IupacEngine`] is a deterministic engine that splits two-base IUPAC
//! ambiguity codes into the two haplotypes. It follows the identifier
//! conventions of the external statistical engine (spaces become `_`,
//! identifiers are cut at the first `|`) so the reconciliation path sees the
//! same identifier drift.

use tracing::{debug, info_span};

use crate::data::{PhasedPair, UnphasedSequence};
use crate::error::{RephaseError, Result};
use crate::model::parameters::PhaseParameters;
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

/// Lazy sequence of engine results
pub type PhasedStream<'a> = Box<dyn Iterator<Item = Result<PhasedPair>> + Send + 'a>;

/// A phasing engine
pub trait PhasingEngine: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Phase `input`. Failures surface either as the returned `Err` or as an
    /// `Err` item in the stream.
    fn phase<'a>(
        &'a self,
        input: Vec<UnphasedSequence>,
        params: &PhaseParameters,
        telemetry: &'a TelemetryBlackboard,
    ) -> Result<PhasedStream<'a>>;
}

/// Engines drop everything from the first occurrence of this character
pub const ENGINE_ID_SEPARATOR: char = '|';

/// Identifier as rewritten by the external engine
pub fn engine_identifier(identifier: &str) -> String {
    let replaced = identifier.replace(' ', "_");
    match replaced.split_once(ENGINE_ID_SEPARATOR) {
        Some((head, _)) => head.to_string(),
        None => replaced,
    }
}

/// Resolve one IUPAC code into its two bases, lexicographic base first
fn split_code(code: char) -> Option<(char, char)> {
    let upper = code.to_ascii_uppercase();
    let pair = match upper {
        'A' | 'C' | 'G' | 'T' | 'U' | 'N' | 'B' | 'D' | 'H' | 'V' | '-' | '?' => (upper, upper),
        'R' => ('A', 'G'),
        'Y' => ('C', 'T'),
        'S' => ('C', 'G'),
        'W' => ('A', 'T'),
        'K' => ('G', 'T'),
        'M' => ('A', 'C'),
        _ => return None,
    };
    if code.is_ascii_lowercase() {
        Some((pair.0.to_ascii_lowercase(), pair.1.to_ascii_lowercase()))
    } else {
        Some(pair)
    }
}

/// Deterministic ambiguity-code splitter
#[derive(Clone, Copy, Debug, Default)]
pub struct IupacEngine;

impl IupacEngine {
    pub fn new() -> Self {
        Self
    }

    fn phase_one(record: UnphasedSequence) -> Result<PhasedPair> {
        let mut allele_a = String::with_capacity(record.sequence.len());
        let mut allele_b = String::with_capacity(record.sequence.len());
        for (pos, code) in record.sequence.chars().enumerate() {
            let (a, b) = split_code(code).ok_or_else(|| {
                RephaseError::engine(format!(
                    "unsupported character '{}' at position {} of \"{}\"",
                    code,
                    pos + 1,
                    record.identifier
                ))
            })?;
            allele_a.push(a);
            allele_b.push(b);
        }
        Ok(PhasedPair {
            identifier: engine_identifier(&record.identifier),
            allele_a,
            allele_b,
        })
    }
}

impl PhasingEngine for IupacEngine {
    fn name(&self) -> &str {
        "iupac"
    }

    fn phase<'a>(
        &'a self,
        input: Vec<UnphasedSequence>,
        params: &PhaseParameters,
        telemetry: &'a TelemetryBlackboard,
    ) -> Result<PhasedStream<'a>> {
        let _span = info_span!("engine_phase", engine = self.name(), n = input.len()).entered();
        debug!(?params, "engine parameters");

        telemetry.report(Stage::ComputingMatrix, 0, 1);
        if let Some(bad) = input.iter().find(|r| r.identifier.trim().is_empty()) {
            return Err(RephaseError::engine(format!(
                "empty identifier for sequence of length {}",
                bad.sequence.len()
            )));
        }
        telemetry.report(Stage::ComputingMatrix, 1, 1);

        let total = input.len() as u64;
        telemetry.report(Stage::McmcResolution, 0, total);

        let stream = input.into_iter().enumerate().map(move |(i, record)| {
            telemetry.checkpoint()?;
            let pair = Self::phase_one(record);
            telemetry.report(Stage::McmcResolution, i as u64 + 1, total);
            pair
        });
        Ok(Box::new(stream))
    }
}
