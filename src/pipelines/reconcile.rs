//! # Reconciliation
//!
//! Feeds the input records to a phasing engine and maps the returned allele
//! pairs back onto the original records.
//!
//! The engine's stream is drained into an identifier map before anything is
//! emitted, so output order follows the input regardless of engine order.
//! Each input record yields two records, `allele = a` then `allele = b`,
//! carrying the input metadata with absent values replaced by `""`.
//!
//! ## Identifier lookup
//! 1. The identifier cut at the first `|`, where engines truncate names.
//! 2. The identifier cut at the input's grouping separator, when that is not `|`.
//!
//! Each key is also tried with spaces replaced by `_`, as external engines
//! rewrite them. Duplicate engine identifiers keep the last pair.
//!
//! A record with no match aborts the run with `RephaseError::Reconciliation`.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::data::{AlleleTag, PhasedPair, SequenceRecord, UnphasedSequence, ALLELE_FIELD};
use crate::error::{RephaseError, Result};
use crate::model::{PhaseParameters, PhasingEngine, ENGINE_ID_SEPARATOR};
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

/// Identifier prefix before the first `separator`
pub fn normalize_identifier(identifier: &str, separator: char) -> &str {
    match identifier.split_once(separator) {
        Some((head, _)) => head,
        None => identifier,
    }
}

/// Engine results keyed by identifier. The last pair wins on duplicates.
pub struct PhasedIndex {
    pairs: HashMap<String, PhasedPair>,
}

impl PhasedIndex {
    /// Drain an engine stream. Any `Err` item aborts.
    pub fn collect<I>(stream: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<PhasedPair>>,
    {
        let mut pairs = HashMap::new();
        for item in stream {
            let pair = item?;
            pairs.insert(pair.identifier.clone(), pair);
        }
        Ok(Self { pairs })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pair for an input identifier, see the module docs for the lookup order
    pub fn lookup(&self, identifier: &str, separator: char) -> Option<&PhasedPair> {
        let engine_key = normalize_identifier(identifier, ENGINE_ID_SEPARATOR);
        self.find(engine_key).or_else(|| {
            if separator == ENGINE_ID_SEPARATOR {
                return None;
            }
            self.find(normalize_identifier(identifier, separator))
        })
    }

    fn find(&self, key: &str) -> Option<&PhasedPair> {
        self.pairs.get(key).or_else(|| {
            if key.contains(' ') {
                self.pairs.get(&key.replace(' ', "_"))
            } else {
                None
            }
        })
    }
}

/// Two output records for one input record and its pair
pub fn split_record(record: &SequenceRecord, pair: &PhasedPair) -> [SequenceRecord; 2] {
    AlleleTag::BOTH.map(|tag| {
        let mut metadata = record.metadata.clone();
        metadata.insert(ALLELE_FIELD.to_string(), Some(tag.as_str().to_string()));
        let mut out = SequenceRecord {
            identifier: record.identifier.clone(),
            sequence: pair.allele(tag).to_string(),
            metadata,
        };
        out.fill_missing_metadata();
        out
    })
}

/// Assemble output records from an index, in input order
pub fn assemble(
    records: &[SequenceRecord],
    index: &PhasedIndex,
    separator: char,
) -> Result<Vec<SequenceRecord>> {
    let mut out = Vec::with_capacity(records.len() * 2);
    for record in records {
        let pair = index
            .lookup(&record.identifier, separator)
            .ok_or_else(|| RephaseError::reconciliation(record.identifier.as_str()))?;
        out.extend(split_record(record, pair));
    }
    Ok(out)
}

/// Run the engine over `records` and reconcile its output
#[instrument(skip_all, fields(engine = engine.name(), n_records = records.len()))]
pub fn reconcile(
    records: &[SequenceRecord],
    engine: &dyn PhasingEngine,
    params: &PhaseParameters,
    telemetry: &TelemetryBlackboard,
    separator: char,
) -> Result<Vec<SequenceRecord>> {
    let input: Vec<UnphasedSequence> = records.iter().map(SequenceRecord::to_unphased).collect();

    telemetry.checkpoint()?;
    let stream = engine.phase(input, params, telemetry)?;
    let index = PhasedIndex::collect(stream)?;
    debug!(pairs = index.len(), "engine output materialized");

    telemetry.set_stage(Stage::Reconciling);
    telemetry.set_total_records(records.len() as u64);
    let phased = assemble(records, &index, separator)?;
    telemetry.add_records(records.len() as u64);

    info!(input = records.len(), output = phased.len(), "reconciled");
    Ok(phased)
}
