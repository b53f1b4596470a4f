//! # Phasing Job
//!
//! One end-to-end run over a scanned input:
//! 1. Load records through the input's format handler
//! 2. Reconcile them against the phasing engine
//! 3. Select the output encoding and write the phased records
//!
//! Cancellation is checked before the engine call, before the write, and
//! between written records. The output file only appears under its final
//! name once fully written.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, info_span};

use crate::data::descriptor::DEFAULT_GROUPING_SEPARATOR;
use crate::data::InputDescriptor;
use crate::error::{RephaseError, Result};
use crate::io::format::read_sequences;
use crate::io::output::{output_format, select_output, OutputOptions, PartialOutput};
use crate::io::split_name;
use crate::model::{PhaseParameters, PhasingEngine};
use crate::pipelines::reconcile::reconcile;
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

/// Outcome of a successful run
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    pub output_path: PathBuf,
    pub elapsed_seconds: f64,
}

/// Everything a run needs, fixed at start time
#[derive(Clone, Debug)]
pub struct PhasingJob {
    pub descriptor: InputDescriptor,
    pub params: PhaseParameters,
    pub output: OutputOptions,
    /// Run-exclusive working directory
    pub work_dir: PathBuf,
}

impl PhasingJob {
    /// File name of the result inside the working directory
    pub fn output_file_name(&self) -> String {
        let (stem, _) = split_name(self.descriptor.path());
        let ext = output_format(&self.descriptor, self.output.mode).extension();
        format!("{}.phased{}", stem, ext)
    }

    pub fn run(&self, engine: &dyn PhasingEngine, telemetry: &TelemetryBlackboard) -> Result<JobResult> {
        let start = Instant::now();
        let _span = info_span!("phasing_job", input = ?self.descriptor.path).entered();

        if !self.descriptor.is_valid() {
            return Err(RephaseError::invalid_input(
                self.descriptor
                    .invalid_reason()
                    .unwrap_or_else(|| "input cannot be phased".to_string()),
            ));
        }

        telemetry.set_stage(Stage::LoadingSequences);
        let sequences = read_sequences(&self.descriptor)?;
        info!(name = sequences.name(), records = sequences.len(), "loaded sequences");

        let separator = self
            .descriptor
            .grouping_separator()
            .unwrap_or(DEFAULT_GROUPING_SEPARATOR);
        let phased = reconcile(
            sequences.records(),
            engine,
            &self.params,
            telemetry,
            separator,
        )?;

        telemetry.checkpoint()?;
        telemetry.set_stage(Stage::WritingOutput);
        telemetry.set_total_records(phased.len() as u64);

        let partial = PartialOutput::new(self.work_dir.join(self.output_file_name()));
        let (plan, mut writer) = select_output(&self.descriptor, &phased, &self.output, partial.path())?;
        for record in &phased {
            telemetry.checkpoint()?;
            writer.write(record)?;
            telemetry.add_records(1);
        }
        writer.finish()?;
        let output_path = partial.commit()?;

        telemetry.set_stage(Stage::Complete);
        let elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            output = ?output_path,
            encoding = ?plan.encoding,
            records = phased.len(),
            elapsed_seconds,
            "phasing job complete"
        );
        Ok(JobResult {
            output_path,
            elapsed_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::output::OutputMode;
    use crate::io::scan_file;
    use crate::model::IupacEngine;

    fn job_for(input: &std::path::Path, work_dir: PathBuf, mode: OutputMode) -> PhasingJob {
        PhasingJob {
            descriptor: scan_file(input).unwrap().descriptor,
            params: PhaseParameters::default(),
            output: OutputOptions::new(mode),
            work_dir,
        }
    }

    #[test]
    fn test_tabfile_to_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("samples.tsv");
        std::fs::write(&input, "seqid\tsequence\tspecies\nA1\tACRT\tfoo\n").unwrap();

        let job = job_for(&input, dir.path().to_path_buf(), OutputMode::Fasta);
        assert_eq!(job.output_file_name(), "samples.phased.fas");

        let telemetry = TelemetryBlackboard::new();
        let result = job.run(&IupacEngine::new(), &telemetry).unwrap();
        let text = std::fs::read_to_string(&result.output_path).unwrap();
        assert_eq!(text, ">A1_a|foo\nACAT\n>A1_b|foo\nACGT\n");
        assert_eq!(telemetry.stage(), Stage::Complete);
    }

    #[test]
    fn test_cancelled_job_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("samples.tsv");
        std::fs::write(&input, "seqid\tsequence\nA1\tACGT\n").unwrap();
        let work_dir = dir.path().join("run");
        std::fs::create_dir(&work_dir).unwrap();

        let job = job_for(&input, work_dir.clone(), OutputMode::Mimic);
        let telemetry = TelemetryBlackboard::new();
        telemetry.cancel();
        let err = job.run(&IupacEngine::new(), &telemetry).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
    }
}
