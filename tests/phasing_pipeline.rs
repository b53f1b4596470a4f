use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rephase::data::{PhasedPair, UnphasedSequence, ALLELE_FIELD};
use rephase::io::format::read_sequences;
use rephase::model::{ParamValue, Parameter, PhaseParameters, PhasedStream, PhasingEngine};
use rephase::pipelines::reconcile;
use rephase::utils::telemetry::TelemetryBlackboard;
use rephase::{
    scan_file, IupacEngine, OutputMode, RephaseError, SequenceRecord, TaskController, TaskEvent,
    TaskState,
};

// --- Helpers ---

/// Records what it was called with and answers with fixed pairs
struct ScriptedEngine {
    answer: Vec<PhasedPair>,
    seen: Mutex<Vec<UnphasedSequence>>,
    params: Mutex<Option<PhaseParameters>>,
}

impl ScriptedEngine {
    fn new(answer: Vec<PhasedPair>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            seen: Mutex::new(Vec::new()),
            params: Mutex::new(None),
        })
    }

    fn seen(&self) -> Vec<UnphasedSequence> {
        self.seen.lock().unwrap().clone()
    }

    fn params(&self) -> Option<PhaseParameters> {
        *self.params.lock().unwrap()
    }
}

impl PhasingEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn phase<'a>(
        &'a self,
        input: Vec<UnphasedSequence>,
        params: &PhaseParameters,
        _telemetry: &'a TelemetryBlackboard,
    ) -> rephase::Result<PhasedStream<'a>> {
        *self.seen.lock().unwrap() = input;
        *self.params.lock().unwrap() = Some(*params);
        Ok(Box::new(self.answer.clone().into_iter().map(Ok)))
    }
}

/// Blocks inside its stream until the run is cancelled
struct StallingEngine;

impl PhasingEngine for StallingEngine {
    fn name(&self) -> &str {
        "stalling"
    }

    fn phase<'a>(
        &'a self,
        _input: Vec<UnphasedSequence>,
        _params: &PhaseParameters,
        telemetry: &'a TelemetryBlackboard,
    ) -> rephase::Result<PhasedStream<'a>> {
        let stream = std::iter::once_with(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                telemetry.checkpoint()?;
                thread::sleep(Duration::from_millis(5));
            }
            Err(RephaseError::engine("never cancelled"))
        });
        Ok(Box::new(stream))
    }
}

struct PanickingEngine;

impl PhasingEngine for PanickingEngine {
    fn name(&self) -> &str {
        "panicking"
    }

    fn phase<'a>(
        &'a self,
        _input: Vec<UnphasedSequence>,
        _params: &PhaseParameters,
        _telemetry: &'a TelemetryBlackboard,
    ) -> rephase::Result<PhasedStream<'a>> {
        panic!("engine crashed");
    }
}

fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// All regular files below `root`
fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}

/// Open, accept, start and wait; returns the controller in its final state
fn run_task(engine: Arc<dyn PhasingEngine>, input: &Path, work_root: &Path, mode: OutputMode) -> TaskController {
    let mut task = TaskController::new(engine).with_work_root(work_root);
    task.output.mode = mode;
    task.open(input).unwrap();
    task.wait();
    if task.state() == TaskState::Confirming {
        task.confirm(true).unwrap();
    }
    assert_eq!(task.state(), TaskState::Ready);
    task.start().unwrap();
    task.wait();
    task
}

// --- Reconciliation properties ---

#[test]
fn test_scenario_single_record() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\tspecies\nA1\tACGT\tfoo\n");
    let engine = ScriptedEngine::new(vec![PhasedPair::new("A1", "ACGT", "ACGA")]);

    let mut task = run_task(engine.clone(), &input, &dir.path().join("work"), OutputMode::Mimic);
    assert_eq!(task.state(), TaskState::Done, "{:?}", task.take_error());
    assert_eq!(engine.seen(), vec![UnphasedSequence::new("A1", "ACGT")]);

    let output = &task.result().unwrap().output_path;
    assert_eq!(
        fs::read_to_string(output).unwrap(),
        "seqid\tsequence\tspecies\tallele\nA1\tACGT\tfoo\ta\nA1\tACGA\tfoo\tb\n"
    );
}

#[test]
fn test_output_doubles_input_in_order() {
    let records: Vec<SequenceRecord> = (0..50)
        .map(|i| SequenceRecord::new(format!("s{}", i), "ACRYT"))
        .collect();
    let telemetry = TelemetryBlackboard::new();
    let out = reconcile(
        &records,
        &IupacEngine::new(),
        &PhaseParameters::default(),
        &telemetry,
        '|',
    )
    .unwrap();

    assert_eq!(out.len(), 2 * records.len());
    for (i, pair) in out.chunks(2).enumerate() {
        assert_eq!(pair[0].identifier, records[i].identifier);
        assert_eq!(pair[1].identifier, records[i].identifier);
        assert_eq!(pair[0].field(ALLELE_FIELD), Some("a"));
        assert_eq!(pair[1].field(ALLELE_FIELD), Some("b"));
    }
}

#[test]
fn test_grouped_identifiers_match_on_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.fas", ">A1|foo\nACRT\n>A2|bar\nAYGT\n");

    let task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    assert_eq!(task.state(), TaskState::Done);

    let text = fs::read_to_string(&task.result().unwrap().output_path).unwrap();
    assert_eq!(
        text,
        ">A1_a|foo\nACAT\n>A1_b|foo\nACGT\n>A2_a|bar\nACGT\n>A2_b|bar\nATGT\n"
    );
}

#[test]
fn test_tabular_identifier_with_separator_matches_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1|x\tAR\n");

    let task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    let text = fs::read_to_string(&task.result().unwrap().output_path).unwrap();
    assert_eq!(text, "seqid\tsequence\tallele\nA1|x\tAA\ta\nA1|x\tAG\tb\n");
}

#[test]
fn test_dot_grouped_fasta_with_pipe_in_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.fas", ">A1|x.foo\nAR\n>A2.bar\nAY\n");
    assert_eq!(
        scan_file(&input).unwrap().descriptor.grouping_separator(),
        Some('.')
    );

    let mut task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    assert_eq!(task.state(), TaskState::Done, "{:?}", task.take_error());

    let text = fs::read_to_string(&task.result().unwrap().output_path).unwrap();
    assert_eq!(
        text,
        ">A1|x_a.foo\nAA\n>A1|x_b.foo\nAG\n>A2_a.bar\nAC\n>A2_b.bar\nAT\n"
    );
}

#[test]
fn test_missing_engine_result_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1\tACGT\nA2\tACGT\n");
    let engine = ScriptedEngine::new(vec![PhasedPair::new("A1", "ACGT", "ACGT")]);

    let mut task = run_task(engine, &input, &work, OutputMode::Mimic);
    assert_eq!(task.state(), TaskState::Failed);
    assert!(task.result().is_none());
    match task.take_error() {
        Some(RephaseError::Reconciliation { identifier }) => assert_eq!(identifier, "A2"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(files_under(&work).is_empty());
}

#[test]
fn test_mimic_round_trip_keeps_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "in.tsv",
        "id\tlocality\tseq\tspecies\nA1\tnorth\tACGT\tfoo\nA2\t\tACRT\tbar\n",
    );

    let task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    let output = task.result().unwrap().output_path.clone();

    let original = read_sequences(&scan_file(&input).unwrap().descriptor).unwrap();
    let phased = read_sequences(&scan_file(&output).unwrap().descriptor).unwrap();
    assert_eq!(phased.len(), 2 * original.len());

    for (i, record) in original.iter().enumerate() {
        for (j, tag) in ["a", "b"].iter().enumerate() {
            let out = &phased.records()[2 * i + j];
            assert_eq!(out.identifier, record.identifier);
            let mut expected = record.metadata.clone();
            expected.insert(ALLELE_FIELD.to_string(), Some(tag.to_string()));
            assert_eq!(out.metadata, expected);
        }
    }
}

#[test]
fn test_fasta_concatenates_extra_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "in.tsv",
        "id\tseq\tspecies\tsite\nA1\tACRT\tfoo\tx1\n",
    );

    let mut task = TaskController::new(Arc::new(IupacEngine::new()))
        .with_work_root(dir.path().join("work"));
    task.output.mode = OutputMode::Fasta;
    task.output.fasta_concatenate = true;
    task.output.set_fasta_separator('.').unwrap();
    task.open(&input).unwrap();
    task.wait();
    task.start().unwrap();
    task.wait();

    let text = fs::read_to_string(&task.result().unwrap().output_path).unwrap();
    assert_eq!(text, ">A1_x1_a.foo\nACAT\n>A1_x1_b.foo\nACGT\n");
}

#[test]
fn test_fixed_tabular_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.fas", ">A1.foo\nAR\n");

    let task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Tabfile,
    );
    let output = &task.result().unwrap().output_path;
    assert!(output.to_string_lossy().ends_with("in.phased.tsv"));
    assert_eq!(
        fs::read_to_string(output).unwrap(),
        "seqid\tsequence\nA1\tAA\nA1\tAG\n"
    );
}

// --- Task controller ---

#[test]
fn test_start_refused_without_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "foo\tbar\n1\t2\n");

    let mut task = TaskController::new(Arc::new(IupacEngine::new()))
        .with_work_root(dir.path().join("work"));
    task.open(&input).unwrap();
    task.wait();
    assert!(!task.is_ready());
    assert!(matches!(
        task.start(),
        Err(RephaseError::InvalidInput { .. })
    ));
    assert!(!dir.path().join("work").exists());
}

#[test]
fn test_stop_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1\tACGT\n");

    let mut task = TaskController::new(Arc::new(StallingEngine)).with_work_root(&work);
    task.open(&input).unwrap();
    task.wait();
    task.start().unwrap();
    assert_eq!(task.state(), TaskState::Running);
    assert!(task.open(&input).is_err());

    task.stop().unwrap();
    let events = task.wait();
    assert_eq!(task.state(), TaskState::Stopped);
    assert!(!task.is_busy());
    assert!(events.contains(&TaskEvent::StateChanged(TaskState::Stopped)));
    assert!(files_under(&work).is_empty());
}

#[test]
fn test_engine_panic_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1\tACGT\n");

    let mut task = run_task(
        Arc::new(PanickingEngine),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    assert_eq!(task.state(), TaskState::ErrorReported);
    assert!(matches!(
        task.take_error(),
        Some(RephaseError::WorkerPanic { .. })
    ));

    // The controller stays usable
    task.clear().unwrap();
    assert_eq!(task.state(), TaskState::Idle);
}

#[test]
fn test_save_copies_result_and_open_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1\tACGT\n");

    let mut task = run_task(
        Arc::new(IupacEngine::new()),
        &input,
        &dir.path().join("work"),
        OutputMode::Mimic,
    );
    let destination = task.suggested_results().unwrap();
    assert_eq!(destination, dir.path().join("in.phased.tsv"));

    task.save(&destination).unwrap();
    assert_eq!(
        fs::read(&destination).unwrap(),
        fs::read(&task.result().unwrap().output_path).unwrap()
    );

    task.open(&input).unwrap();
    assert!(task.result().is_none());
    task.wait();
    assert_eq!(task.state(), TaskState::Ready);
}

#[test]
fn test_defaults_bind_at_start() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.tsv", "seqid\tsequence\nA1\tACGT\n");
    let engine = ScriptedEngine::new(vec![PhasedPair::new("A1", "ACGT", "ACGT")]);

    let mut task = TaskController::new(engine.clone()).with_work_root(dir.path().join("work"));
    assert_eq!(task.parameters.effective(), PhaseParameters::default());
    task.parameters
        .set(Parameter::BurnIn, ParamValue::Integer(5))
        .unwrap();
    task.parameters
        .set(Parameter::PhaseThreshold, ParamValue::Real(0.5))
        .unwrap();
    task.open(&input).unwrap();
    task.wait();

    // Edits after open still reach the run
    task.parameters
        .set(Parameter::BurnIn, ParamValue::Integer(7))
        .unwrap();
    task.parameters.unset(Parameter::PhaseThreshold);
    task.start().unwrap();
    let events = task.wait();
    assert!(events
        .iter()
        .any(|e| matches!(e, TaskEvent::Completed(r) if r.output_path.exists())));

    let seen = engine.params().unwrap();
    assert_eq!(seen.burn_in, 7);
    assert_eq!(seen.phase_threshold, 0.9);
    assert_eq!(
        seen,
        PhaseParameters {
            burn_in: 7,
            ..PhaseParameters::default()
        }
    );
}
