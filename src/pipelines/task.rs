//! # Task Controller
//!
//! Owns one phasing task and drives it through its states:
//!
//! ```text
//! Idle -> Scanning -> (Confirming) -> Ready -> Running -> Done
//!                                                      -> Failed
//!                                                      -> Stopped
//!                                                      -> ErrorReported
//! ```
//!
//! `open` and `clear` return to the start. Slow work (scan, run) happens in a
//! single background unit; the supervising thread calls [`TaskController::poll`]
//! or [`TaskController::wait`] to collect its report as [`TaskEvent`]s.
//!
//! Parameter defaults are resolved at `start`, never earlier.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::data::{InputDescriptor, ScanOutcome, ScanWarning};
use crate::error::{RephaseError, Result};
use crate::io::output::{output_format, OutputOptions};
use crate::io::{scan_file, split_name};
use crate::model::{ParameterSet, PhasingEngine};
use crate::pipelines::job::{JobResult, PhasingJob};
use crate::utils::telemetry::{format_duration, TelemetryBlackboard};
use crate::utils::threading::{BackgroundUnit, UnitOutcome};
use crate::utils::workspace::{default_root, RunDirectory};

/// Task lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Scanning,
    Confirming,
    Ready,
    Running,
    Done,
    Failed,
    Stopped,
    ErrorReported,
}

impl TaskState {
    /// True while a background unit is pending
    pub fn is_busy(self) -> bool {
        matches!(self, TaskState::Scanning | TaskState::Running)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing message about a finished operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(level: NotificationLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Something the supervisor should react to
#[derive(Clone, Debug, PartialEq)]
pub enum TaskEvent {
    StateChanged(TaskState),
    /// Scan finished with warnings; answer with [`TaskController::confirm`]
    ConfirmationRequired(Vec<ScanWarning>),
    Completed(JobResult),
    Notification(Notification),
}

enum PendingUnit {
    Scan(BackgroundUnit<ScanOutcome>),
    Job {
        unit: BackgroundUnit<JobResult>,
        telemetry: Arc<TelemetryBlackboard>,
    },
}

/// State machine owning one phasing task
pub struct TaskController {
    state: TaskState,
    engine: Arc<dyn PhasingEngine>,
    work_root: PathBuf,

    /// User parameter values; unset entries resolve at `start`
    pub parameters: ParameterSet,
    /// Output options, editable until `start`
    pub output: OutputOptions,

    descriptor: Option<InputDescriptor>,
    pending_scan: Option<ScanOutcome>,
    result: Option<JobResult>,
    error: Option<RephaseError>,

    unit: Option<PendingUnit>,
    telemetry: Option<Arc<TelemetryBlackboard>>,
    events: VecDeque<TaskEvent>,
}

impl TaskController {
    pub fn new(engine: Arc<dyn PhasingEngine>) -> Self {
        Self {
            state: TaskState::Idle,
            engine,
            work_root: default_root(),
            parameters: ParameterSet::new(),
            output: OutputOptions::default(),
            descriptor: None,
            pending_scan: None,
            result: None,
            error: None,
            unit: None,
            telemetry: None,
            events: VecDeque::new(),
        }
    }

    /// Root under which run directories are created
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    // === Accessors ===

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.unit.is_some()
    }

    /// A start would be accepted
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready && self.descriptor.as_ref().is_some_and(|d| d.is_valid())
    }

    pub fn descriptor(&self) -> Option<&InputDescriptor> {
        self.descriptor.as_ref()
    }

    /// Warnings awaiting a decision in `Confirming`
    pub fn pending_warnings(&self) -> &[ScanWarning] {
        self.pending_scan
            .as_ref()
            .map(|s| s.warnings.as_slice())
            .unwrap_or(&[])
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Error behind the last `Failed` or `ErrorReported` state
    pub fn take_error(&mut self) -> Option<RephaseError> {
        self.error.take()
    }

    /// Telemetry of the current or last run
    pub fn telemetry(&self) -> Option<Arc<TelemetryBlackboard>> {
        self.telemetry.clone()
    }

    /// Default save location: `<input stem>.phased<ext>` next to the input
    pub fn suggested_results(&self) -> Option<PathBuf> {
        let desc = self.descriptor.as_ref()?;
        let (stem, _) = split_name(desc.path());
        let ext = output_format(desc, self.output.mode).extension();
        let name = format!("{}.phased{}", stem, ext);
        Some(match desc.path().parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        })
    }

    // === Transitions ===

    fn set_state(&mut self, state: TaskState) {
        if self.state != state {
            self.state = state;
            self.events.push_back(TaskEvent::StateChanged(state));
        }
    }

    fn notify(&mut self, level: NotificationLevel, title: &str, message: impl Into<String>) {
        self.events
            .push_back(TaskEvent::Notification(Notification::new(level, title, message)));
    }

    fn ensure_idle_unit(&self) -> Result<()> {
        match &self.unit {
            Some(PendingUnit::Scan(_)) => Err(RephaseError::invalid_state("a scan is in progress")),
            Some(PendingUnit::Job { .. }) => {
                Err(RephaseError::invalid_state("a phasing run is in progress"))
            }
            None => Ok(()),
        }
    }

    /// Select a new input: clears the previous result and scans in the background
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_idle_unit()?;
        self.reset();

        let path = path.as_ref().to_path_buf();
        info!(path = ?path, "opening input");
        let unit = BackgroundUnit::spawn("scan", move || scan_file(&path))?;
        self.unit = Some(PendingUnit::Scan(unit));
        self.set_state(TaskState::Scanning);
        Ok(())
    }

    /// Answer a pending confirmation: accept the warned input or drop it
    pub fn confirm(&mut self, accept: bool) -> Result<()> {
        if self.state != TaskState::Confirming {
            return Err(RephaseError::invalid_state(format!(
                "no confirmation pending in state {:?}",
                self.state
            )));
        }
        let outcome = self
            .pending_scan
            .take()
            .ok_or_else(|| RephaseError::invalid_state("confirmation without scan result"))?;

        if accept {
            self.accept_input(outcome.descriptor);
        } else {
            self.descriptor = None;
            self.set_state(TaskState::Idle);
        }
        Ok(())
    }

    /// Start a run over the accepted input
    pub fn start(&mut self) -> Result<()> {
        self.ensure_idle_unit()?;
        if self.state != TaskState::Ready {
            return Err(RephaseError::invalid_state(format!(
                "cannot start from state {:?}",
                self.state
            )));
        }
        let descriptor = match &self.descriptor {
            Some(d) if d.is_valid() => d.clone(),
            Some(d) => {
                return Err(RephaseError::invalid_input(
                    d.invalid_reason()
                        .unwrap_or_else(|| "input cannot be phased".to_string()),
                ))
            }
            None => return Err(RephaseError::invalid_input("no input selected")),
        };

        let params = self.parameters.effective();
        let run_dir = RunDirectory::create(&self.work_root)?;
        let job = PhasingJob {
            descriptor,
            params,
            output: self.output.clone(),
            work_dir: run_dir.into_path(),
        };
        info!(work_dir = ?job.work_dir, ?params, "starting phasing run");

        let telemetry = TelemetryBlackboard::new();
        let engine = Arc::clone(&self.engine);
        let bb = Arc::clone(&telemetry);
        let unit = BackgroundUnit::spawn("phase", move || job.run(engine.as_ref(), &bb))?;

        self.result = None;
        self.error = None;
        self.telemetry = Some(Arc::clone(&telemetry));
        self.unit = Some(PendingUnit::Job { unit, telemetry });
        self.set_state(TaskState::Running);
        Ok(())
    }

    /// Ask the running job to stop at its next safe point
    pub fn stop(&mut self) -> Result<()> {
        match &self.unit {
            Some(PendingUnit::Job { telemetry, .. }) => {
                telemetry.cancel();
                info!("stop requested");
                Ok(())
            }
            _ => Err(RephaseError::invalid_state("no phasing run to stop")),
        }
    }

    /// Drop input and result and return to `Idle`
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_idle_unit()?;
        self.reset();
        self.set_state(TaskState::Idle);
        Ok(())
    }

    fn reset(&mut self) {
        self.descriptor = None;
        self.pending_scan = None;
        self.result = None;
        self.error = None;
    }

    /// Copy the result byte-for-byte to `destination`
    pub fn save(&mut self, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| RephaseError::invalid_state("no results to save"))?;
        fs::copy(&result.output_path, destination)?;
        info!(destination = ?destination, "results saved");
        self.notify(
            NotificationLevel::Info,
            "Results saved",
            format!("Saved results to {}", destination.display()),
        );
        Ok(())
    }

    // === Unit reports ===

    /// Collect the background unit's report if it is ready; never blocks
    pub fn poll(&mut self) -> Vec<TaskEvent> {
        let finished = match &mut self.unit {
            Some(PendingUnit::Scan(unit)) => unit.try_outcome().map(UnitReport::Scan),
            Some(PendingUnit::Job { unit, .. }) => unit.try_outcome().map(UnitReport::Job),
            None => None,
        };
        if let Some(report) = finished {
            self.handle_report(report);
        }
        self.events.drain(..).collect()
    }

    /// Block until the pending unit (if any) reports
    pub fn wait(&mut self) -> Vec<TaskEvent> {
        let report = match &mut self.unit {
            Some(PendingUnit::Scan(unit)) => Some(UnitReport::Scan(unit.wait())),
            Some(PendingUnit::Job { unit, .. }) => Some(UnitReport::Job(unit.wait())),
            None => None,
        };
        if let Some(report) = report {
            self.handle_report(report);
        }
        self.events.drain(..).collect()
    }

    fn handle_report(&mut self, report: UnitReport) {
        // Busy indicators clear on every exit path
        let pending = self.unit.take();

        match report {
            UnitReport::Scan(outcome) => self.on_scan_done(outcome),
            UnitReport::Job(outcome) => {
                let cancelled = match &pending {
                    Some(PendingUnit::Job { telemetry, .. }) => telemetry.is_cancelled(),
                    _ => false,
                };
                self.on_job_done(outcome, cancelled);
            }
        }
    }

    fn accept_input(&mut self, descriptor: InputDescriptor) {
        self.output.follow_input(&descriptor);
        if let Some(reason) = descriptor.invalid_reason() {
            self.notify(NotificationLevel::Warning, "Input not usable", reason);
        }
        self.descriptor = Some(descriptor);
        self.set_state(TaskState::Ready);
    }

    fn on_scan_done(&mut self, outcome: UnitOutcome<ScanOutcome>) {
        match outcome {
            UnitOutcome::Finished(Ok(scan)) if scan.is_clean() => {
                self.accept_input(scan.descriptor);
            }
            UnitOutcome::Finished(Ok(scan)) => {
                warn!(warnings = scan.warnings.len(), "scan reported warnings");
                self.events
                    .push_back(TaskEvent::ConfirmationRequired(scan.warnings.clone()));
                self.pending_scan = Some(scan);
                self.set_state(TaskState::Confirming);
            }
            UnitOutcome::Finished(Err(e)) => {
                self.notify(NotificationLevel::Error, "Failed to open file", e.to_string());
                self.error = Some(e);
                self.set_state(TaskState::Failed);
            }
            UnitOutcome::Panicked(message) => self.on_panic(message),
        }
    }

    fn on_job_done(&mut self, outcome: UnitOutcome<JobResult>, cancelled: bool) {
        match outcome {
            UnitOutcome::Finished(Ok(result)) if cancelled => {
                // Stop arrived after the last checkpoint; discard the output
                let _ = fs::remove_file(&result.output_path);
                self.on_stopped();
            }
            UnitOutcome::Finished(Ok(result)) => {
                info!(output = ?result.output_path, "phasing run finished");
                self.notify(
                    NotificationLevel::Info,
                    "Phasing completed",
                    format!(
                        "Time taken: {}",
                        format_duration(result.elapsed_seconds)
                    ),
                );
                self.events.push_back(TaskEvent::Completed(result.clone()));
                self.result = Some(result);
                self.set_state(TaskState::Done);
            }
            UnitOutcome::Finished(Err(e)) if e.is_cancelled() => self.on_stopped(),
            UnitOutcome::Finished(Err(e)) => {
                warn!(error = %e, "phasing run failed");
                self.notify(NotificationLevel::Error, "Phasing failed", e.to_string());
                self.error = Some(e);
                self.set_state(TaskState::Failed);
            }
            UnitOutcome::Panicked(message) => self.on_panic(message),
        }
    }

    fn on_stopped(&mut self) {
        self.notify(NotificationLevel::Warning, "Phasing stopped", "Cancelled by user");
        self.set_state(TaskState::Stopped);
    }

    fn on_panic(&mut self, message: String) {
        warn!(%message, "background task panicked");
        self.notify(NotificationLevel::Error, "Unexpected error", message.clone());
        self.error = Some(RephaseError::WorkerPanic { message });
        self.set_state(TaskState::ErrorReported);
    }
}

enum UnitReport {
    Scan(UnitOutcome<ScanOutcome>),
    Job(UnitOutcome<JobResult>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IupacEngine;

    fn controller(root: &Path) -> TaskController {
        TaskController::new(Arc::new(IupacEngine::new())).with_work_root(root.join("work"))
    }

    #[test]
    fn test_clean_scan_reaches_ready() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        fs::write(&input, "seqid\tsequence\nA1\tACGT\n").unwrap();

        let mut task = controller(dir.path());
        task.open(&input).unwrap();
        assert_eq!(task.state(), TaskState::Scanning);
        assert!(task.is_busy());

        let events = task.wait();
        assert_eq!(events.last(), Some(&TaskEvent::StateChanged(TaskState::Ready)));
        assert!(task.is_ready());
        assert!(!task.is_busy());
    }

    #[test]
    fn test_warnings_require_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        fs::write(&input, "seqid\tsequence\nA1\tACGT\nA1\tACG\n").unwrap();

        let mut task = controller(dir.path());
        task.open(&input).unwrap();
        let events = task.wait();
        assert!(events
            .iter()
            .any(|e| matches!(e, TaskEvent::ConfirmationRequired(w) if w.len() == 2)));
        assert_eq!(task.state(), TaskState::Confirming);
        assert!(task.start().is_err());

        task.confirm(false).unwrap();
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.descriptor().is_none());
    }

    #[test]
    fn test_operations_refused_in_wrong_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = controller(dir.path());
        assert!(matches!(task.start(), Err(RephaseError::InvalidState { .. })));
        assert!(task.stop().is_err());
        assert!(task.confirm(true).is_err());
        assert!(task.save(dir.path().join("x")).is_err());
        assert!(task.wait().is_empty());
    }

    #[test]
    fn test_fasta_input_sets_output_separator() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fas");
        fs::write(&input, ">A1.foo\nACGT\n>A2.bar\nACGT\n").unwrap();

        let mut task = controller(dir.path());
        task.open(&input).unwrap();
        task.wait();
        assert_eq!(task.output.fasta_separator(), '.');
        assert_eq!(
            task.suggested_results(),
            Some(dir.path().join("in.phased.fas"))
        );
    }

    #[test]
    fn test_missing_file_fails_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = controller(dir.path());
        task.open(dir.path().join("nope.tsv")).unwrap();
        task.wait();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(matches!(
            task.take_error(),
            Some(RephaseError::FileNotFound { .. })
        ));
    }
}
