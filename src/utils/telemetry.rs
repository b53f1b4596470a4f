//! # Telemetry Blackboard
//!
//! Run-scoped progress tracking and cancellation for phasing jobs.
//! One blackboard is created per run and handed to the engine at call time;
//! there is no process-wide progress hook.
//!
//! The blackboard pattern decouples work execution from progress reporting:
//! - The background unit and the engine update atomic counters
//! - The supervising thread (or a heartbeat thread) reads snapshots

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{RephaseError, Result};

/// Processing stage for high-level progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    Scanning = 1,
    LoadingSequences = 2,
    ComputingMatrix = 3,
    McmcResolution = 4,
    Reconciling = 5,
    WritingOutput = 6,
    Complete = 7,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::Scanning => "Scanning",
            Stage::LoadingSequences => "Loading sequences",
            Stage::ComputingMatrix => "Computing matrix Q",
            Stage::McmcResolution => "MCMC resolution",
            Stage::Reconciling => "Reconciling",
            Stage::WritingOutput => "Writing output",
            Stage::Complete => "Complete",
        }
    }

    fn from_u64(val: u64) -> Self {
        match val {
            0 => Stage::Initializing,
            1 => Stage::Scanning,
            2 => Stage::LoadingSequences,
            3 => Stage::ComputingMatrix,
            4 => Stage::McmcResolution,
            5 => Stage::Reconciling,
            6 => Stage::WritingOutput,
            _ => Stage::Complete,
        }
    }
}

/// Progress and stop signal shared between one run and its observers.
///
/// Counters use relaxed ordering since observers only need eventual
/// visibility. The cancel flag uses SeqCst.
pub struct TelemetryBlackboard {
    stage: AtomicU64,

    // --- Step progress within the current stage ---
    step_value: AtomicU64,
    step_total: AtomicU64,

    // --- Record counters ---
    records_processed: AtomicU64,
    total_records: AtomicU64,

    // --- Timing ---
    start_time: Instant,
    last_progress_nanos: AtomicU64,

    // --- Control ---
    cancelled: AtomicBool,
    shutdown: AtomicBool,
}

impl TelemetryBlackboard {
    /// Create a new telemetry blackboard
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // === Stage Updates ===

    #[inline]
    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u64, Ordering::Relaxed);
        self.step_value.store(0, Ordering::Relaxed);
        self.step_total.store(0, Ordering::Relaxed);
        self.touch_progress();
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        Stage::from_u64(self.stage.load(Ordering::Relaxed))
    }

    /// Engine progress callback: `value` of `total` steps done in `stage`
    pub fn report(&self, stage: Stage, value: u64, total: u64) {
        self.stage.store(stage as u64, Ordering::Relaxed);
        self.step_value.store(value, Ordering::Relaxed);
        self.step_total.store(total, Ordering::Relaxed);
        self.touch_progress();
    }

    pub fn set_total_records(&self, total: u64) {
        self.total_records.store(total, Ordering::Relaxed);
        self.records_processed.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_records(&self, n: u64) {
        self.records_processed.fetch_add(n, Ordering::Relaxed);
        self.touch_progress();
    }

    // === Cancellation ===

    /// Ask the run to stop at its next safe point
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Safe-point check: `Err(Cancelled)` once a stop was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RephaseError::Cancelled)
        } else {
            Ok(())
        }
    }

    // === Timing ===

    #[inline]
    fn touch_progress(&self) {
        let elapsed = self.start_time.elapsed().as_nanos() as u64;
        self.last_progress_nanos.store(elapsed, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    // === Snapshot for observers ===

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stage: self.stage(),
            step_value: self.step_value.load(Ordering::Relaxed),
            step_total: self.step_total.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            total_records: self.total_records.load(Ordering::Relaxed),
            elapsed_secs: self.elapsed_secs(),
            last_progress_nanos: self.last_progress_nanos.load(Ordering::Relaxed),
            current_nanos: self.start_time.elapsed().as_nanos() as u64,
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Default for TelemetryBlackboard {
    fn default() -> Self {
        Self {
            stage: AtomicU64::new(Stage::Initializing as u64),
            step_value: AtomicU64::new(0),
            step_total: AtomicU64::new(0),
            records_processed: AtomicU64::new(0),
            total_records: AtomicU64::new(0),
            start_time: Instant::now(),
            last_progress_nanos: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Snapshot of telemetry state at a point in time
#[derive(Clone, Debug)]
pub struct TelemetrySnapshot {
    pub stage: Stage,
    pub step_value: u64,
    pub step_total: u64,
    pub records_processed: u64,
    pub total_records: u64,
    pub elapsed_secs: f64,
    last_progress_nanos: u64,
    current_nanos: u64,
}

impl TelemetrySnapshot {
    /// Fraction of the current stage completed, 0.0 when unknown
    pub fn fraction(&self) -> f64 {
        if self.step_total > 0 {
            (self.step_value as f64 / self.step_total as f64).min(1.0)
        } else if self.total_records > 0 {
            (self.records_processed as f64 / self.total_records as f64).min(1.0)
        } else {
            0.0
        }
    }

    fn stalled_secs(&self) -> u64 {
        self.current_nanos.saturating_sub(self.last_progress_nanos) / 1_000_000_000
    }
}

/// Heartbeat output configuration
pub struct HeartbeatConfig {
    /// Interval between heartbeats (seconds)
    pub interval_secs: u64,
    /// Stall warning threshold (seconds with no progress)
    pub stall_threshold_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            stall_threshold_secs: 300, // 5 minutes
        }
    }
}

/// Handle to the heartbeat thread
pub struct HeartbeatHandle {
    handle: Option<JoinHandle<()>>,
    blackboard: Arc<TelemetryBlackboard>,
}

impl HeartbeatHandle {
    /// Spawn the heartbeat thread
    pub fn spawn(blackboard: Arc<TelemetryBlackboard>, config: HeartbeatConfig) -> Result<Self> {
        let bb = blackboard.clone();
        let is_tty = io::stderr().is_terminal();

        let handle = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || {
                heartbeat_loop(bb, config, is_tty);
            })?;

        Ok(Self {
            handle: Some(handle),
            blackboard,
        })
    }

    /// Signal shutdown and wait for thread to finish
    pub fn shutdown(mut self) {
        self.blackboard.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.blackboard.signal_shutdown();
        // Don't block in drop - just signal shutdown
    }
}

/// Format duration in human-readable form
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{:.0}m{:.0}s", mins, remaining_secs)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Main heartbeat loop
fn heartbeat_loop(bb: Arc<TelemetryBlackboard>, config: HeartbeatConfig, is_tty: bool) {
    let tick = Duration::from_millis(100);
    let interval = Duration::from_secs(config.interval_secs.max(1));
    let mut last_beat = Instant::now();

    // Sleep in short ticks so shutdown is observed promptly
    while !bb.is_shutdown() {
        thread::sleep(tick);
        if last_beat.elapsed() < interval {
            continue;
        }
        last_beat = Instant::now();

        let snap = bb.snapshot();
        let is_stalled = snap.stalled_secs() > config.stall_threshold_secs;

        if is_tty {
            print_tty_progress(&snap, is_stalled);
        } else {
            print_log_progress(&snap, is_stalled);
        }
    }

    // Clear TTY line on shutdown
    if is_tty {
        eprint!("\r\x1b[K");
        let _ = io::stderr().flush();
    }
}

/// Print progress for TTY (rewriting single line)
fn print_tty_progress(snap: &TelemetrySnapshot, is_stalled: bool) {
    let pct = snap.fraction() * 100.0;

    let bar_width = 20;
    let filled = ((pct / 100.0) * bar_width as f64) as usize;
    let bar: String =
        "=".repeat(filled.min(bar_width)) + &" ".repeat(bar_width.saturating_sub(filled));

    let records_str = if snap.total_records > 0 {
        format!(" | R{}/{}", snap.records_processed, snap.total_records)
    } else {
        String::new()
    };
    let stall_str = if is_stalled { " [STALLED]" } else { "" };

    eprint!(
        "\r[{}] {:>5.1}% | {}{} | {}{}    \x1b[K",
        bar,
        pct,
        snap.stage.as_str(),
        records_str,
        format_duration(snap.elapsed_secs),
        stall_str
    );
    let _ = io::stderr().flush();
}

/// Print progress for non-TTY (structured log line)
fn print_log_progress(snap: &TelemetrySnapshot, is_stalled: bool) {
    eprintln!(
        "[HEARTBEAT] stage=\"{}\" step={}/{} records={}/{} elapsed={:.0}s stalled={}",
        snap.stage.as_str(),
        snap.step_value,
        snap.step_total,
        snap.records_processed,
        snap.total_records,
        snap.elapsed_secs,
        is_stalled
    );
}
