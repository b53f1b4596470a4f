//! # Rephase: Diploid Sequence Phasing Tasks
//!
//! Scans an input, phases it, and saves one record per haplotype.
//!
//! ## Usage
//! ```bash
//! # Same format as the input
//! rephase --input samples.tsv
//!
//! # FASTA output with extra columns folded into identifiers
//! rephase --input samples.tsv --format fasta --concatenate --out samples.fas
//!
//! # With profiling output
//! rephase --input samples.fas --profile
//! ```

use std::sync::Arc;
use std::time::Instant;

use rephase::config::Config;
use rephase::pipelines::{Notification, NotificationLevel, TaskController, TaskEvent, TaskState};
use rephase::utils::telemetry::{HeartbeatConfig, HeartbeatHandle};
use rephase::utils::threading::build_global_pool;
use rephase::{IupacEngine, RephaseError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for hierarchical profiling output
fn init_profiling() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_events(events: &[TaskEvent]) {
    for event in events {
        match event {
            TaskEvent::Notification(Notification {
                level,
                title,
                message,
            }) => {
                let tag = match level {
                    NotificationLevel::Info => "INFO",
                    NotificationLevel::Warning => "WARN",
                    NotificationLevel::Error => "ERROR",
                };
                eprintln!("[{}] {}: {}", tag, title, message);
            }
            TaskEvent::ConfirmationRequired(warnings) => {
                eprintln!("Scan reported {} warning(s):", warnings.len());
                for warning in warnings {
                    eprintln!("  - {}", warning);
                }
            }
            TaskEvent::StateChanged(_) | TaskEvent::Completed(_) => {}
        }
    }
}

/// Error for a task that ended anywhere but `Done`
fn task_error(controller: &mut TaskController) -> RephaseError {
    controller.take_error().unwrap_or_else(|| {
        RephaseError::invalid_state(format!("task ended in state {:?}", controller.state()))
    })
}

fn run() -> Result<()> {
    let start = Instant::now();

    // Parse and validate configuration
    let config = Config::parse_and_validate()?;

    // Initialize profiling if requested
    if config.profile {
        init_profiling();
        eprintln!("=== Profiling enabled ===\n");
    }

    // Configure thread pool
    let n_threads = config.nthreads();
    build_global_pool(n_threads)?;

    eprintln!("Rephase v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", n_threads);
    eprintln!("Input: {:?}", config.input);

    let mut controller =
        TaskController::new(Arc::new(IupacEngine::new())).with_work_root(config.work_root());
    controller.parameters = config.parameter_set()?;
    controller.output = config.output_options()?;

    // Scan
    controller.open(&config.input)?;
    let events = controller.wait();
    print_events(&events);

    if controller.state() == TaskState::Confirming {
        if config.yes {
            eprintln!("Accepting input despite warnings (--yes)");
            controller.confirm(true)?;
        } else {
            controller.confirm(false)?;
            return Err(RephaseError::invalid_input(
                "scan reported warnings; rerun with --yes to accept them",
            ));
        }
    }
    if controller.state() != TaskState::Ready {
        return Err(task_error(&mut controller));
    }

    // An explicit separator wins over the one adopted from the input
    if let Some(sep) = config.separator {
        controller.output.set_fasta_separator(sep)?;
    }

    if let Some(desc) = controller.descriptor() {
        eprintln!(
            "Format: {} ({} bytes){}",
            desc.format(),
            desc.byte_size,
            if desc.has_grouping() { ", grouped" } else { "" }
        );
    }
    if config.scan_only {
        return Ok(());
    }

    // Run
    controller.start()?;
    let heartbeat = match controller.telemetry() {
        Some(telemetry) => Some(HeartbeatHandle::spawn(telemetry, HeartbeatConfig::default())?),
        None => None,
    };
    let events = controller.wait();
    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown();
    }
    print_events(&events);

    if controller.state() != TaskState::Done {
        return Err(task_error(&mut controller));
    }

    // Save
    let destination = match config.out.clone().or_else(|| controller.suggested_results()) {
        Some(path) => path,
        None => return Err(RephaseError::invalid_state("no destination for results")),
    };
    controller.save(&destination)?;
    print_events(&controller.poll());

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
