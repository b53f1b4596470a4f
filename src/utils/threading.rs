//! # Threading
//!
//! ## Role
//! - Size the global rayon pool used for data-parallel work.
//! - Run slow operations as a single background unit on a named thread,
//!   reporting back to the supervising thread over a channel.
//!
//! A unit that panics is caught and reported as [`UnitOutcome::Panicked`]
//! instead of tearing down the supervisor.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::error::{RephaseError, Result};

/// Configure the global rayon pool. Fails if it was already built.
pub fn build_global_pool(n_threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("rephase-worker-{}", i))
        .build_global()
        .map_err(|e| RephaseError::config(format!("Failed to create thread pool: {}", e)))
}

/// Default thread count: all available cores
pub fn available_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// How a background unit ended
#[derive(Debug)]
pub enum UnitOutcome<T> {
    Finished(Result<T>),
    Panicked(String),
}

/// Handle to one running background unit
pub struct BackgroundUnit<T> {
    name: String,
    receiver: Receiver<UnitOutcome<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> BackgroundUnit<T> {
    /// Start `work` on a thread named `rephase-<name>`
    pub fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("rephase-{}", name))
            .spawn(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
                    Ok(result) => UnitOutcome::Finished(result),
                    Err(payload) => UnitOutcome::Panicked(panic_message(payload.as_ref())),
                };
                // Receiver gone means the supervisor no longer cares
                let _ = sender.send(outcome);
            })?;

        Ok(Self {
            name: name.to_string(),
            receiver,
            handle: Some(handle),
        })
    }
}

impl<T> BackgroundUnit<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking check for the unit's report
    pub fn try_outcome(&mut self) -> Option<UnitOutcome<T>> {
        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(UnitOutcome::Panicked(
                    "worker exited without reporting".to_string(),
                ))
            }
        }
    }

    /// Block until the unit reports
    pub fn wait(&mut self) -> UnitOutcome<T> {
        let outcome = self.receiver.recv().unwrap_or_else(|_| {
            UnitOutcome::Panicked("worker exited without reporting".to_string())
        });
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
