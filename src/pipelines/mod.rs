//! # Pipeline Module
//!
//! High-level orchestration of a phasing task.
//! Coordinates scanning, reconciliation against the engine, and output.

pub mod job;
pub mod reconcile;
pub mod task;

pub use job::{JobResult, PhasingJob};
pub use reconcile::reconcile;
pub use task::{Notification, NotificationLevel, TaskController, TaskEvent, TaskState};
