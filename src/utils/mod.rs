//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `telemetry`: Run-scoped progress, cancellation and heartbeat output
//! - `threading`: Rayon pool configuration and background units
//! - `workspace`: Timestamped run working directories

pub mod telemetry;
pub mod threading;
pub mod workspace;
