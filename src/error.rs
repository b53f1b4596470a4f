//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Rephase operations
#[derive(Error, Debug)]
pub enum RephaseError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tab-delimited parsing or writing errors
    #[error("Tabfile error: {0}")]
    Csv(#[from] csv::Error),

    /// The scanned input cannot be phased (unresolved identifier or sequence role)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// An input identifier has no counterpart in the engine output
    #[error("Sequence identifier not found in phased data: \"{identifier}\"")]
    Reconciliation { identifier: String },

    /// The phasing engine itself failed
    #[error("Phasing engine error: {message}")]
    Engine { message: String },

    /// Configuration errors (invalid CLI arguments, out-of-range parameters)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Operation requested in a task state that does not allow it
    #[error("Invalid task state: {message}")]
    InvalidState { message: String },

    /// A background unit panicked instead of reporting a result
    #[error("Background task panicked: {message}")]
    WorkerPanic { message: String },

    /// The running job observed a stop request
    #[error("Cancelled by user")]
    Cancelled,
}

/// Type alias for Results using RephaseError
pub type Result<T> = std::result::Result<T, RephaseError>;

impl RephaseError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a reconciliation error for a missing identifier
    pub fn reconciliation(identifier: impl Into<String>) -> Self {
        Self::Reconciliation {
            identifier: identifier.into(),
        }
    }

    /// Create an engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
