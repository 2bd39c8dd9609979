//! Error types with actionable diagnostics.
//!
//! Data-model and batch-operation violations are reported to the immediate
//! caller; synchronization misuse is a programming defect and surfaces as
//! [`EnlaceError::Logic`]. Nothing in this crate retries.

use thiserror::Error;

/// Result type alias for enlace operations.
pub type Result<T> = std::result::Result<T, EnlaceError>;

/// Errors raised by sequence batches, readiness gates and batch operations.
#[derive(Error, Debug)]
pub enum EnlaceError {
    /// An accessor or range operation was called on missing or incompatible fields.
    #[error("Precondition failed in {operation}: {message}\n  → Check the batch fields and ranges passed by the caller")]
    Precondition { operation: &'static str, message: String },

    /// Boundary arrays or the sequence/sub-sequence subset relation are broken.
    #[error("Invariant violated for {what}: {message}\n  → Boundaries must start at 0, be non-decreasing and end at the batch size")]
    InvariantViolation { what: &'static str, message: String },

    /// Present payload fields disagree on the number of rows.
    #[error("Row count mismatch: {primary} has {primary_rows} rows but {other} has {other_rows}\n  → Every payload field of a batch must hold one entry per row")]
    RowCountMismatch { primary: &'static str, primary_rows: usize, other: &'static str, other_rows: usize },

    /// Readiness gate misuse (unregistered batch, too many signals).
    #[error("Synchronization logic error: {message}\n  → Register every consumer before the first pass")]
    Logic { message: String },

    /// Two buffers that must agree on shape do not.
    #[error("Buffer shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// Configuration value or file is invalid.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EnlaceError {
    /// Create a precondition error for `operation`.
    pub fn precondition(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Precondition { operation, message: message.into() }
    }

    /// Create an invariant violation for `what`.
    pub fn invariant(what: &'static str, message: impl Into<String>) -> Self {
        Self::InvariantViolation { what, message: message.into() }
    }

    /// Create a synchronization logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic { message: message.into() }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Defects in pipeline topology or batch construction, as opposed to bad input.
    pub fn is_programming_defect(&self) -> bool {
        matches!(self, Self::Logic { .. } | Self::InvariantViolation { .. } | Self::RowCountMismatch { .. })
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Precondition { .. } => "E001",
            Self::InvariantViolation { .. } => "E010",
            Self::RowCountMismatch { .. } => "E011",
            Self::Logic { .. } => "E020",
            Self::ShapeMismatch { .. } => "E030",
            Self::Config { .. } => "E040",
            Self::Io { .. } => "E050",
        }
    }
}
