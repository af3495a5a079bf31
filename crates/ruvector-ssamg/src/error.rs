//! Error types for the SSAMG control layer.
//!
//! Provides the status taxonomy returned by every setter, lifecycle call, and
//! query: invalid configuration, disabled logging, precondition violations,
//! collective mismatches, and malformed level data. All errors implement
//! `std::error::Error` via `thiserror`.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SsamgError>;

/// Primary error type for SSAMG operations.
#[derive(Debug, thiserror::Error)]
pub enum SsamgError {
    /// A configuration value is unusable for the requested operation.
    #[error("invalid configuration: {name} ({reason})")]
    InvalidConfiguration {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// Convergence history was requested but `logging == 0`.
    #[error("convergence logging is disabled (logging level 0)")]
    LoggingDisabled,

    /// An operation was invoked in a state that does not permit it (no
    /// hierarchy built yet, configuration frozen, mismatched part counts).
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Ranks entered the same collective with different operations or
    /// buffer lengths.
    ///
    /// Only the in-process [`ThreadGroup`](crate::comm::ThreadGroup) can
    /// observe this. A real process group hangs instead; keeping every rank
    /// on the same sequence of collectives is the caller's obligation.
    #[error("collective mismatch: {detail}")]
    CollectiveMismatch {
        /// What differed between the ranks.
        detail: String,
    },

    /// Level data supplied by the setup algorithm failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

/// Structural validation errors for hierarchy inputs.
///
/// Raised eagerly when a level is registered so that the statistics pass and
/// the release walk only ever see consistent data.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Two sizes that must agree do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A column index is out of bounds for the declared number of columns.
    #[error("column index {index} out of bounds for {cols} columns (row {row})")]
    IndexOutOfBounds {
        /// Offending column index.
        index: usize,
        /// Row containing the offending entry.
        row: usize,
        /// Declared column count.
        cols: usize,
    },

    /// The `row_ptr` array is not monotonically non-decreasing.
    #[error("row_ptr is not monotonically non-decreasing at position {position}")]
    NonMonotonicRowPtrs {
        /// Position in `row_ptr` where the violation was detected.
        position: usize,
    },

    /// A grid box has an upper corner below its lower corner.
    #[error("box {index} is inverted along axis {axis}")]
    InvertedBox {
        /// Box position within its grid.
        index: usize,
        /// Axis (0, 1, 2) along which `imax < imin - 1`.
        axis: usize,
    },
}
