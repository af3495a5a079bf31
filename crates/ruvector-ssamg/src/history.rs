//! Convergence history logger.
//!
//! The outer solve loop reports one residual per iteration through
//! [`ConvergenceLog::record_residual`] and closes the run with
//! [`ConvergenceLog::finalize`]. The norms are only kept when `logging > 0`;
//! the iteration count is always kept.
//!
//! ```text
//! Uninitialized --record_residual--> Recording --finalize--> Finalized
//!        \______________________finalize_______________________/
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, SsamgError};

/// Lifecycle of a convergence history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryState {
    /// Allocated, nothing recorded yet.
    Uninitialized,
    /// At least one residual recorded; the solve loop is running.
    Recording,
    /// The solve loop has stopped; no further writes.
    Finalized,
}

/// Absolute and relative residual norms, one slot per iteration
/// `0..=max_iterations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceHistory {
    norms: Vec<f64>,
    rel_norms: Vec<f64>,
    state: HistoryState,
}

impl ConvergenceHistory {
    fn with_capacity(max_iterations: usize) -> Self {
        Self {
            norms: vec![0.0; max_iterations + 1],
            rel_norms: vec![0.0; max_iterations + 1],
            state: HistoryState::Uninitialized,
        }
    }

    /// Absolute residual norms.
    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    /// Relative residual norms.
    pub fn relative_norms(&self) -> &[f64] {
        &self.rel_norms
    }

    /// Current state.
    pub fn state(&self) -> HistoryState {
        self.state
    }
}

/// One row of the convergence table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRow {
    /// Iteration number.
    pub iteration: usize,
    /// `||r||_2`.
    pub norm: f64,
    /// `norm[i] / norm[i - 1]`; `1.0` on the first row.
    pub rate: f64,
    /// `||r||_2 / ||b||_2`.
    pub relative_norm: f64,
}

/// Residual logger owned by a handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceLog {
    logging: usize,
    max_iterations: usize,
    num_iterations: usize,
    finalized: bool,
    history: Option<ConvergenceHistory>,
}

impl ConvergenceLog {
    /// Logger for a run of at most `max_iterations` iterations. The norm
    /// history is allocated only when `logging > 0`.
    pub fn new(logging: usize, max_iterations: usize) -> Self {
        Self {
            logging,
            max_iterations,
            num_iterations: 0,
            finalized: false,
            history: (logging > 0).then(|| ConvergenceHistory::with_capacity(max_iterations)),
        }
    }

    /// Logging level this logger was created with.
    pub fn logging(&self) -> usize {
        self.logging
    }

    /// The stored history, if logging is enabled.
    pub fn history(&self) -> Option<&ConvergenceHistory> {
        self.history.as_ref()
    }

    /// Give up the history storage (teardown).
    pub(crate) fn take_history(&mut self) -> Option<ConvergenceHistory> {
        self.history.take()
    }

    /// Record the residual of `iteration`.
    ///
    /// Ignored when logging is disabled.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] if `iteration > max_iterations`
    /// or the log was already finalized.
    pub fn record_residual(&mut self, iteration: usize, norm: f64, rel_norm: f64) -> Result<()> {
        if self.finalized {
            return Err(SsamgError::PreconditionViolation(format!(
                "residual for iteration {iteration} recorded after the solve finished"
            )));
        }
        if iteration > self.max_iterations {
            return Err(SsamgError::PreconditionViolation(format!(
                "iteration {iteration} is beyond the budget of {}",
                self.max_iterations
            )));
        }
        let Some(history) = self.history.as_mut() else {
            trace!(iteration, "logging disabled, residual ignored");
            return Ok(());
        };
        history.norms[iteration] = norm;
        history.rel_norms[iteration] = rel_norm;
        history.state = HistoryState::Recording;
        trace!(iteration, norm, rel_norm, "residual recorded");
        Ok(())
    }

    /// Close the run after `num_iterations` iterations.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] if the count exceeds the
    /// budget or the log was already finalized.
    pub fn finalize(&mut self, num_iterations: usize) -> Result<()> {
        if self.finalized {
            return Err(SsamgError::PreconditionViolation(
                "solve already finalized".into(),
            ));
        }
        if num_iterations > self.max_iterations {
            return Err(SsamgError::PreconditionViolation(format!(
                "{num_iterations} iterations exceed the budget of {}",
                self.max_iterations
            )));
        }
        self.num_iterations = num_iterations;
        self.finalized = true;
        if let Some(history) = self.history.as_mut() {
            history.state = HistoryState::Finalized;
        }
        Ok(())
    }

    /// Iterations performed by the last solve.
    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    /// Relative residual norm reported for the last solve.
    ///
    /// When the budget is exhausted (`num_iterations == max_iterations`) this
    /// is the norm at `num_iterations - 1`; otherwise the norm at
    /// `num_iterations`, the post-solve residual check.
    ///
    /// # Errors
    ///
    /// - [`SsamgError::LoggingDisabled`] if `logging == 0`.
    /// - [`SsamgError::InvalidConfiguration`] if `max_iterations == 0`.
    pub fn final_relative_residual_norm(&self) -> Result<f64> {
        let history = self.history.as_ref().ok_or(SsamgError::LoggingDisabled)?;
        if self.max_iterations == 0 {
            return Err(SsamgError::InvalidConfiguration {
                name: "max_iterations",
                reason: "no residual exists with a zero iteration budget".into(),
            });
        }
        let index = if self.num_iterations == self.max_iterations {
            self.num_iterations - 1
        } else {
            self.num_iterations
        };
        Ok(history.rel_norms[index])
    }

    /// Rows of the convergence table printed with stride `print_level`.
    ///
    /// Iteration 0, every `print_level`-th iteration below
    /// `num_iterations`, and the last iteration if the stride skipped it.
    /// Empty when logging is disabled or `print_level == 0`.
    pub fn rows(&self, print_level: usize) -> Vec<ConvergenceRow> {
        let Some(history) = self.history.as_ref() else {
            return Vec::new();
        };
        if print_level == 0 {
            return Vec::new();
        }

        let row = |i: usize| ConvergenceRow {
            iteration: i,
            norm: history.norms[i],
            rate: if i == 0 {
                1.0
            } else {
                ratio(history.norms[i], history.norms[i - 1])
            },
            relative_norm: history.rel_norms[i],
        };

        let mut rows = vec![row(0)];
        let mut i = print_level;
        while i < self.num_iterations {
            rows.push(row(i));
            i += print_level;
        }
        let last = self.num_iterations.saturating_sub(1);
        if self.num_iterations > 0 && rows.last().map(|r| r.iteration) != Some(last) {
            rows.push(row(last));
        }
        rows
    }
}

/// `num / den`, or 0 when the denominator is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
