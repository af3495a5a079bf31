//! Process-group abstraction.
//!
//! The statistics aggregator needs exactly three things from the process
//! group it runs on: the caller's rank, the group size, and two collective
//! reductions to the root (rank 0). [`ProcessGroup`] is that seam; the crate
//! ships a serial implementation and an in-process multi-rank one in
//! [`comm`](crate::comm). A message-passing backend only has to implement
//! these four methods.

use crate::error::Result;

/// Rank of the process that receives reduction results.
pub const ROOT: usize = 0;

/// Element-wise reduction operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Sum of the contributions.
    Sum,
    /// Maximum of the contributions.
    Max,
}

impl ReduceOp {
    /// Combine `incoming` into `acc` element by element.
    pub fn fold(self, acc: &mut [f64], incoming: &[f64]) {
        for (a, &b) in acc.iter_mut().zip(incoming) {
            *a = match self {
                ReduceOp::Sum => *a + b,
                ReduceOp::Max => a.max(b),
            };
        }
    }
}

/// A fixed group of cooperating processes.
///
/// # Contract
///
/// Collectives are synchronous: every member must call the same reductions,
/// the same number of times, in the same order, with buffers of the same
/// length. A member that skips or reorders a collective makes the others wait
/// forever; implementations are not required to detect this.
pub trait ProcessGroup {
    /// Rank of the calling process, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Element-wise reduction of `send` across the group to [`ROOT`].
    ///
    /// Returns `Some(result)` on the root and `None` everywhere else.
    fn reduce(&self, op: ReduceOp, send: &[f64]) -> Result<Option<Vec<f64>>>;

    /// Sum-reduce to the root.
    fn reduce_sum(&self, send: &[f64]) -> Result<Option<Vec<f64>>> {
        self.reduce(ReduceOp::Sum, send)
    }

    /// Max-reduce to the root.
    fn reduce_max(&self, send: &[f64]) -> Result<Option<Vec<f64>>> {
        self.reduce(ReduceOp::Max, send)
    }

    /// `true` on the process that receives reduction results.
    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }
}
