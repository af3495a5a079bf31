//! Process-group implementations.
//!
//! - [`SerialGroup`]: a group of one; reductions return the caller's buffer.
//! - [`ThreadGroup`]: `n` ranks living in one address space, each driven by
//!   its own thread, exchanging contributions through a shared slot guarded
//!   by a `parking_lot` mutex and condition variable. This gives the
//!   statistics pass real multi-rank semantics (including root-only results)
//!   without a message-passing runtime.
//!
//! # Example
//!
//! ```rust
//! use ruvector_ssamg::comm::ThreadGroup;
//! use ruvector_ssamg::traits::ProcessGroup;
//!
//! let ranks = ThreadGroup::split(2);
//! let results: Vec<_> = std::thread::scope(|s| {
//!     let handles: Vec<_> = ranks
//!         .iter()
//!         .map(|comm| s.spawn(move || comm.reduce_sum(&[comm.rank() as f64 + 1.0]).unwrap()))
//!         .collect();
//!     handles.into_iter().map(|h| h.join().unwrap()).collect()
//! });
//! assert_eq!(results[0], Some(vec![3.0]));
//! assert_eq!(results[1], None);
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Result, SsamgError};
use crate::traits::{ProcessGroup, ReduceOp, ROOT};

// ---------------------------------------------------------------------------
// SerialGroup
// ---------------------------------------------------------------------------

/// Single-process group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialGroup;

impl ProcessGroup for SerialGroup {
    fn rank(&self) -> usize {
        ROOT
    }

    fn size(&self) -> usize {
        1
    }

    fn reduce(&self, _op: ReduceOp, send: &[f64]) -> Result<Option<Vec<f64>>> {
        Ok(Some(send.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// ThreadGroup
// ---------------------------------------------------------------------------

/// State of the collective currently being assembled.
#[derive(Debug, Default)]
struct Exchange {
    /// Completed collectives so far.
    generation: u64,
    /// Ranks that have contributed to the open collective.
    arrived: usize,
    /// Operator and buffer length fixed by the first arrival.
    shape: Option<(ReduceOp, usize)>,
    /// Running reduction of the open collective.
    acc: Vec<f64>,
    /// Set when an arrival disagreed with `shape`.
    mismatch: Option<String>,
    /// Outcome of the last completed collective, read by the root.
    completed: Option<std::result::Result<Vec<f64>, String>>,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    exchange: Mutex<Exchange>,
    done: Condvar,
}

/// Factory for in-process rank endpoints.
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create `size` endpoints sharing one exchange. Endpoint `i` has rank
    /// `i`; move each one to its own thread.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn split(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "a process group needs at least one rank");
        let shared = Arc::new(Shared {
            size,
            exchange: Mutex::new(Exchange::default()),
            done: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

/// One rank of a [`ThreadGroup`].
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ProcessGroup for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn reduce(&self, op: ReduceOp, send: &[f64]) -> Result<Option<Vec<f64>>> {
        let mut ex = self.shared.exchange.lock();
        let generation = ex.generation;

        match ex.shape {
            None => {
                ex.shape = Some((op, send.len()));
                ex.acc = send.to_vec();
            }
            Some(shape) if shape == (op, send.len()) => {
                let mut acc = std::mem::take(&mut ex.acc);
                op.fold(&mut acc, send);
                ex.acc = acc;
            }
            Some((expected_op, expected_len)) => {
                ex.mismatch.get_or_insert_with(|| {
                    format!(
                        "rank {} entered {op:?}[{}] while the group is in \
                         {expected_op:?}[{expected_len}]",
                        self.rank,
                        send.len(),
                    )
                });
            }
        }
        ex.arrived += 1;

        if ex.arrived == self.shared.size {
            let acc = std::mem::take(&mut ex.acc);
            ex.completed = Some(match ex.mismatch.take() {
                Some(detail) => Err(detail),
                None => Ok(acc),
            });
            ex.arrived = 0;
            ex.shape = None;
            ex.generation += 1;
            trace!(generation, rank = self.rank, "collective completed");
            self.shared.done.notify_all();
        } else {
            while ex.generation == generation {
                self.shared.done.wait(&mut ex);
            }
        }

        // The next collective cannot complete without the root, so the root
        // always reads the outcome of its own generation here.
        let outcome = match &ex.completed {
            Some(Err(detail)) => Err(detail.clone()),
            Some(Ok(values)) if self.rank == ROOT => Ok(Some(values.clone())),
            _ => Ok(None),
        };
        outcome.map_err(|detail| SsamgError::CollectiveMismatch { detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_all<T: Send>(
        ranks: &[ThreadComm],
        f: impl Fn(&ThreadComm) -> T + Sync,
    ) -> Vec<T> {
        std::thread::scope(|s| {
            let f = &f;
            let handles: Vec<_> = ranks.iter().map(|c| s.spawn(move || f(c))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn serial_reduce_is_identity() {
        let g = SerialGroup;
        assert_eq!(g.reduce_max(&[1.0, -2.0]).unwrap(), Some(vec![1.0, -2.0]));
        assert!(g.is_root());
    }

    #[test]
    fn sum_and_max_land_on_root_only() {
        let ranks = ThreadGroup::split(3);
        let out = run_all(&ranks, |c| {
            let r = c.rank() as f64;
            let sum = c.reduce_sum(&[r, 1.0]).unwrap();
            let max = c.reduce_max(&[r, -r]).unwrap();
            (sum, max)
        });
        assert_eq!(out[0].0, Some(vec![3.0, 3.0]));
        assert_eq!(out[0].1, Some(vec![2.0, 0.0]));
        for other in &out[1..] {
            assert_eq!(other.0, None);
            assert_eq!(other.1, None);
        }
    }

    #[test]
    fn repeated_collectives_stay_in_step() {
        let ranks = ThreadGroup::split(4);
        let out = run_all(&ranks, |c| {
            (0..50)
                .map(|k| c.reduce_sum(&[k as f64]).unwrap())
                .collect::<Vec<_>>()
        });
        for (k, v) in out[0].iter().enumerate() {
            assert_eq!(v.as_deref(), Some(&[4.0 * k as f64][..]));
        }
    }

    #[test]
    fn mismatched_operation_is_reported_on_every_rank() {
        let ranks = ThreadGroup::split(2);
        let out = run_all(&ranks, |c| {
            if c.rank() == 0 {
                c.reduce_sum(&[1.0])
            } else {
                c.reduce_max(&[1.0])
            }
        });
        for r in out {
            assert!(matches!(r, Err(SsamgError::CollectiveMismatch { .. })));
        }
    }
}
