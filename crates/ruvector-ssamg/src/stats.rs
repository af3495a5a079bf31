//! Distributed statistics aggregator.
//!
//! Walks the hierarchy level by level, computes each rank's local
//! contribution, and reduces the contributions to the root. Every rank must
//! call [`compute_stats`]; only the root receives a [`StatsSnapshot`].
//!
//! Per level the pass issues exactly four collectives, always in this order:
//!
//! | # | Op  | Buffer                                                   |
//! |---|-----|----------------------------------------------------------|
//! | 1 | sum | `[rows, nonzero rows, nonzeros]`                         |
//! | 2 | max | `[-min entries, max entries, -min rowsum, max rowsum]`   |
//! | 3 | sum | `[active parts, boxes, dofs, ghost rows, sum stencil*dofs]` |
//! | 4 | max | `[-min stencil, max stencil]`                            |
//!
//! Minima travel as negated maxima so a single max-type collective yields
//! both bounds.

use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

use crate::error::Result;
use crate::grid::SStructMatrix;
use crate::report::SetupSummary;
use crate::solver::SsAmg;
use crate::traits::ProcessGroup;
use crate::types::ParCsrMatrix;

// ---------------------------------------------------------------------------
// Ordered merge
// ---------------------------------------------------------------------------

/// Merge two ascending index lists into one ascending, duplicate-free list.
///
/// Either list may be empty.
pub fn merge_ordered(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let next = if a[i] < b[j] {
            i += 1;
            a[i - 1]
        } else if b[j] < a[i] {
            j += 1;
            b[j - 1]
        } else {
            i += 1;
            j += 1;
            a[i - 1]
        };
        if out.last() != Some(&next) {
            out.push(next);
        }
    }
    for &v in a[i..].iter().chain(&b[j..]) {
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Local passes
// ---------------------------------------------------------------------------

/// One rank's contribution from the row-distributed operator of a level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OperatorContribution {
    /// Locally stored rows.
    pub rows: usize,
    /// Rows with at least one stored entry in either block.
    pub nonzero_rows: usize,
    /// Stored entries in both blocks.
    pub nonzeros: usize,
    /// Fewest entries in a nonzero row (0 if there are none).
    pub min_entries: usize,
    /// Most entries in a nonzero row (0 if there are none).
    pub max_entries: usize,
    /// Smallest row sum over nonzero rows (0 if there are none).
    pub min_rowsum: f64,
    /// Largest row sum over nonzero rows (0 if there are none).
    pub max_rowsum: f64,
}

/// Compute the local operator contribution of `matrix`.
pub fn local_operator_pass(matrix: &ParCsrMatrix) -> OperatorContribution {
    let rownnz = matrix.rownnz();
    let mut c = OperatorContribution {
        rows: matrix.local_num_rows(),
        nonzero_rows: rownnz.len(),
        nonzeros: matrix.local_nnz(),
        ..Default::default()
    };
    if rownnz.is_empty() {
        return c;
    }

    c.min_entries = usize::MAX;
    c.min_rowsum = f64::INFINITY;
    c.max_rowsum = f64::NEG_INFINITY;
    for &row in &rownnz {
        let entries = matrix.row_entries(row);
        let sum = matrix.row_sum(row);
        c.min_entries = c.min_entries.min(entries);
        c.max_entries = c.max_entries.max(entries);
        c.min_rowsum = c.min_rowsum.min(sum);
        c.max_rowsum = c.max_rowsum.max(sum);
    }
    c
}

/// One rank's contribution from the structured blocks of a level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridContribution {
    /// Parts holding at least one local box.
    pub active_parts: usize,
    /// Local boxes over all present blocks.
    pub boxes: usize,
    /// Local structured degrees of freedom.
    pub dofs: usize,
    /// Stored rows not covered by a structured block.
    pub ghost_rows: usize,
    /// Sum of `stencil size * dofs` over blocks with local points.
    pub weighted_stencil: f64,
    /// Stencil size bounds over blocks with local points.
    pub stencil: Option<(usize, usize)>,
}

/// Compute the local structured-grid contribution of `matrix`.
pub fn local_grid_pass(matrix: &SStructMatrix) -> GridContribution {
    let mut c = GridContribution::default();

    for part in &matrix.parts {
        let mut part_boxes = 0;
        for block in part.present_blocks() {
            let dofs = block.local_dofs();
            part_boxes += block.grid.num_boxes();
            c.dofs += dofs;
            if dofs > 0 {
                let size = block.stencil.size();
                c.stencil = Some(match c.stencil {
                    Some((lo, hi)) => (lo.min(size), hi.max(size)),
                    None => (size, size),
                });
                c.weighted_stencil += (size * dofs) as f64;
            }
        }
        c.boxes += part_boxes;
        if part_boxes > 0 {
            c.active_parts += 1;
        }
    }

    let stored = matrix.local_num_rows();
    c.ghost_rows = stored.saturating_sub(c.dofs);
    if c.dofs > stored {
        warn!(
            stored,
            dofs = c.dofs,
            "structured dofs exceed stored rows, ghost rows clamped to 0"
        );
    }
    c
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Globally reduced statistics of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Level index.
    pub level: usize,
    /// Stored rows.
    pub rows: usize,
    /// Stored rows not covered by a structured block.
    pub ghost_rows: usize,
    /// Rows with at least one stored entry.
    pub nonzero_rows: usize,
    /// Stored entries.
    pub nonzeros: usize,
    /// Fewest entries in a nonzero row.
    pub min_entries: usize,
    /// Most entries in a nonzero row.
    pub max_entries: usize,
    /// `nonzeros / nonzero_rows` (0 when there are no nonzero rows).
    pub avg_entries: f64,
    /// Smallest row sum.
    pub min_rowsum: f64,
    /// Largest row sum.
    pub max_rowsum: f64,
    /// Parts holding at least one box.
    pub active_parts: usize,
    /// Boxes.
    pub boxes: usize,
    /// Structured degrees of freedom.
    pub dofs: usize,
    /// Smallest stencil (0 when the level has no dofs).
    pub min_stencil: usize,
    /// Largest stencil (0 when the level has no dofs).
    pub max_stencil: usize,
    /// Dof-weighted mean stencil size (0 when the level has no dofs).
    pub avg_stencil: f64,
}

/// Hierarchy-wide statistics, materialized on the root only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// One entry per level, finest first.
    pub levels: Vec<LevelStats>,
    /// Setup parameters and per-level annotations.
    pub setup: SetupSummary,
}

/// `num / den`, or 0 when the denominator is zero.
fn guarded_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Negate a reduced minimum, folding `-0.0` into `0.0`.
fn unnegate(v: f64) -> f64 {
    0.0 - v
}

// ---------------------------------------------------------------------------
// Collective entry point
// ---------------------------------------------------------------------------

/// Compute hierarchy statistics across the process group.
///
/// Collective: every rank must call it with a hierarchy of the same level
/// count. Returns `Some(snapshot)` on the root and `None` elsewhere.
///
/// # Errors
///
/// - [`SsamgError::PreconditionViolation`](crate::error::SsamgError::PreconditionViolation)
///   if no hierarchy is installed or `comm` is not the handle's group.
///   Raised before any communication.
/// - Any error the process group reports.
#[instrument(skip(amg, comm), fields(rank = comm.rank(), size = comm.size()))]
pub fn compute_stats<G: ProcessGroup + ?Sized>(
    amg: &SsAmg<'_>,
    comm: &G,
) -> Result<Option<StatsSnapshot>> {
    let hierarchy = amg.hierarchy()?;
    amg.check_group(comm)?;
    let mut levels = Vec::with_capacity(hierarchy.num_levels());

    for level in hierarchy.levels() {
        let operator = level.operator();
        let op = local_operator_pass(&operator.unstructured);
        let grid = local_grid_pass(operator);
        trace!(level = level.index(), ?op, ?grid, "local contribution");

        let counts = comm.reduce_sum(&[
            op.rows as f64,
            op.nonzero_rows as f64,
            op.nonzeros as f64,
        ])?;
        let bounds = comm.reduce_max(&[
            -(op.min_entries as f64),
            op.max_entries as f64,
            -op.min_rowsum,
            op.max_rowsum,
        ])?;
        let sizes = comm.reduce_sum(&[
            grid.active_parts as f64,
            grid.boxes as f64,
            grid.dofs as f64,
            grid.ghost_rows as f64,
            grid.weighted_stencil,
        ])?;
        let (lo, hi) = match grid.stencil {
            Some((lo, hi)) => (-(lo as f64), hi as f64),
            None => (f64::NEG_INFINITY, f64::NEG_INFINITY),
        };
        let stencil = comm.reduce_max(&[lo, hi])?;

        let (Some(counts), Some(bounds), Some(sizes), Some(stencil)) =
            (counts, bounds, sizes, stencil)
        else {
            continue;
        };

        let dofs = sizes[2];
        let (min_stencil, max_stencil) = if dofs > 0.0 {
            (unnegate(stencil[0]) as usize, stencil[1] as usize)
        } else {
            (0, 0)
        };
        levels.push(LevelStats {
            level: level.index(),
            rows: counts[0] as usize,
            nonzero_rows: counts[1] as usize,
            nonzeros: counts[2] as usize,
            avg_entries: guarded_div(counts[2], counts[1]),
            min_entries: unnegate(bounds[0]) as usize,
            max_entries: bounds[1] as usize,
            min_rowsum: unnegate(bounds[2]),
            max_rowsum: bounds[3],
            active_parts: sizes[0] as usize,
            boxes: sizes[1] as usize,
            dofs: dofs as usize,
            ghost_rows: sizes[3] as usize,
            min_stencil,
            max_stencil,
            avg_stencil: guarded_div(sizes[4], dofs),
        });
    }

    if !comm.is_root() {
        return Ok(None);
    }
    Ok(Some(StatsSnapshot {
        levels,
        setup: SetupSummary::collect(amg.config(), hierarchy),
    }))
}
