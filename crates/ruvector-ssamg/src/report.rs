//! Report data: column semantics, setup summary, and tracing output.
//!
//! Layout and column widths belong to whatever consumes the events; this
//! module supplies names, units, level ordering, and values.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{RelaxationType, SsamgConfig};
use crate::hierarchy::{Axis, Hierarchy};
use crate::history::ConvergenceRow;
use crate::stats::{LevelStats, StatsSnapshot};

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Which statistics table a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatsTable {
    /// Structured blocks ("SMatrix info").
    SMatrix,
    /// Row-distributed operator ("UMatrix info").
    UMatrix,
}

/// A column of the statistics tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatsColumn {
    ActiveParts,
    Boxes,
    Dofs,
    MinStencil,
    MaxStencil,
    AvgStencil,
    Rows,
    GhostRows,
    NonzeroRows,
    Nonzeros,
    MinEntries,
    MaxEntries,
    AvgEntries,
    MinRowSum,
    MaxRowSum,
}

impl StatsColumn {
    /// Every column, in table order.
    pub const ALL: [StatsColumn; 15] = [
        StatsColumn::ActiveParts,
        StatsColumn::Boxes,
        StatsColumn::Dofs,
        StatsColumn::MinStencil,
        StatsColumn::MaxStencil,
        StatsColumn::AvgStencil,
        StatsColumn::Rows,
        StatsColumn::GhostRows,
        StatsColumn::NonzeroRows,
        StatsColumn::Nonzeros,
        StatsColumn::MinEntries,
        StatsColumn::MaxEntries,
        StatsColumn::AvgEntries,
        StatsColumn::MinRowSum,
        StatsColumn::MaxRowSum,
    ];

    /// Columns of one table, in order.
    pub fn of(table: StatsTable) -> impl Iterator<Item = StatsColumn> {
        Self::ALL.into_iter().filter(move |c| c.table() == table)
    }

    /// Table the column is printed in.
    pub fn table(self) -> StatsTable {
        use StatsColumn::*;
        match self {
            ActiveParts | Boxes | Dofs | MinStencil | MaxStencil | AvgStencil => {
                StatsTable::SMatrix
            }
            _ => StatsTable::UMatrix,
        }
    }

    /// Column heading.
    pub fn name(self) -> &'static str {
        use StatsColumn::*;
        match self {
            ActiveParts => "active parts",
            Boxes => "active boxes",
            Dofs => "DOFs",
            MinStencil => "stencil size min",
            MaxStencil => "stencil size max",
            AvgStencil => "stencil size avg",
            Rows => "rows",
            GhostRows => "ghost rows",
            NonzeroRows => "nnz rows",
            Nonzeros => "nnz entries",
            MinEntries => "entries/nnzrow min",
            MaxEntries => "entries/nnzrow max",
            AvgEntries => "entries/nnzrow avg",
            MinRowSum => "row sums min",
            MaxRowSum => "row sums max",
        }
    }

    /// Unit of the values in the column.
    pub fn unit(self) -> &'static str {
        use StatsColumn::*;
        match self {
            ActiveParts => "parts",
            Boxes => "boxes",
            Dofs => "dofs",
            MinStencil | MaxStencil | AvgStencil => "entries",
            Rows | GhostRows | NonzeroRows => "rows",
            Nonzeros => "entries",
            MinEntries | MaxEntries | AvgEntries => "entries/row",
            MinRowSum | MaxRowSum => "value",
        }
    }

    /// `true` for columns that hold integer counts.
    pub fn is_count(self) -> bool {
        use StatsColumn::*;
        !matches!(self, AvgStencil | AvgEntries | MinRowSum | MaxRowSum)
    }

    /// Value of this column for one level.
    pub fn value(self, s: &LevelStats) -> f64 {
        use StatsColumn::*;
        match self {
            ActiveParts => s.active_parts as f64,
            Boxes => s.boxes as f64,
            Dofs => s.dofs as f64,
            MinStencil => s.min_stencil as f64,
            MaxStencil => s.max_stencil as f64,
            AvgStencil => s.avg_stencil,
            Rows => s.rows as f64,
            GhostRows => s.ghost_rows as f64,
            NonzeroRows => s.nonzero_rows as f64,
            Nonzeros => s.nonzeros as f64,
            MinEntries => s.min_entries as f64,
            MaxEntries => s.max_entries as f64,
            AvgEntries => s.avg_entries,
            MinRowSum => s.min_rowsum,
            MaxRowSum => s.max_rowsum,
        }
    }
}

// ---------------------------------------------------------------------------
// Setup summary
// ---------------------------------------------------------------------------

/// Setup parameters reported with the statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupSummary {
    /// Smoother.
    pub relax_type: RelaxationType,
    /// Pre-smoothing sweeps.
    pub pre_sweeps: usize,
    /// Post-smoothing sweeps.
    pub post_sweeps: usize,
    /// Coarsest-level sweeps (inheritance resolved).
    pub coarse_sweeps: usize,
    /// Levels in the hierarchy.
    pub num_levels: usize,
    /// Parts per level.
    pub num_parts: usize,
    /// Coarsening direction per part, for every level that is coarsened
    /// (all but the coarsest).
    pub coarsening: Vec<Vec<Option<Axis>>>,
    /// Relaxation weight per part, for every level.
    pub weights: Vec<Vec<f64>>,
}

impl SetupSummary {
    /// Gather the summary from a configuration and its hierarchy.
    pub fn collect(config: &SsamgConfig, hierarchy: &Hierarchy<'_>) -> Self {
        let levels = hierarchy.levels();
        let coarsened = levels.len().saturating_sub(1);
        Self {
            relax_type: config.relaxation_type(),
            pre_sweeps: config.pre_sweeps(),
            post_sweeps: config.post_sweeps(),
            coarse_sweeps: config.resolved_coarse_sweeps(),
            num_levels: hierarchy.num_levels(),
            num_parts: hierarchy.num_parts(),
            coarsening: levels[..coarsened]
                .iter()
                .map(|l| l.coarsening_directions().to_vec())
                .collect(),
            weights: levels.iter().map(|l| l.relaxation_weights().to_vec()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Emit a statistics snapshot at `info` level.
///
/// The per-part tables appear only for `print_level > 1`; the weight table
/// only when the smoother uses weights.
pub fn emit_stats(snapshot: &StatsSnapshot, print_level: usize) {
    let setup = &snapshot.setup;

    if print_level > 1 {
        for (level, dirs) in setup.coarsening.iter().enumerate() {
            let dirs: Vec<Option<usize>> = dirs.iter().map(|d| d.map(Axis::index)).collect();
            info!(level, ?dirs, "coarsening direction");
        }
        if setup.relax_type.is_weighted() {
            for (level, weights) in setup.weights.iter().enumerate() {
                info!(level, ?weights, "relaxation factors");
            }
        }
    }

    for s in &snapshot.levels {
        let stencil_avg = format!("{:.1}", s.avg_stencil);
        info!(
            level = s.level,
            parts = s.active_parts,
            boxes = s.boxes,
            dofs = s.dofs,
            stencil_min = s.min_stencil,
            stencil_max = s.max_stencil,
            stencil_avg = %stencil_avg,
            "SMatrix info"
        );
    }
    for s in &snapshot.levels {
        let entries_avg = format!("{:.1}", s.avg_entries);
        let rowsum_min = format!("{:.2e}", s.min_rowsum);
        let rowsum_max = format!("{:.2e}", s.max_rowsum);
        info!(
            level = s.level,
            rows = s.rows,
            ghost_rows = s.ghost_rows,
            nnz_rows = s.nonzero_rows,
            nnz = s.nonzeros,
            entries_min = s.min_entries,
            entries_max = s.max_entries,
            entries_avg = %entries_avg,
            rowsum_min = %rowsum_min,
            rowsum_max = %rowsum_max,
            "UMatrix info"
        );
    }

    info!(
        relax_type = %setup.relax_type,
        pre_sweeps = setup.pre_sweeps,
        post_sweeps = setup.post_sweeps,
        coarse_sweeps = setup.coarse_sweeps,
        num_levels = setup.num_levels,
        "SSAMG setup parameters"
    );
}

/// Emit convergence table rows at `info` level.
pub fn emit_convergence(rows: &[ConvergenceRow]) {
    for r in rows {
        let norm = format!("{:e}", r.norm);
        let rate = format!("{:.6}", r.rate);
        let relative = format!("{:e}", r.relative_norm);
        info!(
            iteration = r.iteration,
            norm = %norm,
            rate = %rate,
            relative = %relative,
            "convergence"
        );
    }
}
