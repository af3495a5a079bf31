//! Multilevel hierarchy: level records, transfer operators, and workspaces.
//!
//! The finest level is built from the caller's grid, operator, and vectors,
//! which the hierarchy only borrows. Every coarser level is produced by the
//! setup algorithm and moved in, so the hierarchy owns it outright. Each
//! slot carries its ownership tag ([`Held`]); the release walk reads the tag
//! and never special-cases a level index.
//!
//! The transfer operators connecting level `l - 1` to level `l` live in
//! level `l`'s record ([`Level::incoming`]), so a hierarchy of `n` levels
//! holds exactly `n - 1` interpolation and `n - 1` restriction operators.
//!
//! # Example
//!
//! ```rust
//! use ruvector_ssamg::config::SsamgConfig;
//! use ruvector_ssamg::grid::*;
//! use ruvector_ssamg::hierarchy::{FinestLevel, HierarchyBuilder};
//! use ruvector_ssamg::types::{CsrMatrix, ParCsrMatrix};
//!
//! let sgrid = StructGrid::new(1, vec![GridBox::new([0, 0, 0], [3, 0, 0])]);
//! let grid = SStructGrid::new(vec![PartGrid { grid: sgrid.clone(), nvars: 1 }]);
//! let a = SStructMatrix::new(
//!     vec![PartMatrix::scalar(StructMatrix::zeros(sgrid, Stencil::laplacian(1)))],
//!     ParCsrMatrix::local(0, CsrMatrix::identity(4)),
//! );
//! let b = SStructVector::zeros(4);
//! let x = SStructVector::zeros(4);
//!
//! let hierarchy = HierarchyBuilder::new(FinestLevel::new(&grid, &a, &b, &x))
//!     .finish(&SsamgConfig::default())
//!     .unwrap();
//! assert_eq!(hierarchy.num_levels(), 1);
//! assert_eq!(hierarchy.num_transfers(), 0);
//! ```

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{RelaxationType, SsamgConfig};
use crate::error::{Result, SsamgError, ValidationError};
use crate::events::{Ownership, ReleaseLog, Resource};
use crate::grid::{SStructGrid, SStructMatrix, SStructVector};
use crate::types::CsrMatrix;
use crate::validation::{
    check_count, validate_level_operator, validate_transfer, validate_vector_len, MAX_LEVELS,
};

// ---------------------------------------------------------------------------
// Ownership-tagged slot
// ---------------------------------------------------------------------------

/// A level slot that either borrows caller data or owns hierarchy data.
#[derive(Debug)]
pub enum Held<'a, T> {
    /// Caller data; only the reference is dropped on release.
    Borrowed(&'a T),
    /// Hierarchy data; dropped on release.
    Owned(T),
}

impl<T> Held<'_, T> {
    /// Ownership tag of this slot.
    pub fn ownership(&self) -> Ownership {
        match self {
            Held::Borrowed(_) => Ownership::Borrowed,
            Held::Owned(_) => Ownership::Owned,
        }
    }

    /// Drop the slot. Owned data is freed; borrowed data is left alone.
    pub fn release(self) -> Ownership {
        let ownership = self.ownership();
        drop(self);
        ownership
    }
}

impl<T> Deref for Held<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Held::Borrowed(r) => r,
            Held::Owned(v) => v,
        }
    }
}

// ---------------------------------------------------------------------------
// Level annotations and workspaces
// ---------------------------------------------------------------------------

/// Coarsening direction of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Axis index (0, 1, 2).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Scratch storage for the matrix-vector product of one level.
#[derive(Debug)]
pub struct MatvecWorkspace {
    scratch: Vec<f64>,
}

impl MatvecWorkspace {
    fn for_operator(operator: &SStructMatrix) -> Self {
        Self {
            scratch: vec![0.0; operator.local_num_rows()],
        }
    }

    /// Length of the scratch buffer.
    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    /// `true` if the level stores no rows.
    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }
}

/// Smoother state of one level.
#[derive(Debug)]
pub struct RelaxWorkspace {
    relax_type: RelaxationType,
    sweeps: usize,
    scratch: Vec<f64>,
}

impl RelaxWorkspace {
    fn for_operator(operator: &SStructMatrix, relax_type: RelaxationType, sweeps: usize) -> Self {
        Self {
            relax_type,
            sweeps,
            scratch: vec![0.0; operator.local_num_rows()],
        }
    }

    /// Smoother this workspace was prepared for.
    pub fn relax_type(&self) -> RelaxationType {
        self.relax_type
    }

    /// Sweeps per smoothing pass on this level.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Length of the scratch buffer.
    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    /// `true` if the level stores no rows.
    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }
}

/// Scratch storage of one direction of a transfer.
#[derive(Debug)]
pub struct TransferWorkspace {
    scratch: Vec<f64>,
}

impl TransferWorkspace {
    fn with_len(len: usize) -> Self {
        Self {
            scratch: vec![0.0; len],
        }
    }

    /// Length of the scratch buffer.
    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    /// `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }
}

/// Transfer operators between a fine level and the next coarser one.
#[derive(Debug)]
pub struct Transfer {
    /// Interpolation `P` (fine rows x coarse rows).
    pub interpolation: CsrMatrix<f64>,
    /// Restriction `RT` (coarse rows x fine rows).
    pub restriction: CsrMatrix<f64>,
    restrict_workspace: TransferWorkspace,
    interp_workspace: TransferWorkspace,
}

impl Transfer {
    /// Restriction workspace (one entry per coarse row).
    pub fn restrict_workspace(&self) -> &TransferWorkspace {
        &self.restrict_workspace
    }

    /// Interpolation workspace (one entry per fine row).
    pub fn interp_workspace(&self) -> &TransferWorkspace {
        &self.interp_workspace
    }
}

// ---------------------------------------------------------------------------
// Level record
// ---------------------------------------------------------------------------

/// One level of the hierarchy.
#[derive(Debug)]
pub struct Level<'a> {
    pub(crate) index: usize,
    pub(crate) grid: Held<'a, SStructGrid>,
    pub(crate) operator: Held<'a, SStructMatrix>,
    pub(crate) b: Held<'a, SStructVector>,
    pub(crate) x: Held<'a, SStructVector>,
    pub(crate) tx: Held<'a, SStructVector>,
    pub(crate) matvec: MatvecWorkspace,
    pub(crate) relax: RelaxWorkspace,
    pub(crate) coarsen_dirs: Vec<Option<Axis>>,
    pub(crate) relax_weights: Vec<f64>,
    pub(crate) incoming: Option<Transfer>,
}

impl<'a> Level<'a> {
    /// Position in the hierarchy (0 = finest).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Grid of this level.
    pub fn grid(&self) -> &SStructGrid {
        &self.grid
    }

    /// Operator of this level.
    pub fn operator(&self) -> &SStructMatrix {
        &self.operator
    }

    /// Right-hand side.
    pub fn rhs(&self) -> &SStructVector {
        &self.b
    }

    /// Solution.
    pub fn solution(&self) -> &SStructVector {
        &self.x
    }

    /// Temporary / residual vector.
    pub fn temporary(&self) -> &SStructVector {
        &self.tx
    }

    /// Matrix-vector workspace.
    pub fn matvec_workspace(&self) -> &MatvecWorkspace {
        &self.matvec
    }

    /// Smoother workspace.
    pub fn relax_workspace(&self) -> &RelaxWorkspace {
        &self.relax
    }

    /// Coarsening direction per part (`None` = not coarsened).
    pub fn coarsening_directions(&self) -> &[Option<Axis>] {
        &self.coarsen_dirs
    }

    /// Relaxation weight per part.
    pub fn relaxation_weights(&self) -> &[f64] {
        &self.relax_weights
    }

    /// Transfer from the next finer level into this one.
    pub fn incoming(&self) -> Option<&Transfer> {
        self.incoming.as_ref()
    }

    /// Every resource held by this level, in release order.
    pub fn resources(&self) -> Vec<(Resource, Ownership)> {
        let l = self.index;
        let mut out = vec![
            (Resource::RelaxWorkspace { level: l }, Ownership::Owned),
            (Resource::MatvecWorkspace { level: l }, Ownership::Owned),
            (Resource::Rhs { level: l }, self.b.ownership()),
            (Resource::Solution { level: l }, self.x.ownership()),
            (Resource::Temporary { level: l }, self.tx.ownership()),
            (Resource::Operator { level: l }, self.operator.ownership()),
            (Resource::Grid { level: l }, self.grid.ownership()),
        ];
        if self.incoming.is_some() {
            let t = l - 1;
            out.extend([
                (Resource::Interpolation { transfer: t }, Ownership::Owned),
                (Resource::Restriction { transfer: t }, Ownership::Owned),
                (Resource::RestrictWorkspace { transfer: t }, Ownership::Owned),
                (Resource::InterpWorkspace { transfer: t }, Ownership::Owned),
            ]);
        }
        out.extend([
            (Resource::CoarseningDirections { level: l }, Ownership::Owned),
            (Resource::RelaxWeights { level: l }, Ownership::Owned),
        ]);
        out
    }

    /// Release this level's slots in dependency order.
    ///
    /// Workspaces and vectors go before the operator they reference, the
    /// operator before its grid, and the incoming transfer after the level's
    /// own data.
    pub(crate) fn release(self, log: &mut ReleaseLog) {
        let l = self.index;
        let Level {
            grid,
            operator,
            b,
            x,
            tx,
            matvec,
            relax,
            coarsen_dirs,
            relax_weights,
            incoming,
            ..
        } = self;

        drop(relax);
        log.record(Resource::RelaxWorkspace { level: l }, Ownership::Owned);
        drop(matvec);
        log.record(Resource::MatvecWorkspace { level: l }, Ownership::Owned);
        log.record(Resource::Rhs { level: l }, b.release());
        log.record(Resource::Solution { level: l }, x.release());
        log.record(Resource::Temporary { level: l }, tx.release());
        log.record(Resource::Operator { level: l }, operator.release());
        log.record(Resource::Grid { level: l }, grid.release());

        if let Some(transfer) = incoming {
            let t = l - 1;
            let Transfer {
                interpolation,
                restriction,
                restrict_workspace,
                interp_workspace,
            } = transfer;
            drop(interpolation);
            log.record(Resource::Interpolation { transfer: t }, Ownership::Owned);
            drop(restriction);
            log.record(Resource::Restriction { transfer: t }, Ownership::Owned);
            drop(restrict_workspace);
            log.record(Resource::RestrictWorkspace { transfer: t }, Ownership::Owned);
            drop(interp_workspace);
            log.record(Resource::InterpWorkspace { transfer: t }, Ownership::Owned);
        }

        drop(coarsen_dirs);
        log.record(Resource::CoarseningDirections { level: l }, Ownership::Owned);
        drop(relax_weights);
        log.record(Resource::RelaxWeights { level: l }, Ownership::Owned);

        trace!(level = l, "level released");
    }
}

// ---------------------------------------------------------------------------
// Setup inputs
// ---------------------------------------------------------------------------

/// Caller-owned data of the finest level.
#[derive(Debug)]
pub struct FinestLevel<'a> {
    grid: &'a SStructGrid,
    operator: &'a SStructMatrix,
    b: &'a SStructVector,
    x: &'a SStructVector,
    coarsen_dirs: Option<Vec<Option<Axis>>>,
    relax_weights: Option<Vec<f64>>,
}

impl<'a> FinestLevel<'a> {
    /// Borrow the caller's grid, operator, right-hand side, and solution.
    pub fn new(
        grid: &'a SStructGrid,
        operator: &'a SStructMatrix,
        b: &'a SStructVector,
        x: &'a SStructVector,
    ) -> Self {
        Self {
            grid,
            operator,
            b,
            x,
            coarsen_dirs: None,
            relax_weights: None,
        }
    }

    /// Coarsening direction chosen per part.
    pub fn with_coarsening(mut self, dirs: Vec<Option<Axis>>) -> Self {
        self.coarsen_dirs = Some(dirs);
        self
    }

    /// Relaxation weight chosen per part.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.relax_weights = Some(weights);
        self
    }
}

/// A coarse level produced by the setup algorithm, together with the
/// transfer operators that connect the next finer level to it.
#[derive(Debug)]
pub struct CoarseLevel {
    grid: SStructGrid,
    operator: SStructMatrix,
    interpolation: CsrMatrix<f64>,
    restriction: CsrMatrix<f64>,
    coarsen_dirs: Option<Vec<Option<Axis>>>,
    relax_weights: Option<Vec<f64>>,
}

impl CoarseLevel {
    /// Coarse grid and operator plus the incoming `P` and `RT`.
    pub fn new(
        grid: SStructGrid,
        operator: SStructMatrix,
        interpolation: CsrMatrix<f64>,
        restriction: CsrMatrix<f64>,
    ) -> Self {
        Self {
            grid,
            operator,
            interpolation,
            restriction,
            coarsen_dirs: None,
            relax_weights: None,
        }
    }

    /// Coarsening direction chosen per part.
    pub fn with_coarsening(mut self, dirs: Vec<Option<Axis>>) -> Self {
        self.coarsen_dirs = Some(dirs);
        self
    }

    /// Relaxation weight chosen per part.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.relax_weights = Some(weights);
        self
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Registers the levels produced by the setup algorithm.
#[derive(Debug)]
pub struct HierarchyBuilder<'a> {
    finest: FinestLevel<'a>,
    coarse: Vec<CoarseLevel>,
}

impl<'a> HierarchyBuilder<'a> {
    /// Start a hierarchy on the caller's finest level.
    pub fn new(finest: FinestLevel<'a>) -> Self {
        Self {
            finest,
            coarse: Vec::new(),
        }
    }

    /// Append the next coarser level.
    pub fn push_level(mut self, level: CoarseLevel) -> Self {
        self.coarse.push(level);
        self
    }

    /// Number of levels registered so far.
    pub fn num_levels(&self) -> usize {
        1 + self.coarse.len()
    }

    /// Validate every level and allocate the hierarchy's own storage.
    ///
    /// # Errors
    ///
    /// - [`SsamgError::InvalidConfiguration`] if the level count exceeds
    ///   `max_levels` (when set) or the global level limit.
    /// - [`SsamgError::PreconditionViolation`] if a level's part count
    ///   differs from the finest level's or from the parts registered in
    ///   `config`.
    /// - [`SsamgError::InvalidInput`] for malformed operators, vectors,
    ///   transfers, or per-part annotations.
    pub fn finish(self, config: &SsamgConfig) -> Result<Hierarchy<'a>> {
        let num_levels = self.num_levels();
        check_count("num_levels", num_levels, MAX_LEVELS)?;
        if config.max_levels() > 0 && num_levels > config.max_levels() {
            return Err(SsamgError::InvalidConfiguration {
                name: "max_levels",
                reason: format!(
                    "{num_levels} levels registered but max_levels is {}",
                    config.max_levels()
                ),
            });
        }

        let num_parts = self.finest.grid.nparts();
        if let Some(registered) = config.num_parts() {
            if registered != num_parts {
                return Err(SsamgError::PreconditionViolation(format!(
                    "{registered} parts registered but the finest grid has {num_parts}"
                )));
            }
        }

        let params = SetupParams::from_config(config);
        let relax_type = params.relax_type;
        let default_weights = || vec![params.relax_weight; num_parts];
        let num_coarse = self.coarse.len();
        let mut levels = Vec::with_capacity(num_levels);

        // Finest level.
        let FinestLevel {
            grid,
            operator,
            b,
            x,
            coarsen_dirs,
            relax_weights,
        } = self.finest;
        validate_level_operator(grid, operator)?;
        let rows = operator.local_num_rows();
        validate_vector_len("b", b.len(), rows)?;
        validate_vector_len("x", x.len(), rows)?;
        let sweeps = if num_coarse == 0 {
            params.coarse_sweeps
        } else {
            params.pre_sweeps
        };
        levels.push(Level {
            index: 0,
            matvec: MatvecWorkspace::for_operator(operator),
            relax: RelaxWorkspace::for_operator(operator, relax_type, sweeps),
            coarsen_dirs: per_part("coarsening directions", coarsen_dirs, num_parts, || {
                vec![None; num_parts]
            })?,
            relax_weights: per_part(
                "relaxation weights",
                relax_weights,
                num_parts,
                default_weights,
            )?,
            grid: Held::Borrowed(grid),
            operator: Held::Borrowed(operator),
            b: Held::Borrowed(b),
            x: Held::Borrowed(x),
            tx: Held::Owned(SStructVector::zeros(rows)),
            incoming: None,
        });

        // Coarse levels.
        let mut fine_rows = rows;
        for (offset, coarse) in self.coarse.into_iter().enumerate() {
            let index = offset + 1;
            if coarse.grid.nparts() != num_parts {
                return Err(SsamgError::PreconditionViolation(format!(
                    "level {index} has {} parts but the finest level has {num_parts}",
                    coarse.grid.nparts()
                )));
            }
            validate_level_operator(&coarse.grid, &coarse.operator)?;
            let rows = coarse.operator.local_num_rows();
            validate_transfer(&coarse.interpolation, &coarse.restriction, fine_rows, rows)?;

            let sweeps = if index == num_levels - 1 {
                params.coarse_sweeps
            } else {
                params.pre_sweeps
            };
            let transfer = Transfer {
                interpolation: coarse.interpolation,
                restriction: coarse.restriction,
                restrict_workspace: TransferWorkspace::with_len(rows),
                interp_workspace: TransferWorkspace::with_len(fine_rows),
            };
            levels.push(Level {
                index,
                matvec: MatvecWorkspace::for_operator(&coarse.operator),
                relax: RelaxWorkspace::for_operator(&coarse.operator, relax_type, sweeps),
                coarsen_dirs: per_part(
                    "coarsening directions",
                    coarse.coarsen_dirs,
                    num_parts,
                    || vec![None; num_parts],
                )?,
                relax_weights: per_part(
                    "relaxation weights",
                    coarse.relax_weights,
                    num_parts,
                    default_weights,
                )?,
                grid: Held::Owned(coarse.grid),
                operator: Held::Owned(coarse.operator),
                b: Held::Owned(SStructVector::zeros(rows)),
                x: Held::Owned(SStructVector::zeros(rows)),
                tx: Held::Owned(SStructVector::zeros(rows)),
                incoming: Some(transfer),
            });
            trace!(level = index, rows, "coarse level registered");
            fine_rows = rows;
        }

        let reserved_weights = (num_levels..params.max_levels)
            .map(|_| vec![0.0; num_parts])
            .collect();

        debug!(num_levels, num_parts, "hierarchy built");
        Ok(Hierarchy {
            levels,
            reserved_weights,
            num_parts,
            params,
        })
    }
}

/// Take a per-part annotation or fall back to `default`, checking its
/// length against the part count.
fn per_part<T>(
    what: &str,
    given: Option<Vec<T>>,
    num_parts: usize,
    default: impl FnOnce() -> Vec<T>,
) -> Result<Vec<T>> {
    let values = given.unwrap_or_else(default);
    if values.len() != num_parts {
        return Err(ValidationError::DimensionMismatch(format!(
            "{} {what} given for {num_parts} parts",
            values.len()
        ))
        .into());
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Setup parameters
// ---------------------------------------------------------------------------

/// The configuration values baked into a hierarchy when it is finished.
///
/// A handle only accepts a hierarchy whose parameters match its own
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupParams {
    /// Relaxation scheme of every level's workspace.
    pub relax_type: RelaxationType,
    /// Default per-part weight for levels without explicit weights.
    pub relax_weight: f64,
    /// Sweeps on every level but the coarsest.
    pub pre_sweeps: usize,
    /// Sweeps on the coarsest level, with inheritance resolved.
    pub coarse_sweeps: usize,
    /// Level capacity; slots past the built levels are reserved.
    pub max_levels: usize,
}

impl SetupParams {
    /// Read the setup-relevant values out of `config`.
    pub fn from_config(config: &SsamgConfig) -> Self {
        Self {
            relax_type: config.relaxation_type(),
            relax_weight: config.relaxation_weight(),
            pre_sweeps: config.pre_sweeps(),
            coarse_sweeps: config.resolved_coarse_sweeps(),
            max_levels: config.max_levels(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// A complete, validated multilevel hierarchy.
#[derive(Debug)]
pub struct Hierarchy<'a> {
    levels: Vec<Level<'a>>,
    reserved_weights: Vec<Vec<f64>>,
    num_parts: usize,
    params: SetupParams,
}

impl<'a> Hierarchy<'a> {
    /// Number of levels (at least 1).
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of parts on every level.
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    /// Configuration values the hierarchy was finished with.
    pub fn setup_params(&self) -> &SetupParams {
        &self.params
    }

    /// Level `l`, if it exists.
    pub fn level(&self, l: usize) -> Option<&Level<'a>> {
        self.levels.get(l)
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[Level<'a>] {
        &self.levels
    }

    /// Transfer connecting level `l` to level `l + 1`.
    pub fn transfer(&self, l: usize) -> Option<&Transfer> {
        self.levels.get(l + 1).and_then(Level::incoming)
    }

    /// Number of transfers (always `num_levels() - 1`).
    pub fn num_transfers(&self) -> usize {
        self.levels.iter().filter(|l| l.incoming.is_some()).count()
    }

    /// Placeholder weight slots kept for the unused level capacity.
    pub fn reserved_weight_slots(&self) -> usize {
        self.reserved_weights.len()
    }

    /// Every resource held by the hierarchy, in release order.
    pub fn resources(&self) -> Vec<(Resource, Ownership)> {
        let mut out: Vec<_> = self.levels.iter().flat_map(Level::resources).collect();
        let first_reserved = self.levels.len();
        out.extend((0..self.reserved_weights.len()).map(|k| {
            (
                Resource::ReservedWeights {
                    level: first_reserved + k,
                },
                Ownership::Owned,
            )
        }));
        out.push((Resource::LevelTables, Ownership::Owned));
        out
    }

    /// Release every level, the reserved weight slots, and the level tables.
    pub(crate) fn release(self, log: &mut ReleaseLog) {
        let Hierarchy {
            levels,
            reserved_weights,
            ..
        } = self;
        let first_reserved = levels.len();

        for level in levels {
            level.release(log);
        }
        for (k, slot) in reserved_weights.into_iter().enumerate() {
            drop(slot);
            log.record(
                Resource::ReservedWeights {
                    level: first_reserved + k,
                },
                Ownership::Owned,
            );
        }
        log.record(Resource::LevelTables, Ownership::Owned);
    }
}
