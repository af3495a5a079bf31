//! The SSAMG handle: configuration, hierarchy ownership, convergence
//! logging, statistics, and teardown.
//!
//! # Lifecycle
//!
//! 1. [`SsAmg::create`] on every rank of the process group.
//! 2. Adjust parameters through [`SsAmg::configure`].
//! 3. Build a [`Hierarchy`] with the setup algorithm and
//!    [`install`](SsAmg::install) it; the configuration is frozen from here.
//! 4. The solve loop reports residuals via
//!    [`record_residual`](SsAmg::record_residual) and closes with
//!    [`finalize`](SsAmg::finalize).
//! 5. Query [`compute_stats`](crate::stats::compute_stats),
//!    [`final_relative_residual_norm`](SsAmg::final_relative_residual_norm).
//! 6. [`SsAmg::destroy`] consumes the handle and returns the release log.
//!
//! # Example
//!
//! ```rust
//! use ruvector_ssamg::audit::audit_release;
//! use ruvector_ssamg::comm::SerialGroup;
//! use ruvector_ssamg::grid::*;
//! use ruvector_ssamg::hierarchy::{FinestLevel, HierarchyBuilder};
//! use ruvector_ssamg::solver::SsAmg;
//! use ruvector_ssamg::types::{CsrMatrix, ParCsrMatrix};
//!
//! let sgrid = StructGrid::new(1, vec![GridBox::new([0, 0, 0], [3, 0, 0])]);
//! let grid = SStructGrid::new(vec![PartGrid { grid: sgrid.clone(), nvars: 1 }]);
//! let a = SStructMatrix::new(
//!     vec![PartMatrix::scalar(StructMatrix::zeros(sgrid, Stencil::laplacian(1)))],
//!     ParCsrMatrix::local(0, CsrMatrix::identity(4)),
//! );
//! let (b, x) = (SStructVector::zeros(4), SStructVector::zeros(4));
//!
//! let mut amg = SsAmg::create(&SerialGroup);
//! amg.configure().unwrap().set_logging(1).unwrap();
//! let hierarchy = HierarchyBuilder::new(FinestLevel::new(&grid, &a, &b, &x))
//!     .finish(amg.config())
//!     .unwrap();
//! amg.install(hierarchy).unwrap();
//!
//! amg.record_residual(0, 1.0, 1.0).unwrap();
//! amg.record_residual(1, 0.1, 0.1).unwrap();
//! amg.finalize(1).unwrap();
//! assert_eq!(amg.final_relative_residual_norm().unwrap(), 0.1);
//!
//! let manifest = amg.manifest();
//! let log = amg.destroy();
//! assert!(audit_release(&manifest, &log).is_empty());
//! ```

use tracing::{debug, instrument};

use crate::audit::ResourceManifest;
use crate::config::SsamgConfig;
use crate::error::{Result, SsamgError};
use crate::events::{Ownership, ReleaseLog, Resource};
use crate::hierarchy::{Hierarchy, SetupParams};
use crate::history::{ConvergenceHistory, ConvergenceLog, ConvergenceRow};
use crate::report::{emit_convergence, emit_stats};
use crate::stats::{compute_stats, StatsSnapshot};
use crate::traits::ProcessGroup;

/// Handle of one SSAMG instance on one rank.
///
/// The lifetime `'a` is that of the caller's finest-level data, which the
/// installed hierarchy borrows.
#[derive(Debug)]
pub struct SsAmg<'a> {
    rank: usize,
    group_size: usize,
    config: SsamgConfig,
    hierarchy: Option<Hierarchy<'a>>,
    log: Option<ConvergenceLog>,
    coarse_sweeps: Option<usize>,
}

impl<'a> SsAmg<'a> {
    /// Create a handle with default parameters on `comm`.
    pub fn create<G: ProcessGroup + ?Sized>(comm: &G) -> Self {
        Self::with_config(comm, SsamgConfig::default())
    }

    /// Create a handle with the given parameters on `comm`.
    pub fn with_config<G: ProcessGroup + ?Sized>(comm: &G, config: SsamgConfig) -> Self {
        debug!(rank = comm.rank(), size = comm.size(), "SSAMG handle created");
        Self {
            rank: comm.rank(),
            group_size: comm.size(),
            config,
            hierarchy: None,
            log: None,
            coarse_sweeps: None,
        }
    }

    // -------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------

    /// Current parameters.
    pub fn config(&self) -> &SsamgConfig {
        &self.config
    }

    /// Mutable parameters, available until a hierarchy is installed.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] once a hierarchy is installed.
    pub fn configure(&mut self) -> Result<&mut SsamgConfig> {
        if self.hierarchy.is_some() {
            return Err(SsamgError::PreconditionViolation(
                "configuration is frozen once the hierarchy is installed".into(),
            ));
        }
        Ok(&mut self.config)
    }

    // -------------------------------------------------------------------
    // Hierarchy
    // -------------------------------------------------------------------

    /// Take ownership of a built hierarchy.
    ///
    /// Registers the hierarchy's parts if none were registered, resolves the
    /// coarse sweep count, and allocates the convergence history when
    /// `logging > 0`.
    ///
    /// # Errors
    ///
    /// - [`SsamgError::PreconditionViolation`] if a hierarchy is already
    ///   installed, it was finished with setup parameters other than this
    ///   handle's configuration, or the part counts disagree.
    /// - [`SsamgError::InvalidConfiguration`] if the hierarchy has more
    ///   levels than `max_levels`.
    pub fn install(&mut self, hierarchy: Hierarchy<'a>) -> Result<()> {
        if self.hierarchy.is_some() {
            return Err(SsamgError::PreconditionViolation(
                "a hierarchy is already installed".into(),
            ));
        }
        let expected = SetupParams::from_config(&self.config);
        if *hierarchy.setup_params() != expected {
            return Err(SsamgError::PreconditionViolation(format!(
                "hierarchy was finished with {:?} but the handle is configured with {expected:?}",
                hierarchy.setup_params()
            )));
        }
        let num_levels = hierarchy.num_levels();
        let max_levels = self.config.max_levels();
        if max_levels > 0 && num_levels > max_levels {
            return Err(SsamgError::InvalidConfiguration {
                name: "max_levels",
                reason: format!(
                    "hierarchy has {num_levels} levels but max_levels is {max_levels}"
                ),
            });
        }
        match self.config.num_parts() {
            Some(n) if n != hierarchy.num_parts() => {
                return Err(SsamgError::PreconditionViolation(format!(
                    "{n} parts registered but the hierarchy has {}",
                    hierarchy.num_parts()
                )));
            }
            Some(_) => {}
            None => self.config.register_parts(hierarchy.num_parts()),
        }

        self.coarse_sweeps = Some(self.config.resolved_coarse_sweeps());
        self.log = Some(ConvergenceLog::new(
            self.config.logging(),
            self.config.max_iterations(),
        ));
        debug!(
            num_levels,
            num_parts = hierarchy.num_parts(),
            logging = self.config.logging(),
            "hierarchy installed"
        );
        self.hierarchy = Some(hierarchy);
        Ok(())
    }

    /// The installed hierarchy.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] before [`install`](Self::install).
    pub fn hierarchy(&self) -> Result<&Hierarchy<'a>> {
        self.hierarchy.as_ref().ok_or_else(|| {
            SsamgError::PreconditionViolation("no hierarchy has been built".into())
        })
    }

    /// Number of levels, or `None` before a hierarchy is installed.
    pub fn num_levels(&self) -> Option<usize> {
        self.hierarchy.as_ref().map(Hierarchy::num_levels)
    }

    /// Number of registered parts, or `None` if none were registered.
    pub fn num_parts(&self) -> Option<usize> {
        self.config.num_parts()
    }

    /// Coarse sweep count resolved at install time.
    pub fn num_coarse_sweeps(&self) -> Option<usize> {
        self.coarse_sweeps
    }

    /// Rank this handle was created on.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Check that `comm` is the group this handle was created on.
    pub(crate) fn check_group<G: ProcessGroup + ?Sized>(&self, comm: &G) -> Result<()> {
        if comm.rank() != self.rank || comm.size() != self.group_size {
            return Err(SsamgError::PreconditionViolation(format!(
                "handle belongs to rank {} of {} but was given rank {} of {}",
                self.rank,
                self.group_size,
                comm.rank(),
                comm.size()
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Convergence history
    // -------------------------------------------------------------------

    fn convergence_log_mut(&mut self) -> Result<&mut ConvergenceLog> {
        self.log.as_mut().ok_or_else(|| {
            SsamgError::PreconditionViolation("no hierarchy has been built".into())
        })
    }

    /// Record the residual of one solve iteration.
    ///
    /// Ignored when `logging == 0`.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] before install, after
    /// [`finalize`](Self::finalize), or for `iteration > max_iterations`.
    pub fn record_residual(&mut self, iteration: usize, norm: f64, rel_norm: f64) -> Result<()> {
        self.convergence_log_mut()?
            .record_residual(iteration, norm, rel_norm)
    }

    /// Mark the solve as finished after `num_iterations` iterations.
    pub fn finalize(&mut self, num_iterations: usize) -> Result<()> {
        self.convergence_log_mut()?.finalize(num_iterations)
    }

    /// Iterations performed by the last solve (0 before any solve).
    pub fn num_iterations(&self) -> usize {
        self.log.as_ref().map_or(0, ConvergenceLog::num_iterations)
    }

    /// Relative residual norm of the last solve.
    ///
    /// # Errors
    ///
    /// - [`SsamgError::LoggingDisabled`] if `logging == 0`.
    /// - [`SsamgError::InvalidConfiguration`] if `max_iterations == 0`.
    /// - [`SsamgError::PreconditionViolation`] before install.
    pub fn final_relative_residual_norm(&self) -> Result<f64> {
        if self.config.logging() == 0 {
            return Err(SsamgError::LoggingDisabled);
        }
        self.log
            .as_ref()
            .ok_or_else(|| SsamgError::PreconditionViolation("no hierarchy has been built".into()))?
            .final_relative_residual_norm()
    }

    /// Stored residual history, if logging is enabled and a hierarchy is
    /// installed.
    pub fn history(&self) -> Option<&ConvergenceHistory> {
        self.log.as_ref().and_then(ConvergenceLog::history)
    }

    // -------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------

    /// Compute and emit the hierarchy statistics when `print_level > 0`.
    ///
    /// Collective when enabled: every rank must call it. Returns the
    /// snapshot on the root; `Ok(None)` elsewhere and, without any
    /// communication, when `print_level == 0`.
    #[instrument(skip(self, comm), fields(print_level = self.config.print_level()))]
    pub fn print_stats<G: ProcessGroup + ?Sized>(
        &self,
        comm: &G,
    ) -> Result<Option<StatsSnapshot>> {
        let print_level = self.config.print_level();
        if print_level == 0 {
            return Ok(None);
        }
        self.check_group(comm)?;
        let snapshot = compute_stats(self, comm)?;
        if let Some(s) = &snapshot {
            emit_stats(s, print_level);
        }
        Ok(snapshot)
    }

    /// Emit the convergence table on the root when `print_level > 0` and
    /// `logging > 1`, returning its rows.
    ///
    /// Not collective.
    pub fn print_logging<G: ProcessGroup + ?Sized>(
        &self,
        comm: &G,
    ) -> Result<Option<Vec<ConvergenceRow>>> {
        self.check_group(comm)?;
        let print_level = self.config.print_level();
        if !comm.is_root() || print_level == 0 || self.config.logging() <= 1 {
            return Ok(None);
        }
        let log = self.log.as_ref().ok_or_else(|| {
            SsamgError::PreconditionViolation("no hierarchy has been built".into())
        })?;
        let rows = log.rows(print_level);
        emit_convergence(&rows);
        Ok(Some(rows))
    }

    // -------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------

    /// Every resource the handle currently holds, in release order.
    pub fn manifest(&self) -> ResourceManifest {
        let mut entries = Vec::new();
        if self.history().is_some() {
            entries.push((Resource::ResidualNorms, Ownership::Owned));
            entries.push((Resource::RelativeResidualNorms, Ownership::Owned));
        }
        if let Some(h) = &self.hierarchy {
            entries.extend(h.resources());
        }
        if let Some(n) = self.config.num_parts() {
            entries.extend((0..n).map(|part| (Resource::PartSpacing { part }, Ownership::Owned)));
            entries.push((Resource::SpacingTable, Ownership::Owned));
        }
        entries.push((Resource::Handle, Ownership::Owned));
        ResourceManifest::new(entries)
    }

    /// Release everything the handle holds, in dependency order.
    ///
    /// Residual history first, then the hierarchy level by level (finest
    /// first, each coarse level together with its incoming transfer), the
    /// reserved weight slots and level tables, the grid spacing of every
    /// registered part, and finally the handle. Caller data borrowed by the
    /// finest level is never dropped.
    pub fn destroy(mut self) -> ReleaseLog {
        let mut log = ReleaseLog::new();

        if let Some(history) = self.log.as_mut().and_then(ConvergenceLog::take_history) {
            drop(history);
            log.record(Resource::ResidualNorms, Ownership::Owned);
            log.record(Resource::RelativeResidualNorms, Ownership::Owned);
        }

        if let Some(hierarchy) = self.hierarchy.take() {
            let num_levels = hierarchy.num_levels();
            hierarchy.release(&mut log);
            debug!(num_levels, "hierarchy released");
        }

        if let Some(spacing) = self.config.take_grid_spacing() {
            for part in 0..spacing.len() {
                log.record(Resource::PartSpacing { part }, Ownership::Owned);
            }
            drop(spacing);
            log.record(Resource::SpacingTable, Ownership::Owned);
        }

        drop(self);
        log.record(Resource::Handle, Ownership::Owned);
        debug!(released = log.len(), "SSAMG handle destroyed");
        log
    }
}

/// Destroy `handle` if there is one; `None` releases nothing.
pub fn destroy(handle: Option<SsAmg<'_>>) -> ReleaseLog {
    handle.map(SsAmg::destroy).unwrap_or_default()
}
