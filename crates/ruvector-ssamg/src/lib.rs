//! Control and diagnostics layer for semi-structured algebraic multigrid
//! (SSAMG).
//!
//! This crate owns what sits around the multigrid cycle rather than the
//! cycle itself: the solver parameters, the multilevel hierarchy with its
//! asymmetric ownership (the finest level is borrowed from the caller, every
//! coarser level is owned), the convergence history of the outer solve loop,
//! and hierarchy-wide statistics reduced across a process group.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`SsamgConfig`](config::SsamgConfig) parameters |
//! | [`hierarchy`] | level records, transfers, [`HierarchyBuilder`](hierarchy::HierarchyBuilder) |
//! | [`solver`] | the [`SsAmg`](solver::SsAmg) handle and its teardown |
//! | [`history`] | residual logger and the final-residual rule |
//! | [`stats`] | [`compute_stats`](stats::compute_stats) collective |
//! | [`report`] | column semantics and `tracing` output |
//! | [`audit`] | leak / double-release detector over a [`ReleaseLog`](events::ReleaseLog) |
//! | [`traits`], [`comm`] | process-group seam and implementations |
//!
//! # Example
//!
//! ```rust
//! use ruvector_ssamg::comm::SerialGroup;
//! use ruvector_ssamg::grid::*;
//! use ruvector_ssamg::hierarchy::{FinestLevel, HierarchyBuilder};
//! use ruvector_ssamg::solver::SsAmg;
//! use ruvector_ssamg::stats::compute_stats;
//! use ruvector_ssamg::types::{CsrMatrix, ParCsrMatrix};
//!
//! // One part, one variable, a 4-point line with a 3-point stencil.
//! let sgrid = StructGrid::new(1, vec![GridBox::new([0, 0, 0], [3, 0, 0])]);
//! let grid = SStructGrid::new(vec![PartGrid { grid: sgrid.clone(), nvars: 1 }]);
//! let a = SStructMatrix::new(
//!     vec![PartMatrix::scalar(StructMatrix::zeros(sgrid, Stencil::laplacian(1)))],
//!     ParCsrMatrix::local(0, CsrMatrix::identity(4)),
//! );
//! let (b, x) = (SStructVector::zeros(4), SStructVector::zeros(4));
//!
//! let mut amg = SsAmg::create(&SerialGroup);
//! let hierarchy = HierarchyBuilder::new(FinestLevel::new(&grid, &a, &b, &x))
//!     .finish(amg.config())
//!     .unwrap();
//! amg.install(hierarchy).unwrap();
//!
//! let snapshot = compute_stats(&amg, &SerialGroup).unwrap().unwrap();
//! assert_eq!(snapshot.levels[0].nonzeros, 4);
//! assert_eq!(snapshot.levels[0].max_stencil, 3);
//! ```

pub mod audit;
pub mod comm;
pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod hierarchy;
pub mod history;
pub mod report;
pub mod solver;
pub mod stats;
pub mod traits;
pub mod types;
pub mod validation;
