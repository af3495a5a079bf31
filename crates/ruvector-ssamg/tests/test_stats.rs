//! Integration tests for the distributed statistics pass.
//!
//! Tests cover the reductions across a two-rank thread group, the guards on
//! levels without nonzero rows or structured dofs, serial hierarchies, and
//! the print-level gating of `print_stats`.

mod helpers;

use approx::assert_relative_eq;
use ruvector_ssamg::comm::SerialGroup;
use ruvector_ssamg::config::{RelaxationType, SsamgConfig};
use ruvector_ssamg::error::SsamgError;
use ruvector_ssamg::grid::Stencil;
use ruvector_ssamg::hierarchy::{Axis, CoarseLevel, FinestLevel, HierarchyBuilder};
use ruvector_ssamg::solver::SsAmg;
use ruvector_ssamg::stats::{compute_stats, StatsSnapshot};
use ruvector_ssamg::traits::ProcessGroup;

use helpers::{
    aggregation_pair, installed, line_level, on_ranks, two_rank_operator, Fixture, RankData,
};

// ---------------------------------------------------------------------------
// Multi-rank reductions
// ---------------------------------------------------------------------------

#[test]
fn test_two_rank_operator_stats() {
    let results = on_ranks(2, |c| {
        let data = RankData::new(two_rank_operator(c.rank()), Stencil::laplacian(1));
        let amg = data.handle(c);
        compute_stats(&amg, c).unwrap()
    });

    assert!(results[1].is_none());
    let snapshot = results[0].as_ref().unwrap();
    assert_eq!(snapshot.levels.len(), 1);

    let s = &snapshot.levels[0];
    assert_eq!(s.rows, 3);
    assert_eq!(s.nonzero_rows, 2);
    assert_eq!(s.nonzeros, 8);
    assert_eq!(s.min_entries, 3);
    assert_eq!(s.max_entries, 5);
    assert_relative_eq!(s.avg_entries, 4.0);
    assert_relative_eq!(s.min_rowsum, 2.0);
    assert_relative_eq!(s.max_rowsum, 4.0);

    assert_eq!(s.active_parts, 2);
    assert_eq!(s.boxes, 2);
    assert_eq!(s.dofs, 3);
    assert_eq!(s.ghost_rows, 0);
    assert_eq!((s.min_stencil, s.max_stencil), (3, 3));
    assert_relative_eq!(s.avg_stencil, 3.0);
}

#[test]
fn test_stencil_bounds_span_ranks() {
    let results = on_ranks(3, |c| {
        let stencil = Stencil::laplacian(c.rank() + 1);
        let data = RankData::new(
            ruvector_ssamg::types::ParCsrMatrix::local(
                c.rank() * 4,
                helpers::laplacian_1d(4),
            ),
            stencil,
        );
        compute_stats(&data.handle(c), c).unwrap()
    });

    let s = &results[0].as_ref().unwrap().levels[0];
    assert_eq!(s.dofs, 12);
    assert_eq!((s.min_stencil, s.max_stencil), (3, 7));
    assert_relative_eq!(s.avg_stencil, (3.0 + 5.0 + 7.0) / 3.0);
    assert!(results[1..].iter().all(Option::is_none));
}

#[test]
fn test_rank_without_dofs_does_not_lower_stencil_minimum() {
    let results = on_ranks(2, |c| {
        let rows = if c.rank() == 0 { 4 } else { 0 };
        let data = RankData::new(
            ruvector_ssamg::types::ParCsrMatrix::local(0, helpers::laplacian_1d(rows)),
            Stencil::laplacian(2),
        );
        compute_stats(&data.handle(c), c).unwrap()
    });

    let s = &results[0].as_ref().unwrap().levels[0];
    assert_eq!(s.dofs, 4);
    assert_eq!((s.min_stencil, s.max_stencil), (5, 5));
    assert_eq!(s.nonzero_rows, 4);
    // An empty operator contribution reports zeros, which do reach the
    // entry-count minimum.
    assert_eq!((s.min_entries, s.max_entries), (0, 3));
}

#[test]
fn test_mismatched_group_is_rejected_before_communication() {
    let fx = Fixture::line(4);
    let amg = installed(&fx, 1, SsamgConfig::default());
    let results = on_ranks(2, |c| compute_stats(&amg, c).map(|_| ()));
    for r in results {
        assert!(matches!(r, Err(SsamgError::PreconditionViolation(_))));
    }
}

// ---------------------------------------------------------------------------
// Guarded statistics
// ---------------------------------------------------------------------------

#[test]
fn test_level_without_dofs_reports_zeros() {
    let fx = Fixture::line(4);
    let (grid, a) = line_level(1, 0);
    let (p, rt) = aggregation_pair(4, 0);
    let hierarchy = HierarchyBuilder::new(
        FinestLevel::new(&fx.grid, &fx.a, &fx.b, &fx.x).with_coarsening(vec![Some(Axis::X)]),
    )
    .push_level(CoarseLevel::new(grid, a, p, rt))
    .finish(&SsamgConfig::default())
    .unwrap();

    let mut amg = SsAmg::create(&SerialGroup);
    amg.install(hierarchy).unwrap();
    let snapshot = compute_stats(&amg, &SerialGroup).unwrap().unwrap();

    let s = &snapshot.levels[1];
    assert_eq!(s.rows, 0);
    assert_eq!(s.dofs, 0);
    assert_eq!((s.min_stencil, s.max_stencil), (0, 0));
    assert_eq!(s.avg_stencil, 0.0);
    assert_eq!(s.nonzero_rows, 0);
    assert_eq!((s.min_entries, s.max_entries), (0, 0));
    assert_eq!(s.avg_entries, 0.0);
    assert!(s.min_rowsum == 0.0 && s.min_rowsum.is_sign_positive());
    assert!(s.avg_entries.is_finite() && s.avg_stencil.is_finite());
}

// ---------------------------------------------------------------------------
// Serial hierarchies
// ---------------------------------------------------------------------------

#[test]
fn test_serial_line_hierarchy() {
    let fx = Fixture::lines(2, 8);
    let amg = installed(&fx, 3, SsamgConfig::default());
    let snapshot = compute_stats(&amg, &SerialGroup).unwrap().unwrap();
    assert_eq!(snapshot.levels.len(), 3);

    let fine = &snapshot.levels[0];
    assert_eq!(fine.rows, 16);
    assert_eq!(fine.nonzeros, 3 * 16 - 2);
    assert_eq!((fine.min_entries, fine.max_entries), (2, 3));
    assert_relative_eq!(fine.avg_entries, 46.0 / 16.0);
    assert_relative_eq!(fine.min_rowsum, 0.0);
    assert_relative_eq!(fine.max_rowsum, 1.0);
    assert_eq!(fine.active_parts, 2);
    assert_eq!(fine.dofs, 16);

    for (l, s) in snapshot.levels.iter().enumerate() {
        assert_eq!(s.level, l);
        assert_eq!(s.rows, 2 * helpers::level_size(8, l));
        assert_eq!(s.ghost_rows, 0);
    }

    let setup = &snapshot.setup;
    assert_eq!(setup.num_levels, 3);
    assert_eq!(setup.num_parts, 2);
    assert_eq!(setup.coarsening.len(), 2);
    assert_eq!(setup.coarsening[0], vec![Some(Axis::X); 2]);
    assert_eq!(setup.weights.len(), 3);
    assert_eq!(setup.weights[1], vec![2.0 / 3.0; 2]);
}

#[test]
fn test_snapshot_serializes() {
    let fx = Fixture::line(8);
    let mut config = SsamgConfig::default();
    config.set_relaxation_type(RelaxationType::WeightedJacobi).unwrap();
    let amg = installed(&fx, 2, config);
    let snapshot = compute_stats(&amg, &SerialGroup).unwrap().unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: StatsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.levels, snapshot.levels);
    assert_eq!(back.setup.relax_type, RelaxationType::WeightedJacobi);
    assert_eq!(back.setup.coarsening, snapshot.setup.coarsening);
    assert_relative_eq!(back.setup.weights[1][0], 2.0 / 3.0);
}

#[test]
fn test_stats_need_a_hierarchy() {
    let amg = SsAmg::create(&SerialGroup);
    assert!(matches!(
        compute_stats(&amg, &SerialGroup),
        Err(SsamgError::PreconditionViolation(_))
    ));
}

// ---------------------------------------------------------------------------
// print_stats gating
// ---------------------------------------------------------------------------

#[test]
fn test_print_stats_is_silent_at_print_level_zero() {
    // Without a hierarchy compute_stats would fail, so Ok(None) proves the
    // pass was skipped.
    let amg = SsAmg::create(&SerialGroup);
    assert_eq!(amg.print_stats(&SerialGroup).unwrap(), None);
}

#[test]
fn test_print_stats_returns_snapshot_when_enabled() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ruvector_ssamg=info")
        .with_test_writer()
        .try_init();

    let fx = Fixture::lines(2, 8);
    let mut config = SsamgConfig::default();
    config.set_print_level(2).unwrap();
    config.set_relaxation_type(RelaxationType::WeightedJacobi).unwrap();
    let amg = installed(&fx, 3, config);

    let printed = amg.print_stats(&SerialGroup).unwrap().unwrap();
    let computed = compute_stats(&amg, &SerialGroup).unwrap().unwrap();
    assert_eq!(printed, computed);
}

#[test]
fn test_print_stats_only_returns_on_root() {
    let results = on_ranks(2, |c| {
        let data = RankData::new(two_rank_operator(c.rank()), Stencil::laplacian(1));
        let mut amg = SsAmg::create(c);
        amg.configure().unwrap().set_print_level(1).unwrap();
        let finest = FinestLevel::new(&data.grid, &data.a, &data.b, &data.x);
        let hierarchy = HierarchyBuilder::new(finest)
            .finish(amg.config())
            .unwrap();
        amg.install(hierarchy).unwrap();
        amg.print_stats(c).unwrap().is_some()
    });
    assert_eq!(results, vec![true, false]);
}
