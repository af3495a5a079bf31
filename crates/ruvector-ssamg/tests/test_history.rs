//! Integration tests for convergence logging through the solver handle.
//!
//! Tests cover the final relative residual rule at and below the iteration
//! budget, disabled logging, the convergence table stride, and the history
//! lifecycle states.

mod helpers;

use approx::assert_relative_eq;
use ruvector_ssamg::comm::SerialGroup;
use ruvector_ssamg::config::SsamgConfig;
use ruvector_ssamg::error::SsamgError;
use ruvector_ssamg::history::HistoryState;
use ruvector_ssamg::solver::SsAmg;
use ruvector_ssamg::traits::ProcessGroup;

use helpers::{installed, on_ranks, Fixture};

fn logged(logging: usize, max_iterations: usize, print_level: usize) -> SsamgConfig {
    let mut config = SsamgConfig::default();
    config.set_logging(logging).unwrap();
    config.set_max_iterations(max_iterations).unwrap();
    config.set_print_level(print_level).unwrap();
    config
}

/// Record `norm[i] = 2^-i`, `rel[i] = i / 10` for `0..=iterations` and
/// finalize after `iterations`.
fn run(amg: &mut SsAmg<'_>, iterations: usize) {
    for i in 0..=iterations.min(amg.config().max_iterations()) {
        amg.record_residual(i, 0.5f64.powi(i as i32), i as f64 / 10.0)
            .unwrap();
    }
    amg.finalize(iterations).unwrap();
}

// ---------------------------------------------------------------------------
// Final relative residual
// ---------------------------------------------------------------------------

#[test]
fn test_exhausted_budget_reports_last_recorded_iteration() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 2, logged(1, 10, 0));
    run(&mut amg, 10);
    assert_eq!(amg.num_iterations(), 10);
    assert_relative_eq!(amg.final_relative_residual_norm().unwrap(), 0.9);
}

#[test]
fn test_early_exit_reports_post_solve_residual() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 2, logged(1, 10, 0));
    run(&mut amg, 4);
    assert_eq!(amg.num_iterations(), 4);
    assert_relative_eq!(amg.final_relative_residual_norm().unwrap(), 0.4);
}

#[test]
fn test_disabled_logging_keeps_only_the_iteration_count() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(0, 10, 3));
    run(&mut amg, 6);

    assert_eq!(amg.num_iterations(), 6);
    assert!(amg.history().is_none());
    assert!(matches!(
        amg.final_relative_residual_norm(),
        Err(SsamgError::LoggingDisabled)
    ));
    assert_eq!(amg.print_logging(&SerialGroup).unwrap(), None);
}

#[test]
fn test_zero_budget_is_a_configuration_error() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(1, 0, 0));
    amg.record_residual(0, 1.0, 1.0).unwrap();
    amg.finalize(0).unwrap();
    assert!(matches!(
        amg.final_relative_residual_norm(),
        Err(SsamgError::InvalidConfiguration { name: "max_iterations", .. })
    ));
}

#[test]
fn test_residuals_need_a_hierarchy() {
    let mut amg = SsAmg::create(&SerialGroup);
    assert!(matches!(
        amg.record_residual(0, 1.0, 1.0),
        Err(SsamgError::PreconditionViolation(_))
    ));
    assert_eq!(amg.num_iterations(), 0);
}

// ---------------------------------------------------------------------------
// History lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_history_moves_through_its_states() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(1, 5, 0));
    assert_eq!(amg.history().unwrap().state(), HistoryState::Uninitialized);
    assert_eq!(amg.history().unwrap().norms().len(), 6);

    amg.record_residual(0, 1.0, 1.0).unwrap();
    assert_eq!(amg.history().unwrap().state(), HistoryState::Recording);

    amg.finalize(0).unwrap();
    assert_eq!(amg.history().unwrap().state(), HistoryState::Finalized);
    assert!(matches!(
        amg.record_residual(1, 0.5, 0.5),
        Err(SsamgError::PreconditionViolation(_))
    ));
    assert!(amg.finalize(1).is_err());
}

#[test]
fn test_iteration_beyond_budget_is_rejected() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(1, 3, 0));
    assert!(amg.record_residual(3, 0.1, 0.1).is_ok());
    assert!(matches!(
        amg.record_residual(4, 0.1, 0.1),
        Err(SsamgError::PreconditionViolation(_))
    ));
}

// ---------------------------------------------------------------------------
// Convergence table
// ---------------------------------------------------------------------------

#[test]
fn test_convergence_table_stride() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(2, 20, 3));
    run(&mut amg, 8);

    let rows = amg.print_logging(&SerialGroup).unwrap().unwrap();
    let iterations: Vec<_> = rows.iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, vec![0, 3, 6, 7]);

    assert_relative_eq!(rows[0].rate, 1.0);
    assert_relative_eq!(rows[1].norm, 0.125);
    assert_relative_eq!(rows[1].rate, 0.5);
    assert_relative_eq!(rows[3].relative_norm, 0.7);
}

#[test]
fn test_convergence_table_does_not_repeat_last_row() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(2, 20, 2));
    run(&mut amg, 7);

    let rows = amg.print_logging(&SerialGroup).unwrap().unwrap();
    let iterations: Vec<_> = rows.iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, vec![0, 2, 4, 6]);
}

#[test]
fn test_convergence_table_needs_detailed_logging() {
    let fx = Fixture::line(8);
    let mut amg = installed(&fx, 1, logged(1, 20, 1));
    run(&mut amg, 3);
    assert_eq!(amg.print_logging(&SerialGroup).unwrap(), None);
}

#[test]
fn test_convergence_table_is_root_only() {
    let printed = on_ranks(3, |c| {
        let fx = Fixture::line(4);
        let mut amg = SsAmg::with_config(c, logged(2, 5, 1));
        let hierarchy = helpers::build_hierarchy(&fx, 1, amg.config());
        amg.install(hierarchy).unwrap();
        run(&mut amg, 2);
        (c.rank(), amg.print_logging(c).unwrap().map(|rows| rows.len()))
    });
    assert_eq!(printed, vec![(0, Some(2)), (1, None), (2, None)]);
}
