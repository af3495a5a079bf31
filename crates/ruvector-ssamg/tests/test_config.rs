//! Integration tests for the parameter store.
//!
//! Property tests check that every accepted setter value reads back
//! unchanged and that rejected values leave the store untouched.

use proptest::prelude::*;
use ruvector_ssamg::config::{RelaxationType, SsamgConfig};
use ruvector_ssamg::error::SsamgError;
use ruvector_ssamg::validation::{MAX_ITERATIONS, MAX_LEVELS, MAX_SWEEPS};

fn relaxation_type() -> impl Strategy<Value = RelaxationType> {
    prop_oneof![
        Just(RelaxationType::Jacobi),
        Just(RelaxationType::WeightedJacobi),
        Just(RelaxationType::RedBlackGaussSeidel),
    ]
}

// ---------------------------------------------------------------------------
// Setter / getter round trips
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn accepted_values_read_back(
        tolerance in 1e-14f64..1.0,
        max_iterations in 0usize..=MAX_ITERATIONS,
        max_levels in 0usize..=MAX_LEVELS,
        relax_type in relaxation_type(),
        weight in -2.0f64..2.0,
        pre in 0usize..=MAX_SWEEPS,
        post in 0usize..=MAX_SWEEPS,
        logging in 0usize..4,
        print_level in 0usize..4,
    ) {
        let mut c = SsamgConfig::default();
        c.set_tolerance(tolerance).unwrap();
        c.set_max_iterations(max_iterations).unwrap();
        c.set_max_levels(max_levels).unwrap();
        c.set_relaxation_type(relax_type).unwrap();
        c.set_relaxation_weight(weight).unwrap();
        c.set_pre_sweeps(pre).unwrap();
        c.set_post_sweeps(post).unwrap();
        c.set_logging(logging).unwrap();
        c.set_print_level(print_level).unwrap();

        prop_assert_eq!(c.tolerance(), tolerance);
        prop_assert_eq!(c.max_iterations(), max_iterations);
        prop_assert_eq!(c.max_levels(), max_levels);
        prop_assert_eq!(c.relaxation_type(), relax_type);
        prop_assert_eq!(c.relaxation_weight(), weight);
        prop_assert_eq!(c.pre_sweeps(), pre);
        prop_assert_eq!(c.post_sweeps(), post);
        prop_assert_eq!(c.logging(), logging);
        prop_assert_eq!(c.print_level(), print_level);
    }

    #[test]
    fn coarse_sweeps_inherit_until_set(
        pre in 0usize..50,
        coarse in proptest::option::of(0usize..50),
    ) {
        let mut c = SsamgConfig::default();
        c.set_pre_sweeps(pre).unwrap();
        c.set_coarse_sweeps(coarse).unwrap();
        prop_assert_eq!(c.coarse_sweeps(), coarse);
        prop_assert_eq!(c.resolved_coarse_sweeps(), coarse.unwrap_or(pre));
    }

    #[test]
    fn rejected_tolerance_leaves_store_unchanged(tolerance in prop_oneof![
        Just(0.0f64),
        -1e6f64..0.0,
        Just(f64::NAN),
        Just(f64::INFINITY),
    ]) {
        let mut c = SsamgConfig::default();
        let before = c.clone();
        let rejected = matches!(
            c.set_tolerance(tolerance),
            Err(SsamgError::InvalidConfiguration { name: "tolerance", .. })
        );
        prop_assert!(rejected);
        prop_assert_eq!(c, before);
    }

    #[test]
    fn relaxation_codes_round_trip(relax_type in relaxation_type()) {
        prop_assert_eq!(RelaxationType::try_from(relax_type.code()).unwrap(), relax_type);
    }
}

// ---------------------------------------------------------------------------
// Limits and spacing
// ---------------------------------------------------------------------------

#[test]
fn test_counts_above_limits_are_rejected() {
    let mut c = SsamgConfig::default();
    assert!(c.set_max_iterations(MAX_ITERATIONS + 1).is_err());
    assert!(c.set_max_levels(MAX_LEVELS + 1).is_err());
    assert!(c.set_pre_sweeps(MAX_SWEEPS + 1).is_err());
    assert!(c.set_coarse_sweeps(Some(MAX_SWEEPS + 1)).is_err());
    assert_eq!(c, SsamgConfig::default());
}

#[test]
fn test_unknown_relaxation_code() {
    assert!(matches!(
        RelaxationType::try_from(7),
        Err(SsamgError::InvalidConfiguration { name: "relax_type", .. })
    ));
}

#[test]
fn test_grid_spacing_requires_registered_parts() {
    let mut c = SsamgConfig::default();
    assert!(c.set_grid_spacing(&[[1.0; 3]]).is_err());

    c.register_parts(2);
    assert_eq!(c.grid_spacing(), &[[0.0; 3]; 2]);
    assert!(matches!(
        c.set_grid_spacing(&[[1.0; 3]]),
        Err(SsamgError::PreconditionViolation(_))
    ));
    c.set_grid_spacing(&[[1.0, 2.0, 3.0], [0.5; 3]]).unwrap();
    assert_eq!(c.grid_spacing()[0], [1.0, 2.0, 3.0]);
}

#[test]
fn test_config_serde_round_trip() {
    let mut c = SsamgConfig::default();
    c.set_tolerance(1e-8).unwrap();
    c.set_relaxation_type(RelaxationType::RedBlackGaussSeidel).unwrap();
    c.set_coarse_sweeps(Some(3)).unwrap();
    c.register_parts(1);
    c.set_grid_spacing(&[[0.25, 0.5, 1.0]]).unwrap();

    let json = serde_json::to_string(&c).unwrap();
    let back: SsamgConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
}

#[test]
fn test_partial_config_fills_defaults() {
    let c: SsamgConfig = serde_json::from_str(r#"{"max_iterations": 50}"#).unwrap();
    assert_eq!(c.max_iterations(), 50);
    assert_eq!(c.tolerance(), 1e-6);
    assert_eq!(c.coarse_sweeps(), None);
}

#[test]
fn test_deserialized_values_go_through_setter_checks() {
    for json in [
        r#"{"tolerance": -1.0}"#,
        r#"{"max_iterations": 10000000}"#,
        r#"{"max_levels": 1000}"#,
        r#"{"pre_sweeps": 1001}"#,
    ] {
        assert!(serde_json::from_str::<SsamgConfig>(json).is_err(), "{json} accepted");
    }

    let err = serde_json::from_str::<SsamgConfig>(r#"{"tolerance": 0.0}"#).unwrap_err();
    assert!(err.to_string().contains("tolerance"));
}
