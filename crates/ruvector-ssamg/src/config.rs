//! Solver parameters for the SSAMG cycle.
//!
//! [`SsamgConfig`] is a plain value object: every setter validates its
//! argument and mutates only the store itself. A handle hands out mutable
//! access to its configuration until a hierarchy is installed; after that the
//! configuration is frozen.
//!
//! # Example
//!
//! ```rust
//! use ruvector_ssamg::config::{RelaxationType, SsamgConfig};
//!
//! let mut config = SsamgConfig::default();
//! config.set_tolerance(1e-8).unwrap();
//! config.set_relaxation_type(RelaxationType::WeightedJacobi).unwrap();
//! config.set_pre_sweeps(2).unwrap();
//!
//! // Coarse sweeps inherit the pre-sweep count until set explicitly.
//! assert_eq!(config.resolved_coarse_sweeps(), 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsamgError};
use crate::validation::{check_count, MAX_ITERATIONS, MAX_LEVELS, MAX_SWEEPS};

/// Grid spacing of one part, one entry per axis.
pub type Spacing = [f64; 3];

/// Smoother applied on every level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelaxationType {
    /// Plain Jacobi (legacy code 0).
    #[default]
    Jacobi,
    /// Jacobi with per-part relaxation weights (legacy code 1).
    WeightedJacobi,
    /// Red-black Gauss-Seidel (legacy code 2).
    RedBlackGaussSeidel,
}

impl RelaxationType {
    /// Legacy integer code of this smoother.
    pub fn code(self) -> i32 {
        match self {
            RelaxationType::Jacobi => 0,
            RelaxationType::WeightedJacobi => 1,
            RelaxationType::RedBlackGaussSeidel => 2,
        }
    }

    /// `true` for smoothers that use the per-part relaxation weights.
    pub fn is_weighted(self) -> bool {
        self != RelaxationType::Jacobi
    }
}

impl TryFrom<i32> for RelaxationType {
    type Error = SsamgError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(RelaxationType::Jacobi),
            1 => Ok(RelaxationType::WeightedJacobi),
            2 => Ok(RelaxationType::RedBlackGaussSeidel),
            other => Err(SsamgError::InvalidConfiguration {
                name: "relax_type",
                reason: format!("unknown relaxation code {other} (expected 0, 1, or 2)"),
            }),
        }
    }
}

impl fmt::Display for RelaxationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelaxationType::Jacobi => write!(f, "Jacobi"),
            RelaxationType::WeightedJacobi => write!(f, "Weighted Jacobi"),
            RelaxationType::RedBlackGaussSeidel => write!(f, "Red-Black Gauss-Seidel"),
        }
    }
}

/// Configuration store for one SSAMG handle.
///
/// Defaults: tolerance `1e-6`, 200 iterations, relative-change and
/// zero-guess off, `max_levels` 0 (no cap), Jacobi relaxation with weight
/// `0.0`, one pre- and one post-sweep, coarse sweeps unset, logging and
/// print level 0, no parts registered.
///
/// Deserialization goes through the setters, so a stored configuration is
/// held to the same limits as one built in code; missing fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SsamgConfigInput")]
pub struct SsamgConfig {
    tolerance: f64,
    max_iterations: usize,
    rel_change: bool,
    zero_guess: bool,
    max_levels: usize,
    relax_type: RelaxationType,
    relax_weight: f64,
    pre_sweeps: usize,
    post_sweeps: usize,
    /// `None` means "use `pre_sweeps`".
    coarse_sweeps: Option<usize>,
    logging: usize,
    print_level: usize,
    /// `None` until parts are registered; then one triple per part.
    grid_spacing: Option<Vec<Spacing>>,
}

impl Default for SsamgConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 200,
            rel_change: false,
            zero_guess: false,
            max_levels: 0,
            relax_type: RelaxationType::Jacobi,
            relax_weight: 0.0,
            pre_sweeps: 1,
            post_sweeps: 1,
            coarse_sweeps: None,
            logging: 0,
            print_level: 0,
            grid_spacing: None,
        }
    }
}

/// Unvalidated wire form of [`SsamgConfig`]; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SsamgConfigInput {
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
    rel_change: Option<bool>,
    zero_guess: Option<bool>,
    max_levels: Option<usize>,
    relax_type: Option<RelaxationType>,
    relax_weight: Option<f64>,
    pre_sweeps: Option<usize>,
    post_sweeps: Option<usize>,
    coarse_sweeps: Option<usize>,
    logging: Option<usize>,
    print_level: Option<usize>,
    grid_spacing: Option<Vec<Spacing>>,
}

impl TryFrom<SsamgConfigInput> for SsamgConfig {
    type Error = SsamgError;

    fn try_from(input: SsamgConfigInput) -> Result<Self> {
        let mut c = SsamgConfig::default();
        if let Some(v) = input.tolerance {
            c.set_tolerance(v)?;
        }
        if let Some(v) = input.max_iterations {
            c.set_max_iterations(v)?;
        }
        if let Some(v) = input.rel_change {
            c.set_rel_change(v)?;
        }
        if let Some(v) = input.zero_guess {
            c.set_zero_guess(v)?;
        }
        if let Some(v) = input.max_levels {
            c.set_max_levels(v)?;
        }
        if let Some(v) = input.relax_type {
            c.set_relaxation_type(v)?;
        }
        if let Some(v) = input.relax_weight {
            c.set_relaxation_weight(v)?;
        }
        if let Some(v) = input.pre_sweeps {
            c.set_pre_sweeps(v)?;
        }
        if let Some(v) = input.post_sweeps {
            c.set_post_sweeps(v)?;
        }
        c.set_coarse_sweeps(input.coarse_sweeps)?;
        if let Some(v) = input.logging {
            c.set_logging(v)?;
        }
        if let Some(v) = input.print_level {
            c.set_print_level(v)?;
        }
        if let Some(spacing) = input.grid_spacing {
            c.register_parts(spacing.len());
            c.set_grid_spacing(&spacing)?;
        }
        Ok(c)
    }
}

impl SsamgConfig {
    // -------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------

    /// Set the convergence tolerance. Must be positive and finite.
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<()> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(SsamgError::InvalidConfiguration {
                name: "tolerance",
                reason: format!("{tolerance:.2e} is not a positive finite value"),
            });
        }
        self.tolerance = tolerance;
        Ok(())
    }

    /// Set the iteration budget of the solve loop.
    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        check_count("max_iterations", max_iterations, MAX_ITERATIONS)?;
        self.max_iterations = max_iterations;
        Ok(())
    }

    /// Cap the number of levels the setup may build (0 = no cap).
    pub fn set_max_levels(&mut self, max_levels: usize) -> Result<()> {
        check_count("max_levels", max_levels, MAX_LEVELS)?;
        self.max_levels = max_levels;
        Ok(())
    }

    /// Enable the relative-change stopping test.
    pub fn set_rel_change(&mut self, rel_change: bool) -> Result<()> {
        self.rel_change = rel_change;
        Ok(())
    }

    /// Treat the initial guess as zero.
    pub fn set_zero_guess(&mut self, zero_guess: bool) -> Result<()> {
        self.zero_guess = zero_guess;
        Ok(())
    }

    /// Select the smoother.
    pub fn set_relaxation_type(&mut self, relax_type: RelaxationType) -> Result<()> {
        self.relax_type = relax_type;
        Ok(())
    }

    /// Set the user relaxation weight. Must be finite; `0.0` lets the setup
    /// pick per-part weights.
    pub fn set_relaxation_weight(&mut self, weight: f64) -> Result<()> {
        if !weight.is_finite() {
            return Err(SsamgError::InvalidConfiguration {
                name: "relax_weight",
                reason: format!("{weight} is not finite"),
            });
        }
        self.relax_weight = weight;
        Ok(())
    }

    /// Number of smoothing sweeps before restriction.
    pub fn set_pre_sweeps(&mut self, sweeps: usize) -> Result<()> {
        check_count("pre_sweeps", sweeps, MAX_SWEEPS)?;
        self.pre_sweeps = sweeps;
        Ok(())
    }

    /// Number of smoothing sweeps after interpolation.
    pub fn set_post_sweeps(&mut self, sweeps: usize) -> Result<()> {
        check_count("post_sweeps", sweeps, MAX_SWEEPS)?;
        self.post_sweeps = sweeps;
        Ok(())
    }

    /// Number of sweeps on the coarsest level; `None` inherits the
    /// pre-sweep count.
    pub fn set_coarse_sweeps(&mut self, sweeps: Option<usize>) -> Result<()> {
        if let Some(n) = sweeps {
            check_count("coarse_sweeps", n, MAX_SWEEPS)?;
        }
        self.coarse_sweeps = sweeps;
        Ok(())
    }

    /// Verbosity of the statistics and convergence printers.
    pub fn set_print_level(&mut self, print_level: usize) -> Result<()> {
        self.print_level = print_level;
        Ok(())
    }

    /// Convergence logging level (0 disables the residual history).
    pub fn set_logging(&mut self, logging: usize) -> Result<()> {
        self.logging = logging;
        Ok(())
    }

    /// Register `nparts` parts, resetting their grid spacing to zero.
    pub fn register_parts(&mut self, nparts: usize) {
        self.grid_spacing = Some(vec![[0.0; 3]; nparts]);
    }

    /// Set the grid spacing of every registered part.
    ///
    /// # Errors
    ///
    /// [`SsamgError::PreconditionViolation`] if parts were never registered
    /// or `spacing.len()` differs from the registered part count.
    pub fn set_grid_spacing(&mut self, spacing: &[Spacing]) -> Result<()> {
        let slots = self.grid_spacing.as_mut().ok_or_else(|| {
            SsamgError::PreconditionViolation(
                "grid spacing set before any part was registered".into(),
            )
        })?;
        if slots.len() != spacing.len() {
            return Err(SsamgError::PreconditionViolation(format!(
                "grid spacing given for {} parts but {} are registered",
                spacing.len(),
                slots.len(),
            )));
        }
        slots.copy_from_slice(spacing);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------

    /// Convergence tolerance.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Iteration budget.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Level cap (0 = no cap).
    #[inline]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Relative-change stopping test flag.
    #[inline]
    pub fn rel_change(&self) -> bool {
        self.rel_change
    }

    /// Zero initial guess flag.
    #[inline]
    pub fn zero_guess(&self) -> bool {
        self.zero_guess
    }

    /// Smoother.
    #[inline]
    pub fn relaxation_type(&self) -> RelaxationType {
        self.relax_type
    }

    /// User relaxation weight.
    #[inline]
    pub fn relaxation_weight(&self) -> f64 {
        self.relax_weight
    }

    /// Pre-smoothing sweeps.
    #[inline]
    pub fn pre_sweeps(&self) -> usize {
        self.pre_sweeps
    }

    /// Post-smoothing sweeps.
    #[inline]
    pub fn post_sweeps(&self) -> usize {
        self.post_sweeps
    }

    /// Coarse sweeps exactly as set (`None` = inherit).
    #[inline]
    pub fn coarse_sweeps(&self) -> Option<usize> {
        self.coarse_sweeps
    }

    /// Coarse sweeps with the inheritance rule applied.
    #[inline]
    pub fn resolved_coarse_sweeps(&self) -> usize {
        self.coarse_sweeps.unwrap_or(self.pre_sweeps)
    }

    /// Print level.
    #[inline]
    pub fn print_level(&self) -> usize {
        self.print_level
    }

    /// Logging level.
    #[inline]
    pub fn logging(&self) -> usize {
        self.logging
    }

    /// Number of registered parts, if any were registered.
    #[inline]
    pub fn num_parts(&self) -> Option<usize> {
        self.grid_spacing.as_ref().map(Vec::len)
    }

    /// Grid spacing per registered part (empty before registration).
    pub fn grid_spacing(&self) -> &[Spacing] {
        self.grid_spacing.as_deref().unwrap_or(&[])
    }

    /// Move the spacing table out (used by the release walk).
    pub(crate) fn take_grid_spacing(&mut self) -> Option<Vec<Spacing>> {
        self.grid_spacing.take()
    }
}
