//! Shared test helpers for the ruvector-ssamg integration test suite.
//!
//! Provides deterministic grid/operator fixtures, multilevel hierarchy
//! builders, and small multi-rank drivers used across all test modules.

#![allow(dead_code)]

use ruvector_ssamg::comm::{ThreadComm, ThreadGroup};
use ruvector_ssamg::config::SsamgConfig;
use ruvector_ssamg::grid::{
    GridBox, PartGrid, PartMatrix, SStructGrid, SStructMatrix, SStructVector, Stencil, StructGrid,
    StructMatrix,
};
use ruvector_ssamg::hierarchy::{Axis, CoarseLevel, FinestLevel, Hierarchy, HierarchyBuilder};
use ruvector_ssamg::solver::SsAmg;
use ruvector_ssamg::types::{CsrMatrix, ParCsrMatrix};

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// Level fixtures
// ---------------------------------------------------------------------------

/// 1-D grid of `n` points as a single-variable, single-box part.
pub fn line_grid(n: usize) -> StructGrid {
    StructGrid::new(1, vec![GridBox::new([0, 0, 0], [n as i64 - 1, 0, 0])])
}

/// Tridiagonal `[-1, 2, -1]` operator on `n` local rows.
pub fn laplacian_1d(n: usize) -> CsrMatrix<f64> {
    let mut entries = Vec::with_capacity(3 * n);
    for i in 0..n {
        entries.push((i, i, 2.0));
        if i > 0 {
            entries.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            entries.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::<f64>::from_coo(n, n, entries)
}

/// Grid and operator of a level made of `nparts` line parts of `n` points.
pub fn line_level(nparts: usize, n: usize) -> (SStructGrid, SStructMatrix) {
    let sgrid = line_grid(n);
    let grid = SStructGrid::new(
        (0..nparts)
            .map(|_| PartGrid {
                grid: sgrid.clone(),
                nvars: 1,
            })
            .collect(),
    );
    let parts = (0..nparts)
        .map(|_| PartMatrix::scalar(StructMatrix::zeros(sgrid.clone(), Stencil::laplacian(1))))
        .collect();
    let matrix = SStructMatrix::new(parts, ParCsrMatrix::local(0, laplacian_1d(nparts * n)));
    (grid, matrix)
}

/// Piecewise-constant interpolation from `coarse` to `fine` rows and its
/// transpose.
pub fn aggregation_pair(fine: usize, coarse: usize) -> (CsrMatrix<f64>, CsrMatrix<f64>) {
    let entries: Vec<_> = if coarse == 0 {
        Vec::new()
    } else {
        (0..fine).map(|i| (i, (i * coarse / fine.max(1)).min(coarse - 1), 1.0)).collect()
    };
    let p = CsrMatrix::<f64>::from_coo(fine, coarse, entries);
    let rt = p.transpose();
    (p, rt)
}

/// Caller-owned finest-level data.
pub struct Fixture {
    pub nparts: usize,
    pub n: usize,
    pub grid: SStructGrid,
    pub a: SStructMatrix,
    pub b: SStructVector,
    pub x: SStructVector,
}

impl Fixture {
    /// `nparts` parts of `n` points each.
    pub fn lines(nparts: usize, n: usize) -> Self {
        let (grid, a) = line_level(nparts, n);
        let rows = a.local_num_rows();
        let mut rng = Lcg::new(42);
        let b = SStructVector {
            values: (0..rows).map(|_| rng.next_f64_range(-1.0, 1.0)).collect(),
        };
        Self {
            nparts,
            n,
            grid,
            a,
            b,
            x: SStructVector::zeros(rows),
        }
    }

    /// Single part of `n` points.
    pub fn line(n: usize) -> Self {
        Self::lines(1, n)
    }
}

/// Points per part on level `l` when halving from `n`.
pub fn level_size(n: usize, l: usize) -> usize {
    (n >> l).max(1)
}

/// Build a hierarchy of `num_levels` levels on `fx`, halving each part per
/// level and coarsening along x.
pub fn build_hierarchy<'a>(
    fx: &'a Fixture,
    num_levels: usize,
    config: &SsamgConfig,
) -> Hierarchy<'a> {
    let dirs = vec![Some(Axis::X); fx.nparts];
    let mut builder = HierarchyBuilder::new(
        FinestLevel::new(&fx.grid, &fx.a, &fx.b, &fx.x).with_coarsening(dirs.clone()),
    );
    for l in 1..num_levels {
        let fine = fx.nparts * level_size(fx.n, l - 1);
        let n = level_size(fx.n, l);
        let (grid, a) = line_level(fx.nparts, n);
        let (p, rt) = aggregation_pair(fine, fx.nparts * n);
        let mut level = CoarseLevel::new(grid, a, p, rt)
            .with_weights(vec![2.0 / 3.0; fx.nparts]);
        if l + 1 < num_levels {
            level = level.with_coarsening(dirs.clone());
        }
        builder = builder.push_level(level);
    }
    builder.finish(config).unwrap()
}

/// A handle with a `num_levels` hierarchy on `fx` installed.
pub fn installed<'a>(fx: &'a Fixture, num_levels: usize, config: SsamgConfig) -> SsAmg<'a> {
    let mut amg = SsAmg::with_config(&ruvector_ssamg::comm::SerialGroup, config);
    let hierarchy = build_hierarchy(fx, num_levels, amg.config());
    amg.install(hierarchy).unwrap();
    amg
}

// ---------------------------------------------------------------------------
// Multi-rank drivers
// ---------------------------------------------------------------------------

/// Run `f` on every rank of an `n`-rank thread group and collect the results
/// in rank order.
pub fn on_ranks<T: Send>(n: usize, f: impl Fn(&ThreadComm) -> T + Sync) -> Vec<T> {
    let ranks = ThreadGroup::split(n);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = ranks.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Local operator of the two-rank example.
///
/// Rank 0 stores rows 0 and 1: row 0 has three entries (two local, one
/// remote), row 1 is structurally empty. Rank 1 stores row 2 with five
/// entries (one local, four remote).
pub fn two_rank_operator(rank: usize) -> ParCsrMatrix {
    match rank {
        0 => ParCsrMatrix {
            first_row: 0,
            diag: CsrMatrix::<f64>::from_coo(2, 2, vec![(0, 0, 4.0), (0, 1, -1.0)]),
            offd: CsrMatrix::<f64>::from_coo(2, 1, vec![(0, 0, -1.0)]),
            col_map_offd: vec![2],
        },
        _ => ParCsrMatrix {
            first_row: 2,
            diag: CsrMatrix::<f64>::from_coo(1, 1, vec![(0, 0, 8.0)]),
            offd: CsrMatrix::<f64>::from_coo(
                1,
                4,
                vec![(0, 0, -1.0), (0, 1, -1.0), (0, 2, -1.0), (0, 3, -1.0)],
            ),
            col_map_offd: vec![0, 1, 3, 4],
        },
    }
}

/// Single-level rank data whose structured part covers every stored row.
pub struct RankData {
    pub grid: SStructGrid,
    pub a: SStructMatrix,
    pub b: SStructVector,
    pub x: SStructVector,
}

impl RankData {
    /// Wrap a distributed operator with a line part of matching size and
    /// the given stencil.
    pub fn new(unstructured: ParCsrMatrix, stencil: Stencil) -> Self {
        let rows = unstructured.local_num_rows();
        let sgrid = line_grid(rows);
        let grid = SStructGrid::new(vec![PartGrid {
            grid: sgrid.clone(),
            nvars: 1,
        }]);
        let a = SStructMatrix::new(
            vec![PartMatrix::scalar(StructMatrix::zeros(sgrid, stencil))],
            unstructured,
        );
        Self {
            grid,
            a,
            b: SStructVector::zeros(rows),
            x: SStructVector::zeros(rows),
        }
    }

    /// Install a one-level hierarchy on a handle created on `comm`.
    pub fn handle<'a>(&'a self, comm: &ThreadComm) -> SsAmg<'a> {
        let mut amg = SsAmg::create(comm);
        let finest = FinestLevel::new(&self.grid, &self.a, &self.b, &self.x);
        let hierarchy = HierarchyBuilder::new(finest)
            .finish(amg.config())
            .unwrap();
        amg.install(hierarchy).unwrap();
        amg
    }
}
