//! Semi-structured grids, stencils, and operators.
//!
//! A level's operator is a [`SStructMatrix`]: one [`PartMatrix`] per part,
//! each an `nvars x nvars` grid of optional [`StructMatrix`] blocks over a
//! box-decomposed [`StructGrid`], plus the row-distributed
//! [`ParCsrMatrix`] that carries every locally stored row (structured rows,
//! inter-part couplings, and ghost rows).

use serde::{Deserialize, Serialize};

use crate::types::ParCsrMatrix;

/// Integer index-space box `[imin, imax]` (inclusive on both ends).
///
/// A box with `imax[d] == imin[d] - 1` along some axis is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBox {
    /// Lower corner.
    pub imin: [i64; 3],
    /// Upper corner.
    pub imax: [i64; 3],
}

impl GridBox {
    /// Box spanning `imin..=imax`.
    pub fn new(imin: [i64; 3], imax: [i64; 3]) -> Self {
        Self { imin, imax }
    }

    /// Number of cells along `axis` (never negative).
    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        (self.imax[axis] - self.imin[axis] + 1).max(0) as usize
    }

    /// Number of cells in the box.
    #[inline]
    pub fn volume(&self) -> usize {
        (0..3).map(|d| self.extent(d)).product()
    }
}

/// The locally owned boxes of one structured grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructGrid {
    /// Spatial dimension (1, 2, or 3).
    pub ndim: usize,
    /// Locally owned boxes.
    pub boxes: Vec<GridBox>,
}

impl StructGrid {
    /// Grid made of the given boxes.
    pub fn new(ndim: usize, boxes: Vec<GridBox>) -> Self {
        Self { ndim, boxes }
    }

    /// Number of locally owned boxes.
    #[inline]
    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }

    /// Number of locally owned grid points.
    pub fn local_size(&self) -> usize {
        self.boxes.iter().map(GridBox::volume).sum()
    }
}

/// Fixed pattern of grid-relative offsets defining a structured row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stencil {
    /// Offsets relative to the row's grid point.
    pub offsets: Vec<[i32; 3]>,
}

impl Stencil {
    /// Stencil with the given offsets.
    pub fn new(offsets: Vec<[i32; 3]>) -> Self {
        Self { offsets }
    }

    /// Standard `2 * ndim + 1` point Laplacian stencil.
    pub fn laplacian(ndim: usize) -> Self {
        let mut offsets = vec![[0, 0, 0]];
        for d in 0..ndim.min(3) {
            let mut lo = [0; 3];
            let mut hi = [0; 3];
            lo[d] = -1;
            hi[d] = 1;
            offsets.push(lo);
            offsets.push(hi);
        }
        Self { offsets }
    }

    /// Number of stencil entries.
    #[inline]
    pub fn size(&self) -> usize {
        self.offsets.len()
    }
}

/// Structured operator block: one stencil row per grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMatrix {
    /// Grid whose points carry the rows.
    pub grid: StructGrid,
    /// Row pattern.
    pub stencil: Stencil,
    /// Coefficients, `stencil.size()` per grid point, point-major.
    pub data: Vec<f64>,
}

impl StructMatrix {
    /// Zero-initialised block over `grid` with pattern `stencil`.
    pub fn zeros(grid: StructGrid, stencil: Stencil) -> Self {
        let data = vec![0.0; grid.local_size() * stencil.size()];
        Self {
            grid,
            stencil,
            data,
        }
    }

    /// Number of locally owned rows (degrees of freedom).
    #[inline]
    pub fn local_dofs(&self) -> usize {
        self.grid.local_size()
    }
}

/// Variable-coupling blocks of one part: an `nvars x nvars` grid in which a
/// block is `None` when the two variables do not couple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartMatrix {
    /// Number of variables on the part.
    pub nvars: usize,
    /// Row-major `nvars * nvars` blocks.
    pub blocks: Vec<Option<StructMatrix>>,
}

impl PartMatrix {
    /// Part with `nvars` variables and no blocks.
    pub fn new(nvars: usize) -> Self {
        Self {
            nvars,
            blocks: vec![None; nvars * nvars],
        }
    }

    /// Part with a single variable coupled to itself by `block`.
    pub fn scalar(block: StructMatrix) -> Self {
        Self {
            nvars: 1,
            blocks: vec![Some(block)],
        }
    }

    /// Block coupling variable `vi` to `vj`, if present.
    #[inline]
    pub fn block(&self, vi: usize, vj: usize) -> Option<&StructMatrix> {
        self.blocks.get(vi * self.nvars + vj).and_then(Option::as_ref)
    }

    /// Install the block coupling `vi` to `vj`.
    pub fn set_block(&mut self, vi: usize, vj: usize, block: StructMatrix) {
        self.blocks[vi * self.nvars + vj] = Some(block);
    }

    /// Iterate over the blocks that are present.
    pub fn present_blocks(&self) -> impl Iterator<Item = &StructMatrix> {
        self.blocks.iter().flatten()
    }
}

/// Grid of one part: its boxes and how many variables live on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartGrid {
    /// Boxes of the part.
    pub grid: StructGrid,
    /// Variables per grid point.
    pub nvars: usize,
}

/// Semi-structured grid: a set of parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SStructGrid {
    /// Per-part grids.
    pub parts: Vec<PartGrid>,
}

impl SStructGrid {
    /// Grid made of `parts`.
    pub fn new(parts: Vec<PartGrid>) -> Self {
        Self { parts }
    }

    /// Number of parts.
    #[inline]
    pub fn nparts(&self) -> usize {
        self.parts.len()
    }
}

/// Semi-structured operator of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SStructMatrix {
    /// Structured blocks per part.
    pub parts: Vec<PartMatrix>,
    /// Every locally stored row in distributed CSR form.
    pub unstructured: ParCsrMatrix,
}

impl SStructMatrix {
    /// Operator with the given parts and distributed rows.
    pub fn new(parts: Vec<PartMatrix>, unstructured: ParCsrMatrix) -> Self {
        Self {
            parts,
            unstructured,
        }
    }

    /// Number of parts.
    #[inline]
    pub fn nparts(&self) -> usize {
        self.parts.len()
    }

    /// Number of rows stored on this process.
    #[inline]
    pub fn local_num_rows(&self) -> usize {
        self.unstructured.local_num_rows()
    }
}

/// Semi-structured vector: one value per locally stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SStructVector {
    /// Local values.
    pub values: Vec<f64>,
}

impl SStructVector {
    /// Zero vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Number of local entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the vector holds no local entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
