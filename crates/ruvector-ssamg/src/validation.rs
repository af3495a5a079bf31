//! Eager validation for configuration values and level data.
//!
//! Level data arrives from the external setup algorithm; every check here runs
//! when the level is registered, so the statistics pass and the release walk
//! never index past the end of a block or a part table.
//!
//! # Limits
//!
//! | Resource        | Limit     | Constant           |
//! |-----------------|-----------|--------------------|
//! | Iterations      | 1,000,000 | [`MAX_ITERATIONS`] |
//! | Levels          | 64        | [`MAX_LEVELS`]     |
//! | Sweeps per pass | 1,000     | [`MAX_SWEEPS`]     |

use crate::error::{Result, SsamgError, ValidationError};
use crate::grid::{SStructGrid, SStructMatrix};
use crate::types::{CsrMatrix, ParCsrMatrix};

/// Maximum iteration budget.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Maximum number of levels in one hierarchy.
pub const MAX_LEVELS: usize = 64;

/// Maximum smoothing sweeps in a single pass.
pub const MAX_SWEEPS: usize = 1_000;

/// Reject a count above `limit`.
pub fn check_count(name: &'static str, value: usize, limit: usize) -> Result<()> {
    if value > limit {
        return Err(SsamgError::InvalidConfiguration {
            name,
            reason: format!("{value} exceeds the limit of {limit}"),
        });
    }
    Ok(())
}

/// Validate the structural integrity of a CSR block.
///
/// Checks, in order: `row_ptr` length, monotonicity, boundary values,
/// `col_indices` / `values` length agreement, column bounds, and finiteness.
pub fn validate_csr(matrix: &CsrMatrix<f64>) -> std::result::Result<(), ValidationError> {
    if matrix.row_ptr.len() != matrix.rows + 1 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr length {} does not equal rows + 1 = {}",
            matrix.row_ptr.len(),
            matrix.rows + 1,
        )));
    }

    for i in 1..matrix.row_ptr.len() {
        if matrix.row_ptr[i] < matrix.row_ptr[i - 1] {
            return Err(ValidationError::NonMonotonicRowPtrs { position: i });
        }
    }

    let nnz = matrix.values.len();
    if matrix.row_ptr[0] != 0 || matrix.row_ptr[matrix.rows] != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr spans {}..{} but {} values are stored",
            matrix.row_ptr[0], matrix.row_ptr[matrix.rows], nnz,
        )));
    }
    if matrix.col_indices.len() != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_indices length {} does not match values length {}",
            matrix.col_indices.len(),
            nnz,
        )));
    }

    for row in 0..matrix.rows {
        for (col, &val) in matrix.row_entries(row) {
            if col >= matrix.cols {
                return Err(ValidationError::IndexOutOfBounds {
                    index: col,
                    row,
                    cols: matrix.cols,
                });
            }
            if !val.is_finite() {
                return Err(ValidationError::NonFiniteValue(format!(
                    "matrix[{row}, {col}] = {val}"
                )));
            }
        }
    }

    Ok(())
}

/// Validate a row-distributed operator: both blocks well formed, the same
/// number of rows, and one global column per `offd` column.
pub fn validate_parcsr(matrix: &ParCsrMatrix) -> std::result::Result<(), ValidationError> {
    validate_csr(&matrix.diag)?;
    validate_csr(&matrix.offd)?;

    if matrix.diag.rows != matrix.offd.rows {
        return Err(ValidationError::DimensionMismatch(format!(
            "diag has {} rows but offd has {}",
            matrix.diag.rows, matrix.offd.rows,
        )));
    }
    if matrix.col_map_offd.len() != matrix.offd.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_map_offd has {} entries for {} offd columns",
            matrix.col_map_offd.len(),
            matrix.offd.cols,
        )));
    }
    Ok(())
}

/// Validate a level operator against its grid.
///
/// The operator must have one [`PartMatrix`](crate::grid::PartMatrix) per
/// grid part with matching `nvars`, every present block must carry
/// `stencil.size()` coefficients per grid point, and no box may be inverted.
pub fn validate_level_operator(
    grid: &SStructGrid,
    matrix: &SStructMatrix,
) -> std::result::Result<(), ValidationError> {
    if grid.nparts() != matrix.nparts() {
        return Err(ValidationError::DimensionMismatch(format!(
            "grid has {} parts but operator has {}",
            grid.nparts(),
            matrix.nparts(),
        )));
    }

    for (part, (pgrid, pmatrix)) in grid.parts.iter().zip(&matrix.parts).enumerate() {
        if pgrid.nvars != pmatrix.nvars || pmatrix.blocks.len() != pmatrix.nvars * pmatrix.nvars {
            return Err(ValidationError::DimensionMismatch(format!(
                "part {part}: grid declares {} variables, operator holds {} blocks for {}",
                pgrid.nvars,
                pmatrix.blocks.len(),
                pmatrix.nvars,
            )));
        }
        for block in pmatrix.present_blocks() {
            for (index, b) in block.grid.boxes.iter().enumerate() {
                if let Some(axis) = (0..3).find(|&d| b.imax[d] < b.imin[d] - 1) {
                    return Err(ValidationError::InvertedBox { index, axis });
                }
            }
            let expected = block.local_dofs() * block.stencil.size();
            if block.data.len() != expected {
                return Err(ValidationError::DimensionMismatch(format!(
                    "part {part}: block stores {} coefficients, expected {expected}",
                    block.data.len(),
                )));
            }
        }
    }

    validate_parcsr(&matrix.unstructured)
}

/// Validate a vector length against the operator's local row count.
pub fn validate_vector_len(
    name: &str,
    len: usize,
    rows: usize,
) -> std::result::Result<(), ValidationError> {
    if len != rows {
        return Err(ValidationError::DimensionMismatch(format!(
            "{name} has {len} entries but the operator stores {rows} rows"
        )));
    }
    Ok(())
}

/// Validate the transfer pair between a fine level with `fine_rows` local
/// rows and a coarse level with `coarse_rows`.
///
/// `P` must be `fine_rows x coarse_rows` and `RT` its transpose shape.
pub fn validate_transfer(
    interpolation: &CsrMatrix<f64>,
    restriction: &CsrMatrix<f64>,
    fine_rows: usize,
    coarse_rows: usize,
) -> std::result::Result<(), ValidationError> {
    validate_csr(interpolation)?;
    validate_csr(restriction)?;

    if (interpolation.rows, interpolation.cols) != (fine_rows, coarse_rows) {
        return Err(ValidationError::DimensionMismatch(format!(
            "interpolation is {}x{}, expected {fine_rows}x{coarse_rows}",
            interpolation.rows, interpolation.cols,
        )));
    }
    if (restriction.rows, restriction.cols) != (coarse_rows, fine_rows) {
        return Err(ValidationError::DimensionMismatch(format!(
            "restriction is {}x{}, expected {coarse_rows}x{fine_rows}",
            restriction.rows, restriction.cols,
        )));
    }
    Ok(())
}
