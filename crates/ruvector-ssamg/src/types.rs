//! Sparse storage shared by the hierarchy and the statistics pass.
//!
//! [`CsrMatrix`] holds a compressed sparse row block (operator blocks and the
//! inter-level transfer operators). [`ParCsrMatrix`] is the row-distributed
//! operator: the rows owned by this process split into a `diag` block
//! (locally owned columns) and an `offd` block (columns owned by other
//! processes).

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CsrMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Row (CSR) matrix.
///
/// # Layout
///
/// For a matrix with `m` rows and `nnz` non-zeros:
/// - `row_ptr` has length `m + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix<T> {
    /// Row pointers into `col_indices` / `values`.
    pub row_ptr: Vec<usize>,
    /// Column index of each stored entry.
    pub col_indices: Vec<usize>,
    /// Value of each stored entry.
    pub values: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> CsrMatrix<T> {
    /// A matrix with `rows` empty rows and `cols` columns.
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            row_ptr: vec![0; rows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
            rows,
            cols,
        }
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of stored entries in `row`.
    #[inline]
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(col_index, &value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let span = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_indices[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter())
    }

    /// Ascending indices of the rows holding at least one stored entry.
    ///
    /// This is the compacted "rownnz" list; it may be empty.
    pub fn rownnz(&self) -> Vec<usize> {
        (0..self.rows).filter(|&i| self.row_degree(i) > 0).collect()
    }
}

impl<T: Copy + Default + AddAssign> CsrMatrix<T> {
    /// Sum of the stored values in `row`.
    #[inline]
    pub fn row_sum(&self, row: usize) -> T {
        let mut sum = T::default();
        for &v in &self.values[self.row_ptr[row]..self.row_ptr[row + 1]] {
            sum += v;
        }
        sum
    }

    /// Build a CSR matrix from COO triplets.
    ///
    /// Entries are sorted by `(row, col)`; duplicates are kept as separate
    /// entries.
    ///
    /// # Panics
    ///
    /// Panics if a triplet lies outside `rows x cols`.
    pub fn from_coo(
        rows: usize,
        cols: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Self {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        sorted.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; rows + 1];
        for &(r, c, _) in &sorted {
            assert!(r < rows, "row index {r} out of bounds (rows={rows})");
            assert!(c < cols, "col index {c} out of bounds (cols={cols})");
            row_ptr[r + 1] += 1;
        }
        for i in 1..=rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        let (col_indices, values) = sorted.into_iter().map(|(_, c, v)| (c, v)).unzip();

        Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        }
    }
}

impl<T: Copy + Default> CsrMatrix<T> {
    /// Transpose in O(nnz + rows + cols) with a two-pass counting sort.
    ///
    /// Used to derive a restriction `RT` from an interpolation `P`.
    pub fn transpose(&self) -> CsrMatrix<T> {
        let mut row_ptr = vec![0usize; self.cols + 1];
        for &c in &self.col_indices {
            row_ptr[c + 1] += 1;
        }
        for i in 1..=self.cols {
            row_ptr[i] += row_ptr[i - 1];
        }

        let mut col_indices = vec![0usize; self.nnz()];
        let mut values = vec![T::default(); self.nnz()];
        let mut cursor = row_ptr.clone();
        for row in 0..self.rows {
            for (c, &v) in self.row_entries(row) {
                let dest = cursor[c];
                col_indices[dest] = row;
                values[dest] = v;
                cursor[c] += 1;
            }
        }

        CsrMatrix {
            row_ptr,
            col_indices,
            values,
            rows: self.cols,
            cols: self.rows,
        }
    }
}

impl CsrMatrix<f64> {
    /// Square identity of dimension `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
            rows: n,
            cols: n,
        }
    }
}

// ---------------------------------------------------------------------------
// ParCsrMatrix
// ---------------------------------------------------------------------------

/// Row-distributed sparse operator as seen by one process.
///
/// Both blocks have one row per locally stored row. Column indices of `diag`
/// are local; column indices of `offd` index into `col_map_offd`, which maps
/// them to global columns owned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParCsrMatrix {
    /// Global index of the first locally stored row.
    pub first_row: usize,
    /// Locally owned columns.
    pub diag: CsrMatrix<f64>,
    /// Columns owned by other processes.
    pub offd: CsrMatrix<f64>,
    /// Global column of each `offd` column.
    pub col_map_offd: Vec<usize>,
}

impl ParCsrMatrix {
    /// Operator with a `diag` block and no remote columns.
    pub fn local(first_row: usize, diag: CsrMatrix<f64>) -> Self {
        let offd = CsrMatrix::empty(diag.rows, 0);
        Self {
            first_row,
            diag,
            offd,
            col_map_offd: Vec::new(),
        }
    }

    /// Number of rows stored on this process.
    #[inline]
    pub fn local_num_rows(&self) -> usize {
        self.diag.rows
    }

    /// Number of entries stored on this process (both blocks).
    #[inline]
    pub fn local_nnz(&self) -> usize {
        self.diag.nnz() + self.offd.nnz()
    }

    /// Entry count of local row `row` across both blocks.
    #[inline]
    pub fn row_entries(&self, row: usize) -> usize {
        self.diag.row_degree(row) + self.offd.row_degree(row)
    }

    /// Value sum of local row `row` across both blocks.
    #[inline]
    pub fn row_sum(&self, row: usize) -> f64 {
        self.diag.row_sum(row) + self.offd.row_sum(row)
    }

    /// Ordered, duplicate-free list of local rows that are structurally
    /// nonzero in either block.
    pub fn rownnz(&self) -> Vec<usize> {
        crate::stats::merge_ordered(&self.diag.rownnz(), &self.offd.rownnz())
    }
}
