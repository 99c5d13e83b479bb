//! Dense matrix kernel: multiply, transpose and LU decomposition
//!
//! All routines take their operands by reference and return freshly allocated
//! results. In-place algorithms copy the input into an owned working buffer first,
//! so callers never observe mutation of their arrays.

use std::fmt::Debug;

use ndarray::{Array1, Array2, Axis};
use num_traits::Float;
use rayon::prelude::*;

use crate::{GLMError, Result};

/// Element type accepted by the matrix kernel.
pub trait Scalar: Float + Debug + Send + Sync + 'static {
    /// Pivot magnitude below which a column is treated as numerically zero.
    fn pivot_tolerance() -> Self;
}

impl Scalar for f64 {
    fn pivot_tolerance() -> Self {
        1e-15
    }
}

impl Scalar for f32 {
    fn pivot_tolerance() -> Self {
        1e-6
    }
}

/// Build a matrix from a sequence of rows, enforcing that all rows have equal length.
pub fn from_rows<T: Scalar>(rows: &[Vec<T>]) -> Result<Array2<T>> {
    let nrows = rows.len();
    if nrows == 0 {
        return Err(GLMError::EmptyInput("matrix has no rows".to_string()));
    }

    let ncols = rows[0].len();
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(GLMError::DimensionMismatch(format!(
            "row {} has {} columns but row 0 has {}",
            i,
            row.len(),
            ncols
        )));
    }

    Ok(Array2::from_shape_fn((nrows, ncols), |(i, j)| rows[i][j]))
}

/// Prepend a constant column (e.g. an intercept) to a design matrix.
pub fn prepend_column<T: Scalar>(a: &Array2<T>, value: T) -> Array2<T> {
    let (n, k) = a.dim();
    Array2::from_shape_fn((n, k + 1), |(i, j)| if j == 0 { value } else { a[[i, j - 1]] })
}

/// Transpose into a new standard-layout matrix.
pub fn transpose<T: Scalar>(a: &Array2<T>) -> Array2<T> {
    let (n, k) = a.dim();
    Array2::from_shape_fn((k, n), |(i, j)| a[[j, i]])
}

/// Matrix product A·B.
pub fn multiply<T: Scalar>(a: &Array2<T>, b: &Array2<T>) -> Result<Array2<T>> {
    check_conformable(a, b)?;

    let (n, inner) = a.dim();
    let m = b.ncols();
    let mut c = Array2::zeros((n, m));

    for i in 0..n {
        for l in 0..inner {
            let a_il = a[[i, l]];
            for j in 0..m {
                c[[i, j]] = c[[i, j]] + a_il * b[[l, j]];
            }
        }
    }

    Ok(c)
}

/// Matrix product A·B with output rows partitioned across rayon workers.
///
/// Each worker owns a disjoint output row, so no synchronisation is needed.
pub fn multiply_parallel<T: Scalar>(a: &Array2<T>, b: &Array2<T>) -> Result<Array2<T>> {
    check_conformable(a, b)?;

    let mut c = Array2::zeros((a.nrows(), b.ncols()));

    c.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(a.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut c_row, a_row)| {
            for (l, &a_il) in a_row.iter().enumerate() {
                for (c_ij, &b_lj) in c_row.iter_mut().zip(b.row(l).iter()) {
                    *c_ij = *c_ij + a_il * b_lj;
                }
            }
        });

    Ok(c)
}

/// Matrix-vector product A·x.
pub fn multiply_vector<T: Scalar>(a: &Array2<T>, x: &Array1<T>) -> Result<Array1<T>> {
    if a.ncols() != x.len() {
        return Err(GLMError::DimensionMismatch(format!(
            "matrix has {} columns but vector has {} elements",
            a.ncols(),
            x.len()
        )));
    }

    Ok(a
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(x.iter())
                .fold(T::zero(), |acc, (&a_ij, &x_j)| acc + a_ij * x_j)
        })
        .collect())
}

/// XᵗWX for diagonal W given as a vector, without forming W.
pub fn weighted_gram<T: Scalar>(x: &Array2<T>, w: &Array1<T>) -> Result<Array2<T>> {
    if x.nrows() != w.len() {
        return Err(GLMError::DimensionMismatch(format!(
            "matrix has {} rows but weight vector has {} elements",
            x.nrows(),
            w.len()
        )));
    }

    let k = x.ncols();
    let mut gram = Array2::zeros((k, k));

    for (row, &wi) in x.rows().into_iter().zip(w.iter()) {
        for a in 0..k {
            let scaled = wi * row[a];
            for b in a..k {
                gram[[a, b]] = gram[[a, b]] + scaled * row[b];
            }
        }
    }

    for a in 0..k {
        for b in 0..a {
            gram[[a, b]] = gram[[b, a]];
        }
    }

    Ok(gram)
}

fn check_conformable<T: Scalar>(a: &Array2<T>, b: &Array2<T>) -> Result<()> {
    if a.ncols() != b.nrows() {
        return Err(GLMError::DimensionMismatch(format!(
            "cannot multiply {}x{} by {}x{}",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        )));
    }
    Ok(())
}

/// Combined LU factors of a row-permuted square matrix: P·A = L·U.
#[derive(Debug, Clone)]
pub struct LuDecomposition<T> {
    /// L strictly below the diagonal (unit diagonal implied), U on and above it.
    pub lu: Array2<T>,
    /// `permutation[i]` is the row of the original matrix now stored at row `i`.
    pub permutation: Vec<usize>,
    /// +1 or -1 depending on the parity of the row swaps.
    pub sign: T,
}

impl<T: Scalar> LuDecomposition<T> {
    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Unit lower-triangular factor L.
    pub fn lower(&self) -> Array2<T> {
        let n = self.dim();
        Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                T::one()
            } else if i > j {
                self.lu[[i, j]]
            } else {
                T::zero()
            }
        })
    }

    /// Upper-triangular factor U.
    pub fn upper(&self) -> Array2<T> {
        let n = self.dim();
        Array2::from_shape_fn((n, n), |(i, j)| if i <= j { self.lu[[i, j]] } else { T::zero() })
    }

    pub fn determinant(&self) -> T {
        (0..self.dim()).fold(self.sign, |det, i| det * self.lu[[i, i]])
    }
}

/// Decompose a square matrix with Doolittle's algorithm and partial pivoting.
///
/// Fails with [`GLMError::SingularMatrix`] when no row at or below the diagonal
/// has an entry exceeding the pivot tolerance in the current column.
pub fn decompose_lu<T: Scalar>(a: &Array2<T>) -> Result<LuDecomposition<T>> {
    let n = a.nrows();

    if a.ncols() != n {
        return Err(GLMError::DimensionMismatch(format!(
            "LU decomposition requires a square matrix, got {}x{}",
            n,
            a.ncols()
        )));
    }

    if n == 0 {
        return Err(GLMError::EmptyInput("matrix is empty".to_string()));
    }

    let tolerance = T::pivot_tolerance();
    let mut lu = a.to_owned();
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut sign = T::one();

    for k in 0..n {
        // Find pivot; the first maximum wins ties
        let mut max_idx = k;
        let mut max_val = lu[[k, k]].abs();

        for i in (k + 1)..n {
            let val = lu[[i, k]].abs();
            if val > max_val {
                max_val = val;
                max_idx = i;
            }
        }

        if max_idx != k {
            swap_rows(&mut lu, k, max_idx);
            permutation.swap(k, max_idx);
            sign = -sign;
        }

        if lu[[k, k]].abs() < tolerance {
            match ((k + 1)..n).find(|&i| lu[[i, k]].abs() > tolerance) {
                Some(i) => {
                    swap_rows(&mut lu, k, i);
                    permutation.swap(k, i);
                    sign = -sign;
                }
                None => return Err(GLMError::SingularMatrix),
            }
        }

        // Eliminate, storing multipliers in place of the zeroed entries
        let pivot = lu[[k, k]];
        for i in (k + 1)..n {
            let factor = lu[[i, k]] / pivot;
            lu[[i, k]] = factor;
            for j in (k + 1)..n {
                lu[[i, j]] = lu[[i, j]] - factor * lu[[k, j]];
            }
        }
    }

    Ok(LuDecomposition {
        lu,
        permutation,
        sign,
    })
}

fn swap_rows<T: Scalar>(a: &mut Array2<T>, r1: usize, r2: usize) {
    for j in 0..a.ncols() {
        a.swap([r1, j], [r2, j]);
    }
}

/// Solve A·x = b given the LU factors of A.
pub fn solve_lu<T: Scalar>(decomposition: &LuDecomposition<T>, b: &Array1<T>) -> Result<Array1<T>> {
    let n = decomposition.dim();
    let lu = &decomposition.lu;

    if b.len() != n {
        return Err(GLMError::DimensionMismatch(format!(
            "right-hand side has {} elements but matrix is {}x{}",
            b.len(),
            n,
            n
        )));
    }

    // Forward substitution through unit-lower L on the permuted right-hand side
    let mut y: Array1<T> = decomposition.permutation.iter().map(|&p| b[p]).collect();
    for i in 0..n {
        let mut sum = y[i];
        for j in 0..i {
            sum = sum - lu[[i, j]] * y[j];
        }
        y[i] = sum;
    }

    // Back substitution through U
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum = sum - lu[[i, j]] * x[j];
        }
        x[i] = sum / lu[[i, i]];
    }

    Ok(x)
}

/// Solve A·x = b.
pub fn solve<T: Scalar>(a: &Array2<T>, b: &Array1<T>) -> Result<Array1<T>> {
    let decomposition = decompose_lu(a)?;
    solve_lu(&decomposition, b)
}

/// Invert a square matrix by solving against each standard basis vector,
/// reusing a single factorization.
pub fn invert_lu<T: Scalar>(a: &Array2<T>) -> Result<Array2<T>> {
    let decomposition = decompose_lu(a)?;
    let n = decomposition.dim();
    let mut inverse = Array2::zeros((n, n));
    let mut basis = Array1::zeros(n);

    for j in 0..n {
        basis[j] = T::one();
        let column = solve_lu(&decomposition, &basis)?;
        inverse.column_mut(j).assign(&column);
        basis[j] = T::zero();
    }

    Ok(inverse)
}

/// Determinant from the LU diagonal and the row-swap parity.
///
/// A matrix whose pivot search is exhausted has determinant zero.
pub fn determinant<T: Scalar>(a: &Array2<T>) -> Result<T> {
    match decompose_lu(a) {
        Ok(decomposition) => Ok(decomposition.determinant()),
        Err(GLMError::SingularMatrix) => Ok(T::zero()),
        Err(e) => Err(e),
    }
}
