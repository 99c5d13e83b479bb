//! QR decomposition by Householder reflections
//!
//! For an N×K matrix A with N ≥ K this produces a square orthonormal Q (N×N) and
//! an upper-triangular R (N×K) with A = Q·R. Least-squares problems solved through
//! R avoid forming XᵗX, whose condition number is the square of X's.

use ndarray::{s, Array1, Array2};

use crate::linalg::Scalar;
use crate::{GLMError, Result};

#[derive(Debug, Clone)]
pub struct QrDecomposition<T> {
    pub q: Array2<T>,
    pub r: Array2<T>,
}

/// One elementary orthogonal transform acting on rows `row..`.
enum Reflector<T> {
    /// H = I - 2vvᵀ with unit v spanning rows `row..`.
    Householder { row: usize, v: Array1<T> },
    /// Residual column was exactly zero: negate a single row instead.
    SignFlip { row: usize },
}

impl<T: Scalar> Reflector<T> {
    /// Apply the transform from the left to columns `cols..` of `m`.
    fn apply(&self, m: &mut Array2<T>, cols: usize) {
        let two = T::one() + T::one();
        match self {
            Reflector::Householder { row, v } => {
                for c in cols..m.ncols() {
                    let mut dot = T::zero();
                    for (i, &vi) in v.iter().enumerate() {
                        dot = dot + vi * m[[row + i, c]];
                    }
                    let scaled = two * dot;
                    for (i, &vi) in v.iter().enumerate() {
                        m[[row + i, c]] = m[[row + i, c]] - scaled * vi;
                    }
                }
            }
            Reflector::SignFlip { row } => {
                for c in cols..m.ncols() {
                    m[[*row, c]] = -m[[*row, c]];
                }
            }
        }
    }
}

/// Decompose A = Q·R using one Householder reflector per column.
pub fn decompose_qr<T: Scalar>(a: &Array2<T>) -> Result<QrDecomposition<T>> {
    let (n, k) = a.dim();

    if n == 0 || k == 0 {
        return Err(GLMError::EmptyInput("matrix is empty".to_string()));
    }

    if n < k {
        return Err(GLMError::DimensionMismatch(format!(
            "QR decomposition requires rows >= columns, got {}x{}",
            n, k
        )));
    }

    let mut r = a.to_owned();
    let mut reflectors = Vec::with_capacity(k);

    for j in 0..k {
        let x = r.slice(s![j.., j]).to_owned();
        let norm = x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi).sqrt();

        if norm == T::zero() {
            let reflector = Reflector::SignFlip { row: j };
            reflector.apply(&mut r, j);
            reflectors.push(reflector);
            continue;
        }

        // Reflect onto -sign(x0)·‖x‖·e0 so v0 never cancels
        let alpha = if x[0] >= T::zero() { -norm } else { norm };
        let mut v = x;
        v[0] = v[0] - alpha;
        let v_norm = v.iter().fold(T::zero(), |acc, &vi| acc + vi * vi).sqrt();
        v.mapv_inplace(|vi| vi / v_norm);

        let reflector = Reflector::Householder { row: j, v };
        reflector.apply(&mut r, j);

        r[[j, j]] = alpha;
        for i in (j + 1)..n {
            r[[i, j]] = T::zero();
        }

        reflectors.push(reflector);
    }

    // Q = H_0 · H_1 · … · H_{k-1} · I, built by applying the reflectors in reverse
    let mut q = Array2::eye(n);
    for reflector in reflectors.iter().rev() {
        reflector.apply(&mut q, 0);
    }

    Ok(QrDecomposition { q, r })
}

/// Solve the upper-triangular system R·x = b on the leading K×K block of `r`.
pub fn back_substitute<T: Scalar>(r: &Array2<T>, b: &Array1<T>) -> Result<Array1<T>> {
    let k = r.ncols();

    if r.nrows() < k || b.len() < k {
        return Err(GLMError::DimensionMismatch(format!(
            "back substitution needs a {}x{} triangle and {} right-hand values, got {}x{} and {}",
            k,
            k,
            k,
            r.nrows(),
            r.ncols(),
            b.len()
        )));
    }

    let tolerance = T::pivot_tolerance();
    let mut x = Array1::zeros(k);

    for i in (0..k).rev() {
        let diag = r[[i, i]];
        if diag.abs() < tolerance {
            return Err(GLMError::SingularMatrix);
        }

        let mut sum = b[i];
        for j in (i + 1)..k {
            sum = sum - r[[i, j]] * x[j];
        }
        x[i] = sum / diag;
    }

    Ok(x)
}

/// Least-squares solution of A·x ≈ b computed as R⁻¹·Qᵗ·b.
pub fn solve_qr<T: Scalar>(a: &Array2<T>, b: &Array1<T>) -> Result<Array1<T>> {
    if a.nrows() != b.len() {
        return Err(GLMError::DimensionMismatch(format!(
            "matrix has {} rows but right-hand side has {} elements",
            a.nrows(),
            b.len()
        )));
    }

    let QrDecomposition { q, r } = decompose_qr(a)?;
    let k = r.ncols();

    // Only the first K entries of Qᵗb reach the triangle
    let qtb: Array1<T> = (0..k)
        .map(|j| {
            q.column(j)
                .iter()
                .zip(b.iter())
                .fold(T::zero(), |acc, (&qij, &bi)| acc + qij * bi)
        })
        .collect();

    back_substitute(&r, &qtb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_matrix_eq(a: &Array2<f64>, b: &Array2<f64>, eps: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = eps);
        }
    }

    #[test]
    fn test_qr_reconstructs_input() {
        let a = array![
            [12.0, -51.0, 4.0],
            [6.0, 167.0, -68.0],
            [-4.0, 24.0, -41.0],
        ];

        let QrDecomposition { q, r } = decompose_qr(&a).unwrap();

        assert_matrix_eq(&q.dot(&r), &a, 1e-10);
        assert_matrix_eq(&q.t().dot(&q), &Array2::eye(3), 1e-12);

        // Upper triangular with exact zeros below the diagonal
        for i in 0..3 {
            for j in 0..i {
                assert_eq!(r[[i, j]], 0.0);
            }
        }

        // Known magnitudes of R's diagonal for this textbook matrix
        assert_abs_diff_eq!(r[[0, 0]].abs(), 14.0, epsilon = 1e-10);
        assert_abs_diff_eq!(r[[1, 1]].abs(), 175.0, epsilon = 1e-10);
        assert_abs_diff_eq!(r[[2, 2]].abs(), 35.0, epsilon = 1e-10);
    }

    #[test]
    fn test_qr_tall_matrix() {
        let a = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
        let QrDecomposition { q, r } = decompose_qr(&a).unwrap();

        assert_eq!(q.dim(), (4, 4));
        assert_eq!(r.dim(), (4, 2));
        assert_matrix_eq(&q.dot(&r), &a, 1e-12);
        assert_matrix_eq(&q.t().dot(&q), &Array2::eye(4), 1e-12);
    }

    #[test]
    fn test_zero_column_degenerates_to_sign_flip() {
        let a: Array2<f64> = array![[1.0, 0.0], [2.0, 0.0], [2.0, 0.0]];
        let QrDecomposition { q, r } = decompose_qr(&a).unwrap();

        assert!(q.iter().all(|v| v.is_finite()));
        assert_matrix_eq(&q.dot(&r), &a, 1e-12);
        assert_matrix_eq(&q.t().dot(&q), &Array2::eye(3), 1e-12);
        assert_abs_diff_eq!(r[[0, 0]].abs(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wide_matrix_rejected() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert!(matches!(decompose_qr(&a), Err(GLMError::DimensionMismatch(_))));
    }

    #[test]
    fn test_solve_qr_line_fit() {
        let a = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let b = array![2.0, 2.9, 4.1];
        let x = solve_qr(&a, &b).unwrap();
        assert_abs_diff_eq!(x[0], 0.9, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 1.05, epsilon = 1e-10);
    }

    #[test]
    fn test_solve_qr_rank_deficient() {
        let a = array![[1.0, 2.0], [0.0, 0.0], [0.0, 0.0]];
        let b = array![1.0, 2.0, 3.0];
        assert!(matches!(solve_qr(&a, &b), Err(GLMError::SingularMatrix)));
    }
}
