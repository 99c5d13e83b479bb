//! Ordinary, weighted and QR-based least squares

use ndarray::{Array1, Array2, Zip};

use crate::linalg::{multiply_vector, solve};
use crate::qr::solve_qr;
use crate::{GLMError, Result};

/// Check that a design matrix and response can be regressed.
pub(crate) fn validate_design(design: &Array2<f64>, response: &Array1<f64>) -> Result<()> {
    let (n, k) = design.dim();

    if n == 0 || k == 0 {
        return Err(GLMError::EmptyInput(format!(
            "design matrix is {}x{}",
            n, k
        )));
    }

    if n != response.len() {
        return Err(GLMError::DimensionMismatch(format!(
            "design has {} rows but response has {} elements",
            n,
            response.len()
        )));
    }

    if n < k {
        return Err(GLMError::DimensionMismatch(format!(
            "need at least as many observations as variables, got {} < {}",
            n, k
        )));
    }

    Ok(())
}

/// Check a weight vector: one finite non-negative value per observation with a positive total.
pub(crate) fn validate_weights(weights: &Array1<f64>, n: usize) -> Result<f64> {
    if weights.len() != n {
        return Err(GLMError::DimensionMismatch(format!(
            "expected {} weights, got {}",
            n,
            weights.len()
        )));
    }

    if let Some(bad) = weights.iter().find(|w| !(**w >= 0.0) || !w.is_finite()) {
        return Err(GLMError::InvalidParameter(format!(
            "weights must be finite and non-negative, found {}",
            bad
        )));
    }

    let total = weights.sum();
    if total <= 0.0 {
        return Err(GLMError::InvalidParameter(
            "weights sum to zero".to_string(),
        ));
    }

    Ok(total)
}

/// β = (XᵗX)⁻¹Xᵗy solved through LU.
pub fn regress_ols(design: &Array2<f64>, response: &Array1<f64>) -> Result<Array1<f64>> {
    validate_design(design, response)?;

    let xtx = design.t().dot(design);
    let xty = design.t().dot(response);

    solve(&xtx, &xty)
}

/// Weighted least squares: each row of X and y is scaled by √(wᵢ / Σw), then OLS.
pub fn regress_wls(
    design: &Array2<f64>,
    response: &Array1<f64>,
    weights: &Array1<f64>,
) -> Result<Array1<f64>> {
    validate_design(design, response)?;
    let total = validate_weights(weights, design.nrows())?;

    let scale = weights.mapv(|w| (w / total).sqrt());

    let mut x = design.to_owned();
    Zip::from(x.rows_mut())
        .and(&scale)
        .for_each(|mut row, &s| row.mapv_inplace(|v| v * s));
    let y = response * &scale;

    regress_ols(&x, &y)
}

/// β via Householder QR, avoiding the normal equations.
pub fn regress_qr(design: &Array2<f64>, response: &Array1<f64>) -> Result<Array1<f64>> {
    validate_design(design, response)?;
    solve_qr(design, response)
}

/// Σ(yᵢ − xᵢᵗβ)²
pub fn sum_squared_errors(
    design: &Array2<f64>,
    response: &Array1<f64>,
    coefficients: &Array1<f64>,
) -> Result<f64> {
    validate_design(design, response)?;
    if coefficients.len() != design.ncols() {
        return Err(GLMError::DimensionMismatch(format!(
            "design has {} columns but {} coefficients were given",
            design.ncols(),
            coefficients.len()
        )));
    }

    let fitted = multiply_vector(design, coefficients)?;
    Ok(response
        .iter()
        .zip(fitted.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum())
}
