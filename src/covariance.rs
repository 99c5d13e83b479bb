//! Coefficient variance estimators
//!
//! All estimators take the design, the residuals on the scale the coefficients
//! were solved on, and optional observation weights. With weights w the design
//! and residuals are treated as √w·X and √w·e.

use ndarray::{Array1, Array2};

use crate::linalg::{invert_lu, weighted_gram};
use crate::{GLMError, Result};

fn resolve_weights(
    design: &Array2<f64>,
    residuals: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
    let n = design.nrows();
    if residuals.len() != n {
        return Err(GLMError::DimensionMismatch(format!(
            "design has {} rows but {} residuals were given",
            n,
            residuals.len()
        )));
    }

    match weights {
        Some(w) if w.len() != n => Err(GLMError::DimensionMismatch(format!(
            "design has {} rows but {} weights were given",
            n,
            w.len()
        ))),
        Some(w) => Ok(w.to_owned()),
        None => Ok(Array1::ones(n)),
    }
}

fn residual_dof(design: &Array2<f64>) -> Result<f64> {
    let (n, k) = design.dim();
    if n <= k {
        return Err(GLMError::DomainError(format!(
            "no residual degrees of freedom with {} observations and {} variables",
            n, k
        )));
    }
    Ok((n - k) as f64)
}

/// (XᵗWX)⁻¹
fn bread(design: &Array2<f64>, weights: &Array1<f64>) -> Result<Array2<f64>> {
    invert_lu(&weighted_gram(design, weights)?)
}

/// Classical variances σ²·diag((XᵗWX)⁻¹) with σ² = Σwe² / (n − k).
pub fn variance_ols(
    design: &Array2<f64>,
    residuals: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
    let w = resolve_weights(design, residuals, weights)?;
    let dof = residual_dof(design)?;

    let sigma2 = w
        .iter()
        .zip(residuals.iter())
        .map(|(wi, ei)| wi * ei * ei)
        .sum::<f64>()
        / dof;

    Ok(bread(design, &w)?.diag().mapv(|v| v * sigma2))
}

/// White's heteroskedasticity-consistent sandwich estimator (HC0).
pub fn variance_hc0(
    design: &Array2<f64>,
    residuals: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
    let w = resolve_weights(design, residuals, weights)?;
    let bread = bread(design, &w)?;

    // Σ (wᵢeᵢ)² xᵢxᵢᵗ
    let meat_weights = Array1::from_iter(
        w.iter()
            .zip(residuals.iter())
            .map(|(wi, ei)| (wi * ei).powi(2)),
    );
    let meat = weighted_gram(design, &meat_weights)?;

    let sandwich = bread.dot(&meat).dot(&bread);
    Ok(sandwich.diag().to_owned())
}

/// HC0 scaled by n / (n − k).
pub fn variance_hc1(
    design: &Array2<f64>,
    residuals: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
    let dof = residual_dof(design)?;
    let n = design.nrows() as f64;
    Ok(variance_hc0(design, residuals, weights)? * (n / dof))
}

pub fn standard_errors(variances: &Array1<f64>) -> Array1<f64> {
    variances.mapv(f64::sqrt)
}
