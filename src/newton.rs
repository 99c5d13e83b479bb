//! Newton-Raphson GLM fitting with step halving
//!
//! An alternative to [`crate::irls`]: starts from β = 0 and takes full Newton
//! steps, accepting a step only if it lowers the mean squared error on the
//! response scale. Rejected steps are halved toward the current β.

use ndarray::{Array1, Array2};

use crate::least_squares::validate_design;
use crate::linalg::{multiply_vector, solve, weighted_gram};
use crate::link::Link;
use crate::Result;

/// Floor applied to the Newton weights 1/g′(p).
const MIN_WEIGHT: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    /// Consecutive rejected steps tolerated before giving up.
    pub expansions: usize,
    /// Converged once the largest coefficient step falls below this.
    pub tolerance: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        NewtonConfig {
            max_iterations: 100,
            expansions: 10,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewtonResult {
    pub coefficients: Array1<f64>,
    pub fitted_values: Array1<f64>,
    pub mean_squared_error: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn mean_squared_error(response: &Array1<f64>, fitted: &Array1<f64>) -> f64 {
    let n = response.len() as f64;
    response
        .iter()
        .zip(fitted.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum::<f64>()
        / n
}

/// Fit g(E[y]) = Xβ by Newton-Raphson.
///
/// Returns the best coefficients seen, which are the last accepted ones.
pub fn fit_newton(
    design: &Array2<f64>,
    response: &Array1<f64>,
    link: Link,
    config: &NewtonConfig,
) -> Result<NewtonResult> {
    validate_design(design, response)?;

    let mut beta = Array1::zeros(design.ncols());
    let mut fitted = link.inverse(&multiply_vector(design, &beta)?);
    let mut best_mse = mean_squared_error(response, &fitted);

    let mut iterations = 0;
    let mut converged = false;

    'outer: for iteration in 0..config.max_iterations {
        iterations = iteration + 1;

        let w = fitted.mapv(|p| (1.0 / link.derivative(p)).max(MIN_WEIGHT));
        let xtwx = weighted_gram(design, &w)?;
        let gradient = design.t().dot(&(response - &fitted));
        let step = solve(&xtwx, &gradient)?;

        let max_step = step.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        let mut candidate = &beta + &step;

        if max_step < config.tolerance {
            let candidate_fitted = link.inverse(&multiply_vector(design, &candidate)?);
            let candidate_mse = mean_squared_error(response, &candidate_fitted);
            if candidate_mse <= best_mse {
                beta = candidate;
                fitted = candidate_fitted;
                best_mse = candidate_mse;
            }
            converged = true;
            break;
        }

        let mut failures = 0;
        loop {
            let candidate_fitted = link.inverse(&multiply_vector(design, &candidate)?);
            let candidate_mse = mean_squared_error(response, &candidate_fitted);

            if candidate_mse < best_mse {
                beta = candidate;
                fitted = candidate_fitted;
                best_mse = candidate_mse;
                break;
            }

            failures += 1;
            if failures >= config.expansions {
                log::debug!(
                    "Newton iteration {}: {} rejected steps, stopping",
                    iterations,
                    failures
                );
                break 'outer;
            }

            candidate = (&candidate + &beta) * 0.5;
        }

        log::debug!(
            "Newton iteration {}: MSE = {:.6e}, max |step| = {:.3e}",
            iterations,
            best_mse,
            max_step
        );
    }

    if !converged {
        log::warn!(
            "Newton-Raphson stopped after {} iterations without converging ({} link)",
            iterations,
            link
        );
    }

    Ok(NewtonResult {
        coefficients: beta,
        fitted_values: fitted,
        mean_squared_error: best_mse,
        iterations,
        converged,
    })
}
