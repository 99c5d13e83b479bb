//! Iteratively Reweighted Least Squares for GLM fitting
//!
//! Each iteration linearises the link around the current mean, forms the working
//! response z = η + g′(μ)(y − μ) with weights w = 1/(g′(μ)²V(μ)), and solves a
//! weighted least-squares problem for the next coefficients.

use ndarray::{Array1, Array2};

use crate::distribution::Distribution;
use crate::least_squares::{regress_wls, validate_design, validate_weights};
use crate::linalg::multiply_vector;
use crate::link::Link;
use crate::{GLMError, Result};

/// Iteration limits and convergence tolerances for IRLS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrlsConfig {
    pub max_iterations: usize,
    /// Converged when every residual moves by at most
    /// `absolute_tolerance + relative_tolerance * |r|` between iterations.
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        IrlsConfig {
            max_iterations: 100,
            absolute_tolerance: 1e-15,
            relative_tolerance: 0.0,
        }
    }
}

/// IRLS fitting result
#[derive(Debug, Clone)]
pub struct IrlsResult {
    pub coefficients: Array1<f64>,
    /// Working response z from the final iteration
    pub working_response: Array1<f64>,
    pub fitted_values: Array1<f64>,
    pub linear_predictor: Array1<f64>,
    /// Importance weight times variance weight at the fitted mean
    pub irls_weights: Array1<f64>,
    pub deviance: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn residuals_settled(previous: &Array1<f64>, current: &Array1<f64>, config: &IrlsConfig) -> bool {
    previous.iter().zip(current.iter()).all(|(&p, &c)| {
        (p - c).abs() <= config.absolute_tolerance + config.relative_tolerance * c.abs()
    })
}

/// Fit a GLM by IRLS
///
/// # Arguments
/// * `design` - N×K design matrix
/// * `response` - Observed responses, length N
/// * `weights` - Optional importance weights (all ones when `None`)
/// * `distribution` - Response family
/// * `link` - Link function
/// * `config` - Iteration limit and tolerances
///
/// Reaching `max_iterations` is reported through `converged = false`, not as an error.
/// So is a weighted system that turns singular (or weights that stop being
/// finite) after the first iteration: the fit stops and keeps the last solved
/// coefficients, linear predictor, mean and working response.
pub fn fit_irls(
    design: &Array2<f64>,
    response: &Array1<f64>,
    weights: Option<&Array1<f64>>,
    distribution: &dyn Distribution,
    link: Link,
    config: &IrlsConfig,
) -> Result<IrlsResult> {
    validate_design(design, response)?;
    let n = design.nrows();

    let importance = match weights {
        Some(w) => {
            validate_weights(w, n)?;
            w.to_owned()
        }
        None => Array1::ones(n),
    };

    // Constant variance with the identity link is a single weighted solve
    if distribution.has_constant_variance() && link == Link::Identity {
        return fit_linear(design, response, &importance, distribution);
    }

    let mut mu = distribution.initial_mean(response)?;
    let mut eta = distribution.predict(&mu, link);
    let mut previous_residual = &eta - response;

    let mut coefficients = Array1::zeros(design.ncols());
    let mut working_response = Array1::zeros(n);
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 0..config.max_iterations {
        let w = &importance * &distribution.weight(&mu, link);
        if let Some(bad) = w.iter().find(|wi| !wi.is_finite()) {
            if iterations == 0 {
                return Err(GLMError::DomainError(format!(
                    "working weight {} at the initial mean ({} family, {} link)",
                    bad,
                    distribution.name(),
                    link
                )));
            }
            log::warn!(
                "IRLS stopped at iteration {}: non-finite working weight ({} family, {} link)",
                iterations,
                distribution.name(),
                link
            );
            break;
        }

        let z = &eta + &(&link.first_derivative(&mu) * &(response - &mu));

        let beta = match regress_wls(design, &z, &w) {
            Ok(beta) => beta,
            Err(GLMError::SingularMatrix) if iterations > 0 => {
                log::warn!(
                    "IRLS stopped at iteration {}: weighted system became singular ({} family, {} link)",
                    iterations,
                    distribution.name(),
                    link
                );
                break;
            }
            Err(e) => return Err(e),
        };

        iterations = iteration + 1;
        coefficients = beta;
        working_response = z;
        eta = multiply_vector(design, &coefficients)?;
        mu = distribution.fit(&eta, link);

        let residual = &eta - response;
        let settled = residuals_settled(&previous_residual, &residual, config);

        log::debug!(
            "IRLS iteration {}: max |Δr| = {:.3e}",
            iterations,
            previous_residual
                .iter()
                .zip(residual.iter())
                .map(|(p, c)| (p - c).abs())
                .fold(0.0f64, f64::max)
        );

        previous_residual = residual;
        if settled {
            converged = true;
            break;
        }
    }

    if !converged && iterations == config.max_iterations {
        log::warn!(
            "IRLS did not converge within {} iterations ({} family, {} link)",
            config.max_iterations,
            distribution.name(),
            link
        );
    }

    let deviance = distribution.deviance(response, &mu, &importance, 1.0)?;
    let irls_weights = &importance * &distribution.weight(&mu, link);

    Ok(IrlsResult {
        coefficients,
        working_response,
        fitted_values: mu,
        linear_predictor: eta,
        irls_weights,
        deviance,
        iterations,
        converged,
    })
}

fn fit_linear(
    design: &Array2<f64>,
    response: &Array1<f64>,
    importance: &Array1<f64>,
    distribution: &dyn Distribution,
) -> Result<IrlsResult> {
    let coefficients = regress_wls(design, response, importance)?;
    let eta = multiply_vector(design, &coefficients)?;
    let deviance = distribution.deviance(response, &eta, importance, 1.0)?;
    let irls_weights = importance * &distribution.weight(&eta, Link::Identity);

    log::debug!("IRLS: constant variance with identity link, solved directly");

    Ok(IrlsResult {
        coefficients,
        working_response: response.to_owned(),
        fitted_values: eta.clone(),
        linear_predictor: eta,
        irls_weights,
        deviance,
        iterations: 0,
        converged: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Gaussian, Poisson};
    use crate::least_squares::regress_ols;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn loose() -> IrlsConfig {
        IrlsConfig {
            absolute_tolerance: 1e-10,
            ..IrlsConfig::default()
        }
    }

    #[test]
    fn test_gaussian_identity_is_ols() {
        let x = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![2.0, 2.9, 4.1];

        let result = fit_irls(&x, &y, None, &Gaussian::default(), Link::Identity, &IrlsConfig::default())
            .unwrap();
        let ols = regress_ols(&x, &y).unwrap();

        assert_eq!(result.iterations, 0);
        assert!(result.converged);
        assert_abs_diff_eq!(result.coefficients[0], ols[0], epsilon = 1e-12);
        assert_abs_diff_eq!(result.coefficients[1], ols[1], epsilon = 1e-12);
        assert_abs_diff_eq!(result.deviance, 0.015, epsilon = 1e-12);
    }

    #[test]
    fn test_poisson_log_link_converges() {
        let x = array![
            [1.0, 0.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [1.0, 3.0],
            [1.0, 4.0],
            [1.0, 5.0],
        ];
        let y = array![1.0, 2.0, 2.0, 4.0, 7.0, 11.0];

        let result = fit_irls(&x, &y, None, &Poisson::default(), Link::Log, &loose()).unwrap();
        assert!(result.converged);
        assert!(result.iterations > 1);
        assert!(result.coefficients[1] > 0.0);

        // Score equations at the MLE with canonical link: Xᵗ(y − μ) = 0
        let score = x.t().dot(&(&y - &result.fitted_values));
        for s in score.iter() {
            assert_abs_diff_eq!(*s, 0.0, epsilon = 1e-6);
        }

        for (mu, eta) in result.fitted_values.iter().zip(result.linear_predictor.iter()) {
            assert_abs_diff_eq!(*mu, eta.exp(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_intercept_only_poisson_recovers_mean() {
        let x = Array2::ones((5, 1));
        let y = array![0.0, 3.0, 1.0, 4.0, 2.0];

        let result = fit_irls(&x, &y, None, &Poisson::default(), Link::Log, &loose()).unwrap();
        assert_abs_diff_eq!(result.coefficients[0], 2.0f64.ln(), epsilon = 1e-8);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 2.0, 8.0];
        let config = IrlsConfig {
            max_iterations: 1,
            ..IrlsConfig::default()
        };

        let result = fit_irls(&x, &y, None, &Poisson::default(), Link::Log, &config).unwrap();
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_weights_validated() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]];
        let y = array![1.0, 2.0, 4.0];

        let err = fit_irls(
            &x,
            &y,
            Some(&array![1.0, -2.0, 1.0]),
            &Poisson::default(),
            Link::Log,
            &IrlsConfig::default(),
        );
        assert!(matches!(err, Err(GLMError::InvalidParameter(_))));

        let err = fit_irls(
            &x,
            &array![1.0, 2.0],
            None,
            &Poisson::default(),
            Link::Log,
            &IrlsConfig::default(),
        );
        assert!(matches!(err, Err(GLMError::DimensionMismatch(_))));
    }

    #[test]
    fn test_integer_weights_match_replicated_rows() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 2.0, 5.0, 6.0];
        let w = array![1.0, 2.0, 1.0, 1.0];

        let weighted = fit_irls(&x, &y, Some(&w), &Poisson::default(), Link::Log, &loose()).unwrap();

        let x_rep = array![[1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y_rep = array![1.0, 2.0, 2.0, 5.0, 6.0];
        let replicated = fit_irls(&x_rep, &y_rep, None, &Poisson::default(), Link::Log, &loose()).unwrap();

        for j in 0..2 {
            assert_abs_diff_eq!(weighted.coefficients[j], replicated.coefficients[j], epsilon = 1e-8);
        }
        assert_abs_diff_eq!(weighted.deviance, replicated.deviance, epsilon = 1e-8);
    }

    #[test]
    fn test_all_zero_level_stops_with_last_coefficients() {
        // The first level only has zero counts, so its coefficient runs off to -∞
        // until the weighted system loses rank.
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let y = array![0.0, 0.0, 3.0, 4.0, 5.0];

        let result =
            fit_irls(&x, &y, None, &Poisson::default(), Link::Log, &IrlsConfig::default()).unwrap();

        assert!(!result.converged);
        assert!(result.iterations > 1);
        assert!(result.iterations < IrlsConfig::default().max_iterations);
        assert!(result.coefficients.iter().all(|b| b.is_finite()));
        assert!(result.coefficients[1] < -5.0);

        // The populated level is fitted at its own mean
        assert_abs_diff_eq!(result.coefficients[0], 4.0f64.ln(), epsilon = 1e-6);

        // Returned state belongs to the last solved iteration
        let eta = x.dot(&result.coefficients);
        for i in 0..5 {
            assert_abs_diff_eq!(result.linear_predictor[i], eta[i], epsilon = 1e-12);
            assert_abs_diff_eq!(result.fitted_values[i], eta[i].exp(), epsilon = 1e-12);
        }
        assert!(result.working_response.iter().all(|z| z.is_finite()));
    }

    #[test]
    fn test_all_zero_response_is_domain_error() {
        let x = Array2::ones((3, 1));
        let y = array![0.0, 0.0, 0.0];

        let err = fit_irls(&x, &y, None, &Poisson::default(), Link::Log, &IrlsConfig::default());
        match err {
            Err(GLMError::DomainError(msg)) => {
                assert!(msg.contains("Poisson"));
                assert!(msg.contains("log"));
            }
            other => panic!("expected DomainError, got {:?}", other),
        }
    }
}
