//! Fitted Generalized Linear Model
//!
//! [`GeneralizedLinearModel`] wraps an IRLS fit together with the data it was
//! fitted on, so goodness-of-fit summaries, coefficient variances and
//! predictions for new observations can be computed afterwards.

use ndarray::{Array1, Array2};

use crate::covariance::{standard_errors, variance_hc0, variance_hc1, variance_ols};
use crate::distribution::Distribution;
use crate::irls::{fit_irls, IrlsConfig, IrlsResult};
use crate::linalg::prepend_column;
use crate::link::Link;
use crate::{GLMError, Result};

#[derive(Debug, Clone)]
pub struct GeneralizedLinearModel {
    design: Array2<f64>,
    response: Array1<f64>,
    link: Link,
    family: &'static str,
    add_constant: bool,
    result: IrlsResult,
    /// g′(μ)(y − μ): residuals on the scale of the final weighted solve
    working_residuals: Array1<f64>,
}

impl GeneralizedLinearModel {
    /// Fit a GLM by IRLS.
    ///
    /// `link` defaults to the distribution's own link. With `add_constant` an
    /// intercept column of ones is prepended to the design.
    pub fn fit(
        design: &Array2<f64>,
        response: &Array1<f64>,
        weights: Option<&Array1<f64>>,
        distribution: &dyn Distribution,
        link: Option<Link>,
        add_constant: bool,
        config: &IrlsConfig,
    ) -> Result<Self> {
        let design = if add_constant {
            prepend_column(design, 1.0)
        } else {
            design.to_owned()
        };
        let link = link.unwrap_or_else(|| distribution.default_link());

        let result = fit_irls(&design, response, weights, distribution, link, config)?;

        let working_residuals = &link.first_derivative(&result.fitted_values)
            * &(response - &result.fitted_values);

        log::debug!(
            "Fitted {} GLM with {} link: {} observations, {} variables, deviance {:.6}",
            distribution.name(),
            link,
            design.nrows(),
            design.ncols(),
            result.deviance
        );

        Ok(GeneralizedLinearModel {
            design,
            response: response.to_owned(),
            link,
            family: distribution.name(),
            add_constant,
            result,
            working_residuals,
        })
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn observation_count(&self) -> usize {
        self.design.nrows()
    }

    /// Number of coefficients, including the intercept when one was added.
    pub fn variable_count(&self) -> usize {
        self.design.ncols()
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.observation_count() - self.variable_count()
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.result.coefficients
    }

    pub fn fitted_values(&self) -> &Array1<f64> {
        &self.result.fitted_values
    }

    pub fn linear_predictor(&self) -> &Array1<f64> {
        &self.result.linear_predictor
    }

    pub fn deviance(&self) -> f64 {
        self.result.deviance
    }

    pub fn iterations(&self) -> usize {
        self.result.iterations
    }

    pub fn converged(&self) -> bool {
        self.result.converged
    }

    /// Response-scale residuals y − μ.
    pub fn residuals(&self) -> Array1<f64> {
        &self.response - &self.result.fitted_values
    }

    pub fn sum_squared_errors(&self) -> f64 {
        self.residuals().iter().map(|e| e * e).sum()
    }

    /// SSE / (n − k); NaN when there are no residual degrees of freedom.
    pub fn mean_squared_error(&self) -> f64 {
        match self.degrees_of_freedom() {
            0 => f64::NAN,
            dof => self.sum_squared_errors() / dof as f64,
        }
    }

    pub fn root_mean_squared_error(&self) -> f64 {
        self.mean_squared_error().sqrt()
    }

    pub fn variance_ols(&self) -> Result<Array1<f64>> {
        variance_ols(
            &self.design,
            &self.working_residuals,
            Some(&self.result.irls_weights),
        )
    }

    pub fn variance_hc0(&self) -> Result<Array1<f64>> {
        variance_hc0(
            &self.design,
            &self.working_residuals,
            Some(&self.result.irls_weights),
        )
    }

    pub fn variance_hc1(&self) -> Result<Array1<f64>> {
        variance_hc1(
            &self.design,
            &self.working_residuals,
            Some(&self.result.irls_weights),
        )
    }

    pub fn standard_errors_ols(&self) -> Result<Array1<f64>> {
        Ok(standard_errors(&self.variance_ols()?))
    }

    pub fn standard_errors_hc0(&self) -> Result<Array1<f64>> {
        Ok(standard_errors(&self.variance_hc0()?))
    }

    pub fn standard_errors_hc1(&self) -> Result<Array1<f64>> {
        Ok(standard_errors(&self.variance_hc1()?))
    }

    /// Linear predictor xᵗβ for one observation.
    ///
    /// When the model was fitted with `add_constant`, the observation may omit
    /// the leading 1.
    pub fn evaluate(&self, observation: &[f64]) -> Result<f64> {
        let beta = &self.result.coefficients;
        let k = beta.len();

        let values: Vec<f64> = if observation.len() == k {
            observation.to_vec()
        } else if self.add_constant && observation.len() + 1 == k {
            std::iter::once(1.0).chain(observation.iter().copied()).collect()
        } else {
            return Err(GLMError::DimensionMismatch(format!(
                "model has {} coefficients but observation has {} values",
                k,
                observation.len()
            )));
        };

        Ok(values.iter().zip(beta.iter()).map(|(x, b)| x * b).sum())
    }

    /// Mean response g⁻¹(xᵗβ) for one observation.
    pub fn predict(&self, observation: &[f64]) -> Result<f64> {
        Ok(self.link.inverse_link(self.evaluate(observation)?))
    }
}
