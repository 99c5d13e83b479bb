//! Probability distributions usable as GLM families
//!
//! A [`Distribution`] supplies its moments, a probability function, and the
//! callbacks IRLS needs: deviance, an initial mean, the variance-based working
//! weight, and the mean/linear-predictor transforms through a [`Link`].

use std::f64::consts::{E, PI};

use ndarray::Array1;
use rand::Rng;
use statrs::function::gamma::ln_gamma;

use crate::factorial;
use crate::link::Link;
use crate::sampler::PoissonSampler;
use crate::{GLMError, Result};

/// Exponential family distribution for GLMs
pub trait Distribution: Send + Sync {
    fn name(&self) -> &'static str;

    /// Link used when the caller does not choose one.
    fn default_link(&self) -> Link;

    fn mean(&self) -> f64;
    fn variance(&self) -> f64;
    fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
    fn entropy(&self) -> f64;
    fn skewness(&self) -> f64;
    fn kurtosis(&self) -> f64;
    fn mode(&self) -> f64;
    fn median(&self) -> f64;
    fn minimum(&self) -> f64;
    fn maximum(&self) -> f64;

    /// Density (continuous) or mass (discrete) at `x`.
    fn probability(&self, x: f64) -> Result<f64>;
    fn log_probability(&self, x: f64) -> Result<f64>;

    /// Variance function V(μ).
    fn variance_function(&self, mu: f64) -> f64;

    /// True when V(μ) does not depend on μ, which makes IRLS with an identity
    /// link a single weighted least-squares solve.
    fn has_constant_variance(&self) -> bool {
        false
    }

    /// Deviance of `mu` against `response`, weighted and divided by `scale`.
    fn deviance(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64>;

    fn log_likelihood(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64>;

    /// Starting mean for IRLS: each response pulled halfway toward the overall mean.
    fn initial_mean(&self, response: &Array1<f64>) -> Result<Array1<f64>> {
        let y_mean = response
            .mean()
            .ok_or_else(|| GLMError::EmptyInput("response is empty".to_string()))?;
        Ok(response.mapv(|yi| 0.5 * (yi + y_mean)))
    }

    /// IRLS working weight 1 / (g′(μ)² V(μ)).
    fn weight(&self, mu: &Array1<f64>, link: Link) -> Array1<f64> {
        mu.mapv(|m| {
            let d = link.derivative(m);
            1.0 / (d * d * self.variance_function(m))
        })
    }

    /// Mean response from a linear prediction.
    fn fit(&self, linear_prediction: &Array1<f64>, link: Link) -> Array1<f64> {
        link.inverse(linear_prediction)
    }

    /// Linear prediction from a mean response.
    fn predict(&self, mu: &Array1<f64>, link: Link) -> Array1<f64> {
        link.evaluate(mu)
    }
}

/// Look up a distribution with default parameters by name.
pub fn from_name(name: &str) -> Result<Box<dyn Distribution>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "gaussian" | "normal" => Ok(Box::new(Gaussian::default())),
        "poisson" => Ok(Box::new(Poisson::default())),
        other => Err(GLMError::InvalidParameter(format!(
            "unknown distribution '{}'",
            other
        ))),
    }
}

fn check_lengths(response: &Array1<f64>, mu: &Array1<f64>, weights: &Array1<f64>) -> Result<()> {
    if response.len() != mu.len() || response.len() != weights.len() {
        return Err(GLMError::DimensionMismatch(format!(
            "response, mean and weights have lengths {}, {} and {}",
            response.len(),
            mu.len(),
            weights.len()
        )));
    }
    Ok(())
}

fn check_scale(scale: f64) -> Result<()> {
    if !(scale > 0.0) {
        return Err(GLMError::DomainError(format!(
            "scale must be positive, got {}",
            scale
        )));
    }
    Ok(())
}

/// Normal distribution N(mean, standard_deviation²).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    mean: f64,
    standard_deviation: f64,
}

impl Gaussian {
    pub fn new(mean: f64, standard_deviation: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(GLMError::DomainError(format!("mean must be finite, got {}", mean)));
        }
        if !(standard_deviation > 0.0) || !standard_deviation.is_finite() {
            return Err(GLMError::DomainError(format!(
                "standard deviation must be positive, got {}",
                standard_deviation
            )));
        }
        Ok(Gaussian {
            mean,
            standard_deviation,
        })
    }
}

impl Default for Gaussian {
    fn default() -> Self {
        Gaussian {
            mean: 0.0,
            standard_deviation: 1.0,
        }
    }
}

impl Distribution for Gaussian {
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn default_link(&self) -> Link {
        Link::Identity
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn variance(&self) -> f64 {
        self.standard_deviation * self.standard_deviation
    }

    fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    fn entropy(&self) -> f64 {
        0.5 * (1.0 + (2.0 * PI * self.variance()).ln())
    }

    fn skewness(&self) -> f64 {
        0.0
    }

    fn kurtosis(&self) -> f64 {
        0.0
    }

    fn mode(&self) -> f64 {
        self.mean
    }

    fn median(&self) -> f64 {
        self.mean
    }

    fn minimum(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn maximum(&self) -> f64 {
        f64::INFINITY
    }

    fn probability(&self, x: f64) -> Result<f64> {
        Ok(self.log_probability(x)?.exp())
    }

    fn log_probability(&self, x: f64) -> Result<f64> {
        let z = (x - self.mean) / self.standard_deviation;
        Ok(-0.5 * z * z - self.standard_deviation.ln() - 0.5 * (2.0 * PI).ln())
    }

    fn variance_function(&self, _mu: f64) -> f64 {
        self.variance()
    }

    fn has_constant_variance(&self) -> bool {
        true
    }

    fn deviance(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64> {
        check_lengths(response, mu, weights)?;
        check_scale(scale)?;

        let sum: f64 = response
            .iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&y, &m), &w)| w * (y - m) * (y - m))
            .sum();

        Ok(sum / scale)
    }

    fn log_likelihood(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64> {
        check_lengths(response, mu, weights)?;
        check_scale(scale)?;

        let common = (2.0 * PI * scale).ln();
        Ok(response
            .iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&y, &m), &w)| -0.5 * w * ((y - m) * (y - m) / scale + common))
            .sum())
    }
}

/// Poisson distribution with rate λ = `mean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poisson {
    mean: f64,
}

impl Poisson {
    pub fn new(mean: f64) -> Result<Self> {
        if !(mean > 0.0) || !mean.is_finite() {
            return Err(GLMError::DomainError(format!(
                "Poisson mean must be positive, got {}",
                mean
            )));
        }
        Ok(Poisson { mean })
    }

    /// Variate generator for this distribution's mean.
    pub fn sampler<R: Rng>(&self, rng: R) -> PoissonSampler<R> {
        PoissonSampler::from_valid_mean(self.mean, rng)
    }
}

impl Default for Poisson {
    fn default() -> Self {
        Poisson { mean: 1.0 }
    }
}

impl Distribution for Poisson {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    fn default_link(&self) -> Link {
        Link::Log
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn variance(&self) -> f64 {
        self.mean
    }

    fn entropy(&self) -> f64 {
        let m = self.mean;
        0.5 * (2.0 * PI * E * m).ln()
            - 1.0 / (12.0 * m)
            - 1.0 / (24.0 * m * m)
            - 19.0 / (360.0 * m * m * m)
    }

    fn skewness(&self) -> f64 {
        1.0 / self.mean.sqrt()
    }

    fn kurtosis(&self) -> f64 {
        1.0 / self.mean
    }

    fn mode(&self) -> f64 {
        self.mean.floor()
    }

    fn median(&self) -> f64 {
        (self.mean + 1.0 / 3.0 - 0.02 / self.mean).floor()
    }

    fn minimum(&self) -> f64 {
        0.0
    }

    fn maximum(&self) -> f64 {
        f64::INFINITY
    }

    fn probability(&self, x: f64) -> Result<f64> {
        Ok(self.log_probability(x)?.exp())
    }

    /// x·ln λ − ln x! − λ for integer x in [0, 170].
    fn log_probability(&self, x: f64) -> Result<f64> {
        if !(0.0..=factorial::LIMIT as f64).contains(&x) || x.fract() != 0.0 {
            return Err(GLMError::DomainError(format!(
                "Poisson argument {} must be an integer in [0, {}]",
                x,
                factorial::LIMIT
            )));
        }

        let ln_x_factorial = factorial::ln_factorial_cached(x as u64)?;
        Ok(x * self.mean.ln() - ln_x_factorial - self.mean)
    }

    fn variance_function(&self, mu: f64) -> f64 {
        mu.abs()
    }

    fn deviance(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64> {
        check_lengths(response, mu, weights)?;
        check_scale(scale)?;

        let sum: f64 = response
            .iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&y, &m), &w)| {
                if y > 0.0 {
                    w * (y * (y / m).ln() - (y - m))
                } else {
                    w * m
                }
            })
            .sum();

        Ok(2.0 * sum / scale)
    }

    fn log_likelihood(
        &self,
        response: &Array1<f64>,
        mu: &Array1<f64>,
        weights: &Array1<f64>,
        scale: f64,
    ) -> Result<f64> {
        check_lengths(response, mu, weights)?;
        check_scale(scale)?;

        let mut total = 0.0;
        for ((&y, &m), &w) in response.iter().zip(mu.iter()).zip(weights.iter()) {
            if y < 0.0 {
                return Err(GLMError::DomainError(format!(
                    "Poisson response must be non-negative, got {}",
                    y
                )));
            }

            let ln_y_factorial = if y.fract() == 0.0 {
                factorial::ln_factorial(y as u64)
            } else {
                ln_gamma(y + 1.0)
            };
            let y_ln_mu = if y > 0.0 { y * m.ln() } else { 0.0 };

            total += w * (y_ln_mu - m - ln_y_factorial);
        }

        Ok(total)
    }
}
