//! Poisson variate generation
//!
//! Small means use Knuth's multiplication method. From λ = 30 upward the
//! rejection method of Atkinson (algorithm PA) is used, whose cost does not grow
//! with λ.

use std::f64::consts::PI;

use rand::distributions::Open01;
use rand::Rng;

use crate::factorial::ln_factorial;
use crate::{GLMError, Result};

/// Means at or above this use the rejection sampler.
const REJECTION_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy)]
enum Method {
    /// Multiply uniforms until the product drops to e^−λ.
    Knuth { threshold: f64 },
    /// Logistic-envelope rejection (Atkinson's PA).
    Rejection {
        alpha: f64,
        beta: f64,
        k: f64,
        ln_mean: f64,
    },
}

/// Infinite stream of Poisson(λ) variates drawn from an owned RNG.
#[derive(Debug, Clone)]
pub struct PoissonSampler<R: Rng> {
    mean: f64,
    method: Method,
    rng: R,
}

impl<R: Rng> PoissonSampler<R> {
    pub fn new(mean: f64, rng: R) -> Result<Self> {
        if !(mean > 0.0) || !mean.is_finite() {
            return Err(GLMError::DomainError(format!(
                "Poisson mean must be positive and finite, got {}",
                mean
            )));
        }
        Ok(Self::from_valid_mean(mean, rng))
    }

    /// Caller guarantees `mean` is positive and finite.
    pub(crate) fn from_valid_mean(mean: f64, rng: R) -> Self {
        let method = if mean < REJECTION_THRESHOLD {
            Method::Knuth {
                threshold: (-mean).exp(),
            }
        } else {
            let c = 0.767 - 3.36 / mean;
            let beta = PI / (3.0 * mean).sqrt();
            let alpha = beta * mean;
            Method::Rejection {
                alpha,
                beta,
                k: c.ln() - mean - beta.ln(),
                ln_mean: mean.ln(),
            }
        };

        PoissonSampler { mean, method, rng }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Draw one variate.
    pub fn sample(&mut self) -> u64 {
        match self.method {
            Method::Knuth { threshold } => {
                let mut count = 0;
                let mut product: f64 = self.rng.gen();
                while product > threshold {
                    count += 1;
                    product *= self.rng.gen::<f64>();
                }
                count
            }
            Method::Rejection {
                alpha,
                beta,
                k,
                ln_mean,
            } => loop {
                let u: f64 = self.rng.sample(Open01);
                let x = (alpha - ((1.0 - u) / u).ln()) / beta;
                let n = (x + 0.5).floor();
                if n < 0.0 {
                    continue;
                }

                let v: f64 = self.rng.sample(Open01);
                let y = alpha - beta * x;
                let lhs = y + (v / (1.0 + y.exp()).powi(2)).ln();
                let rhs = k + n * ln_mean - ln_factorial(n as u64);
                if lhs <= rhs {
                    return n as u64;
                }
            },
        }
    }
}

impl<R: Rng> Iterator for PoissonSampler<R> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Distribution, Poisson};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_invalid_mean() {
        let rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            PoissonSampler::new(0.0, rng.clone()),
            Err(GLMError::DomainError(_))
        ));
        assert!(matches!(
            PoissonSampler::new(f64::NAN, rng.clone()),
            Err(GLMError::DomainError(_))
        ));
        assert!(matches!(
            PoissonSampler::new(f64::INFINITY, rng),
            Err(GLMError::DomainError(_))
        ));
    }

    #[test]
    fn test_method_selection() {
        let small = PoissonSampler::new(29.9, ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(matches!(small.method, Method::Knuth { .. }));

        let large = PoissonSampler::new(30.0, ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(matches!(large.method, Method::Rejection { .. }));
    }

    #[test]
    fn test_seeded_streams_repeat() {
        let a: Vec<u64> = PoissonSampler::new(3.5, ChaCha8Rng::seed_from_u64(7))
            .unwrap()
            .take(50)
            .collect();
        let b: Vec<u64> = Poisson::new(3.5)
            .unwrap()
            .sampler(ChaCha8Rng::seed_from_u64(7))
            .take(50)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_large_mean_moments() {
        let poisson = Poisson::new(100.0).unwrap();
        let draws: Vec<f64> = poisson
            .sampler(ChaCha8Rng::seed_from_u64(42))
            .take(50_000)
            .map(|n| n as f64)
            .collect();

        let n = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / n;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);

        // Standard error of the mean is √(100/50000) ≈ 0.045
        assert_abs_diff_eq!(mean, poisson.mean(), epsilon = 0.25);
        assert_abs_diff_eq!(var, poisson.variance(), epsilon = 5.0);
    }
}
