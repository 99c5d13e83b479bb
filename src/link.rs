//! Link functions relating the mean response μ to the linear predictor η = g(μ)

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;

use crate::{GLMError, Result};

/// Smallest positive double; the log link clamps to it so ln never returns -∞.
const LOG_FLOOR: f64 = 5e-324;

/// Link function g with its inverse and first two derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Link {
    Identity,
    Log,
    Logit,
    /// g(μ) = μ^p; p = 0 is treated as the log link.
    Power(f64),
}

impl Link {
    pub fn name(&self) -> &'static str {
        match self {
            Link::Identity => "identity",
            Link::Log => "log",
            Link::Logit => "logit",
            Link::Power(_) => "power",
        }
    }

    /// g(μ)
    pub fn link(&self, mu: f64) -> f64 {
        match *self {
            Link::Identity => mu,
            Link::Log => mu.max(LOG_FLOOR).ln(),
            Link::Logit => (mu / (1.0 - mu)).ln(),
            Link::Power(p) if p == 0.0 => Link::Log.link(mu),
            Link::Power(p) => mu.powf(p),
        }
    }

    /// g⁻¹(η)
    pub fn inverse_link(&self, eta: f64) -> f64 {
        match *self {
            Link::Identity => eta,
            Link::Log => eta.exp(),
            Link::Logit => 1.0 / (1.0 + (-eta).exp()),
            Link::Power(p) if p == 0.0 => eta.exp(),
            Link::Power(p) => eta.powf(1.0 / p),
        }
    }

    /// g′(μ) = dη/dμ
    pub fn derivative(&self, mu: f64) -> f64 {
        match *self {
            Link::Identity => 1.0,
            Link::Log => 1.0 / mu,
            Link::Logit => 1.0 / (mu * (1.0 - mu)),
            Link::Power(p) if p == 0.0 => 1.0 / mu,
            Link::Power(p) => p * mu.powf(p - 1.0),
        }
    }

    /// g″(μ)
    pub fn second_derivative_at(&self, mu: f64) -> f64 {
        match *self {
            Link::Identity => 0.0,
            Link::Log => -1.0 / (mu * mu),
            Link::Logit => {
                let v = mu * (1.0 - mu);
                (2.0 * mu - 1.0) / (v * v)
            }
            Link::Power(p) if p == 0.0 => -1.0 / (mu * mu),
            Link::Power(p) => p * (p - 1.0) * mu.powf(p - 2.0),
        }
    }

    /// Apply g element-wise.
    pub fn evaluate(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| self.link(m))
    }

    /// Apply g⁻¹ element-wise.
    pub fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(|e| self.inverse_link(e))
    }

    pub fn first_derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| self.derivative(m))
    }

    pub fn second_derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| self.second_derivative_at(m))
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Link::Power(p) => write!(f, "power({})", p),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for Link {
    type Err = GLMError;

    /// Accepts `identity`, `log`, `logit`, `power(p)` or `power:p`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "identity" => Ok(Link::Identity),
            "log" => Ok(Link::Log),
            "logit" => Ok(Link::Logit),
            other => {
                let exponent = other
                    .strip_prefix("power(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .or_else(|| other.strip_prefix("power:"))
                    .ok_or_else(|| {
                        GLMError::InvalidParameter(format!("unknown link function '{}'", s))
                    })?;

                exponent.trim().parse::<f64>().map(Link::Power).map_err(|_| {
                    GLMError::InvalidParameter(format!("invalid power exponent '{}'", exponent))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_identity_link() {
        let mu = array![-1.5, 0.0, 2.0];
        assert_eq!(Link::Identity.evaluate(&mu), mu);
        assert_eq!(Link::Identity.inverse(&mu), mu);
        assert_eq!(Link::Identity.first_derivative(&mu), array![1.0, 1.0, 1.0]);
        assert_eq!(Link::Identity.second_derivative(&mu), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_log_link_clamps_zero() {
        let eta = Link::Log.evaluate(&array![0.0, -3.0, 1.0]);
        assert!(eta.iter().all(|e| e.is_finite()));
        assert_abs_diff_eq!(eta[0], LOG_FLOOR.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(eta[2], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_round_trips() {
        let mu = array![0.1, 0.5, 0.9];
        for link in [Link::Identity, Link::Log, Link::Logit, Link::Power(0.5), Link::Power(0.0)] {
            let back = link.inverse(&link.evaluate(&mu));
            for i in 0..mu.len() {
                assert_abs_diff_eq!(back[i], mu[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-6;
        for link in [Link::Log, Link::Logit, Link::Power(2.0), Link::Power(-1.0)] {
            for &mu in &[0.2, 0.4, 0.7] {
                let numeric = (link.link(mu + h) - link.link(mu - h)) / (2.0 * h);
                assert_abs_diff_eq!(link.derivative(mu), numeric, epsilon = 1e-5);

                let numeric2 = (link.derivative(mu + h) - link.derivative(mu - h)) / (2.0 * h);
                assert_abs_diff_eq!(link.second_derivative_at(mu), numeric2, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("identity".parse::<Link>().unwrap(), Link::Identity);
        assert_eq!("LOG".parse::<Link>().unwrap(), Link::Log);
        assert_eq!("logit".parse::<Link>().unwrap(), Link::Logit);
        assert_eq!("power(0.5)".parse::<Link>().unwrap(), Link::Power(0.5));
        assert_eq!("power:2".parse::<Link>().unwrap(), Link::Power(2.0));
        assert!("probit".parse::<Link>().is_err());
        assert!("power(x)".parse::<Link>().is_err());
    }
}
