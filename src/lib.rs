//! glm_rust: dense linear algebra, least squares and Generalized Linear Models
//!
//! The crate is layered leaf to root:
//!
//! - [`linalg`] and [`qr`]: matrix multiply/transpose, LU with partial pivoting,
//!   Householder QR. Generic over the [`linalg::Scalar`] element type.
//! - [`factorial`]: process-wide factorial and log-factorial table.
//! - [`link`] and [`distribution`]: link functions and the Gaussian / Poisson
//!   families used by the GLM fitters.
//! - [`least_squares`]: ordinary, weighted and QR least squares.
//! - [`irls`] and [`newton`]: GLM fitting by IRLS and by Newton-Raphson.
//! - [`sampler`]: Poisson variate generation.
//! - [`covariance`] and [`model`]: coefficient variances and a fitted-model wrapper.
//!
//! ## Example
//!
//! ```rust
//! use glm_rust::{fit_irls, IrlsConfig, Link, Poisson};
//! use ndarray::array;
//!
//! let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
//! let y = array![1.0, 2.0, 2.0, 4.0, 7.0];
//!
//! let poisson = Poisson::default();
//! let result = fit_irls(&x, &y, None, &poisson, Link::Log, &IrlsConfig::default()).unwrap();
//! assert_eq!(result.coefficients.len(), 2);
//! ```

pub mod covariance;
pub mod distribution;
pub mod factorial;
pub mod irls;
pub mod least_squares;
pub mod linalg;
pub mod link;
pub mod model;
pub mod newton;
pub mod qr;
pub mod sampler;

pub use distribution::{Distribution, Gaussian, Poisson};
pub use irls::{fit_irls, IrlsConfig, IrlsResult};
pub use least_squares::{regress_ols, regress_qr, regress_wls};
pub use linalg::{decompose_lu, determinant, invert_lu, solve_lu, LuDecomposition, Scalar};
pub use link::Link;
pub use model::GeneralizedLinearModel;
pub use newton::{fit_newton, NewtonConfig, NewtonResult};
pub use qr::{decompose_qr, solve_qr, QrDecomposition};
pub use sampler::PoissonSampler;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GLMError {
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Argument outside domain: {0}")]
    DomainError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Singular matrix encountered")]
    SingularMatrix,
}

pub type Result<T> = std::result::Result<T, GLMError>;

// Python bindings
#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
use pyo3::exceptions::PyValueError;

#[cfg(feature = "python")]
use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};

#[cfg(feature = "python")]
fn to_py_err(err: GLMError) -> PyErr {
    PyValueError::new_err(format!("{}", err))
}

/// Python wrapper for a fitted GLM
#[cfg(feature = "python")]
#[pyclass(name = "GLM")]
pub struct PyGLM {
    family: String,
    link: Option<Link>,
    add_constant: bool,
    inner: Option<GeneralizedLinearModel>,
}

#[cfg(feature = "python")]
#[pymethods]
impl PyGLM {
    #[new]
    #[pyo3(signature = (family="gaussian", link=None, add_constant=false))]
    fn new(family: &str, link: Option<&str>, add_constant: bool) -> PyResult<Self> {
        // Validate eagerly so a bad family name fails at construction.
        distribution::from_name(family).map_err(to_py_err)?;
        let link = link
            .map(|l| l.parse::<Link>())
            .transpose()
            .map_err(to_py_err)?;

        Ok(PyGLM {
            family: family.to_string(),
            link,
            add_constant,
            inner: None,
        })
    }

    #[pyo3(signature = (x, y, weights=None, max_iter=None))]
    fn fit<'py>(
        &mut self,
        py: Python<'py>,
        x: PyReadonlyArray2<f64>,
        y: PyReadonlyArray1<f64>,
        weights: Option<PyReadonlyArray1<f64>>,
        max_iter: Option<usize>,
    ) -> PyResult<PyObject> {
        let x_array = x.as_array().to_owned();
        let y_array = y.as_array().to_owned();
        let w_array = weights.map(|w| w.as_array().to_owned());

        let family = distribution::from_name(&self.family).map_err(to_py_err)?;
        let config = IrlsConfig {
            max_iterations: max_iter.unwrap_or(100),
            ..IrlsConfig::default()
        };

        let model = GeneralizedLinearModel::fit(
            &x_array,
            &y_array,
            w_array.as_ref(),
            family.as_ref(),
            self.link,
            self.add_constant,
            &config,
        )
        .map_err(to_py_err)?;

        let result = pyo3::types::PyDict::new_bound(py);
        result.set_item(
            "coefficients",
            PyArray1::from_vec_bound(py, model.coefficients().to_vec()),
        )?;
        result.set_item(
            "fitted_values",
            PyArray1::from_vec_bound(py, model.fitted_values().to_vec()),
        )?;
        result.set_item("deviance", model.deviance())?;
        result.set_item("iterations", model.iterations())?;
        result.set_item("converged", model.converged())?;

        self.inner = Some(model);
        Ok(result.into())
    }

    fn standard_errors<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let model = self
            .inner
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("Model not fitted yet"))?;
        let se = model.standard_errors_ols().map_err(to_py_err)?;
        Ok(PyArray1::from_vec_bound(py, se.to_vec()))
    }

    fn predict(&self, observation: Vec<f64>) -> PyResult<f64> {
        let model = self
            .inner
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("Model not fitted yet"))?;
        model.predict(&observation).map_err(to_py_err)
    }
}

#[cfg(feature = "python")]
#[pymodule]
fn glm_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGLM>()?;
    Ok(())
}
