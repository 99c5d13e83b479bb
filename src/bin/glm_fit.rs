//! Fit a GLM to a whitespace-delimited data file.
//!
//! Each non-empty line holds one observation: the response first, then the
//! design columns. Lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use ndarray::Array1;

use glm_rust::distribution;
use glm_rust::linalg::{from_rows, prepend_column};
use glm_rust::{
    fit_newton, regress_qr, GeneralizedLinearModel, IrlsConfig, Link, NewtonConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Solver {
    /// Iteratively reweighted least squares
    Irls,
    /// Newton-Raphson with step halving
    Newton,
    /// Householder QR least squares (linear model only)
    Qr,
}

#[derive(Parser)]
#[command(
    name = "glm-fit",
    about = "Fit a Generalized Linear Model",
    version,
    after_help = "No logger is installed, so solver diagnostics are not printed. \
                  Convergence is reported on the summary line, and a fit that \
                  stops without converging also prints a warning to stderr."
)]
struct Cli {
    /// Data file: response in the first column, predictors after it
    data: PathBuf,

    /// Response distribution (gaussian or poisson)
    #[arg(long, default_value = "gaussian")]
    family: String,

    /// Link function (identity, log, logit, power(p)); defaults to the family's link
    #[arg(long)]
    link: Option<String>,

    #[arg(long, value_enum, default_value_t = Solver::Irls)]
    solver: Solver,

    /// Do not prepend an intercept column
    #[arg(long)]
    no_intercept: bool,

    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// Absolute convergence tolerance
    #[arg(long, default_value_t = 1e-10)]
    tolerance: f64,
}

fn read_data(path: &Path) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_rows(BufReader::new(file))
}

fn parse_rows<R: BufRead>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = trimmed
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: not a number", lineno + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

fn warn_if_not_converged(converged: bool, iterations: usize) {
    if !converged {
        eprintln!(
            "WARNING: did not converge after {} iterations; estimates are from the last step",
            iterations
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data = from_rows(&read_data(&cli.data)?)?;
    if data.ncols() < 2 && cli.no_intercept {
        bail!("need at least one predictor column when --no-intercept is given");
    }

    let response: Array1<f64> = data.column(0).to_owned();
    let predictors = data.slice(ndarray::s![.., 1..]).to_owned();
    let design = if cli.no_intercept {
        predictors.clone()
    } else {
        prepend_column(&predictors, 1.0)
    };

    let family = distribution::from_name(&cli.family)?;
    let link = match &cli.link {
        Some(name) => name.parse::<Link>()?,
        None => family.default_link(),
    };

    println!(
        "Data: n={}, k={}, family={}, link={}",
        design.nrows(),
        design.ncols(),
        family.name(),
        link
    );

    let start = Instant::now();
    match cli.solver {
        Solver::Irls => {
            let config = IrlsConfig {
                max_iterations: cli.max_iter,
                absolute_tolerance: cli.tolerance,
                ..IrlsConfig::default()
            };
            let model = GeneralizedLinearModel::fit(
                &predictors,
                &response,
                None,
                family.as_ref(),
                Some(link),
                !cli.no_intercept,
                &config,
            )?;
            let elapsed = start.elapsed();

            let se = model.standard_errors_ols()?;
            let robust = model.standard_errors_hc1()?;

            println!("{:>6} {:>14} {:>14} {:>14}", "term", "estimate", "std.err", "robust");
            for (j, beta) in model.coefficients().iter().enumerate() {
                println!("{:>6} {:>14.6} {:>14.6} {:>14.6}", j, beta, se[j], robust[j]);
            }
            println!(
                "deviance={:.6} rmse={:.6} iterations={} converged={}",
                model.deviance(),
                model.root_mean_squared_error(),
                model.iterations(),
                model.converged()
            );
            println!("elapsed: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
            warn_if_not_converged(model.converged(), model.iterations());
        }
        Solver::Newton => {
            let config = NewtonConfig {
                max_iterations: cli.max_iter,
                tolerance: cli.tolerance,
                ..NewtonConfig::default()
            };
            let result = fit_newton(&design, &response, link, &config)?;
            let elapsed = start.elapsed();

            println!("{:>6} {:>14}", "term", "estimate");
            for (j, beta) in result.coefficients.iter().enumerate() {
                println!("{:>6} {:>14.6}", j, beta);
            }
            println!(
                "mse={:.6} iterations={} converged={}",
                result.mean_squared_error, result.iterations, result.converged
            );
            println!("elapsed: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
            warn_if_not_converged(result.converged, result.iterations);
        }
        Solver::Qr => {
            if link != Link::Identity {
                bail!("the qr solver fits linear models only, got link {}", link);
            }
            let beta = regress_qr(&design, &response)?;
            let elapsed = start.elapsed();

            println!("{:>6} {:>14}", "term", "estimate");
            for (j, b) in beta.iter().enumerate() {
                println!("{:>6} {:>14.6}", j, b);
            }
            println!("elapsed: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
        }
    }

    Ok(())
}
