//! Process-wide factorial and log-factorial cache
//!
//! Entries 0..=170 are computed lazily: a lookup beyond the current cache length
//! extends the table up to that index. The table only ever grows, so an entry
//! returned once is returned bit-for-bit identically afterwards.

use std::sync::{OnceLock, RwLock};

use statrs::function::gamma::ln_gamma;

use crate::{GLMError, Result};

/// Largest n for which n! is finite in double precision.
pub const LIMIT: u64 = 170;

struct FactorialTable {
    values: Vec<f64>,
    logs: Vec<f64>,
}

impl FactorialTable {
    fn extend_to(&mut self, n: usize) {
        while self.values.len() <= n {
            let i = self.values.len();
            let value = self.values[i - 1] * i as f64;
            let log = self.logs[i - 1] + (i as f64).ln();
            self.values.push(value);
            self.logs.push(log);
        }
    }
}

static TABLE: OnceLock<RwLock<FactorialTable>> = OnceLock::new();

fn table() -> &'static RwLock<FactorialTable> {
    TABLE.get_or_init(|| {
        RwLock::new(FactorialTable {
            values: vec![1.0],
            logs: vec![0.0],
        })
    })
}

fn check_range(n: u64) -> Result<usize> {
    if n > LIMIT {
        return Err(GLMError::DomainError(format!(
            "factorial argument {} outside [0, {}]",
            n, LIMIT
        )));
    }
    Ok(n as usize)
}

/// Return (n!, ln n!) from the cache, growing it when needed.
fn lookup(n: usize) -> (f64, f64) {
    {
        // A poisoned lock still holds a consistent prefix: entries are pushed in pairs.
        let cache = table().read().unwrap_or_else(|e| e.into_inner());
        if n < cache.values.len() {
            return (cache.values[n], cache.logs[n]);
        }
    }

    let mut cache = table().write().unwrap_or_else(|e| e.into_inner());
    cache.extend_to(n);
    (cache.values[n], cache.logs[n])
}

/// n! for n in [0, 170].
pub fn factorial(n: u64) -> Result<f64> {
    let n = check_range(n)?;
    Ok(lookup(n).0)
}

/// ln(n!) for n in [0, 170], read from the shared table.
pub fn ln_factorial_cached(n: u64) -> Result<f64> {
    let n = check_range(n)?;
    Ok(lookup(n).1)
}

/// ln(n!) for any n: the table up to 170, ln Γ(n + 1) beyond.
pub fn ln_factorial(n: u64) -> f64 {
    if n <= LIMIT {
        lookup(n as usize).1
    } else {
        ln_gamma(n as f64 + 1.0)
    }
}

/// Number of entries currently cached.
pub fn cached_len() -> usize {
    table().read().unwrap_or_else(|e| e.into_inner()).values.len()
}
