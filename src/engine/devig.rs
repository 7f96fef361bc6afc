//! Odds normalizer: removes a price quoter's built-in margin ("vig") from a
//! set of mutually exclusive outcome prices, recovering fair probabilities.
//!
//! All three methods are pure and deterministic so the results are
//! reproducible under property testing.

use clap::ValueEnum;
use thiserror::Error;

/// How the overround is distributed back across the outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DevigMethod {
    /// Scale every implied probability by 1/sum.
    Multiplicative,
    /// Subtract (sum - 1)/n from each probability; falls back to
    /// multiplicative when that drives a probability to zero or below.
    Additive,
    /// Solve for k such that sum(p_i^k) = 1. Penalises longshots harder,
    /// which matches how quoters actually shade their books.
    #[default]
    Power,
}

#[derive(Debug, Error, PartialEq)]
pub enum DevigError {
    #[error("at least two odds are required, got {0}")]
    TooFewOdds(usize),
    #[error("odds must be strictly greater than 1.0, got {0}")]
    OddsOutOfRange(f64),
    #[error("odds must be finite, got {0}")]
    NotFinite(f64),
}

const POWER_K_LO: f64 = 0.0001;
const POWER_K_HI: f64 = 10.0;
const POWER_ITERATIONS: usize = 100;
const POWER_TOLERANCE: f64 = 1e-10;

/// Remove the overround from a set of decimal odds covering one market.
///
/// Input must hold >= 2 odds, each > 1.0. A market with no overround
/// (implied probabilities already sum to <= 1) is returned unchanged.
pub fn fair_odds(odds: &[f64], method: DevigMethod) -> Result<Vec<f64>, DevigError> {
    let probs = fair_probabilities(odds, method)?;
    Ok(probs.iter().map(|p| 1.0 / p).collect())
}

/// Same contract as [`fair_odds`] but in probability space.
pub fn fair_probabilities(odds: &[f64], method: DevigMethod) -> Result<Vec<f64>, DevigError> {
    validate(odds)?;

    let implied: Vec<f64> = odds.iter().map(|o| 1.0 / o).collect();
    let total: f64 = implied.iter().sum();
    if total <= 1.0 {
        // No margin to remove; does not happen with real quoters.
        return Ok(implied);
    }

    let fair = match method {
        DevigMethod::Multiplicative => multiplicative(&implied, total),
        DevigMethod::Additive => additive(&implied, total),
        DevigMethod::Power => power(&implied),
    };
    Ok(fair)
}

fn validate(odds: &[f64]) -> Result<(), DevigError> {
    if odds.len() < 2 {
        return Err(DevigError::TooFewOdds(odds.len()));
    }
    for &o in odds {
        if !o.is_finite() {
            return Err(DevigError::NotFinite(o));
        }
        if o <= 1.0 {
            return Err(DevigError::OddsOutOfRange(o));
        }
    }
    Ok(())
}

fn multiplicative(implied: &[f64], total: f64) -> Vec<f64> {
    implied.iter().map(|p| p / total).collect()
}

fn additive(implied: &[f64], total: f64) -> Vec<f64> {
    let shift = (total - 1.0) / implied.len() as f64;
    let adjusted: Vec<f64> = implied.iter().map(|p| p - shift).collect();
    if adjusted.iter().any(|&p| p <= 0.0) {
        return multiplicative(implied, total);
    }
    adjusted
}

/// Bisection over the exponent k in [0.0001, 10.0]. sum(p^k) is strictly
/// decreasing in k for p in (0, 1), so the root is unique.
fn power(implied: &[f64]) -> Vec<f64> {
    let powered_sum = |k: f64| -> f64 { implied.iter().map(|p| p.powf(k)).sum() };

    let mut lo = POWER_K_LO;
    let mut hi = POWER_K_HI;
    let mut k = 1.0;
    for _ in 0..POWER_ITERATIONS {
        k = (lo + hi) / 2.0;
        let sum = powered_sum(k);
        if (sum - 1.0).abs() < POWER_TOLERANCE {
            break;
        }
        if sum > 1.0 {
            lo = k;
        } else {
            hi = k;
        }
    }

    let powered: Vec<f64> = implied.iter().map(|p| p.powf(k)).collect();
    let total: f64 = powered.iter().sum();
    powered.iter().map(|p| p / total).collect()
}
