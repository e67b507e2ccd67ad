//! Normality testing.
//!
//! Implements the Shapiro-Wilk W test using Royston's (1995) polynomial
//! approximations for the coefficients and the p-value (algorithm AS R94),
//! valid for 3 ≤ n ≤ 5000. Larger samples are reduced by uniform
//! subsampling before testing (see [`subsample`]).
//!
//! # Example
//!
//! ```
//! use u_statprofile::distribution::shapiro_wilk;
//!
//! let data = [-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5];
//! let result = shapiro_wilk(&data).unwrap();
//! assert!(result.p_value > 0.05);
//! assert!(result.statistic > 0.9); // W close to 1 suggests normality
//! ```

use crate::error::ProfileError;
use crate::stats;
use rand::Rng;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Smallest sample the test accepts.
pub const SW_MIN_N: usize = 3;
/// Largest sample the approximation is valid for.
pub const SW_MAX_N: usize = 5000;

/// Royston's polynomial for the last coefficient a_n.
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
/// Royston's polynomial for the second-to-last coefficient a_{n-1}.
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

// ── Result Types ────────────────────────────────────────────────────

/// Raw Shapiro-Wilk result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    /// W statistic in (0, 1].
    pub statistic: f64,
    /// Upper-tail p-value.
    pub p_value: f64,
    /// Sample size the test ran on.
    pub n: usize,
}

/// Reasons a Shapiro-Wilk test cannot be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapiroWilkError {
    #[error("need at least 3 observations, got {0}")]
    TooFewObservations(usize),
    #[error("at most 5000 observations are supported, got {0}")]
    TooManyObservations(usize),
    #[error("sample contains non-finite values")]
    NonFinite,
    #[error("all values are identical")]
    Constant,
    #[error("normal distribution unavailable: {0}")]
    Distribution(String),
}

/// Outcome of a normality test on one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NormalityOutcome {
    Tested {
        statistic: f64,
        p_value: f64,
        is_normal: bool,
        interpretation: String,
    },
    /// The test could not be computed; `error` is a
    /// [`ProfileError::StatisticalTestFailure`].
    Failed {
        error: ProfileError,
        interpretation: String,
    },
}

/// Normality test result for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityTestResult {
    pub variable: String,
    /// Observations actually tested (after dropping missing and subsampling).
    pub sample_size: usize,
    /// Whether the tested sample was drawn from a larger one.
    pub subsampled: bool,
    pub outcome: NormalityOutcome,
}

impl NormalityTestResult {
    /// `Some(is_normal)` for a completed test.
    pub fn is_normal(&self) -> Option<bool> {
        match &self.outcome {
            NormalityOutcome::Tested { is_normal, .. } => Some(*is_normal),
            NormalityOutcome::Failed { .. } => None,
        }
    }

    /// Human-readable interpretation.
    pub fn interpretation(&self) -> &str {
        match &self.outcome {
            NormalityOutcome::Tested { interpretation, .. }
            | NormalityOutcome::Failed { interpretation, .. } => interpretation,
        }
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Runs the Shapiro-Wilk normality test.
///
/// # Errors
///
/// Fails for n < 3, n > 5000, non-finite input, or a sample whose
/// range is below `1e-10`.
pub fn shapiro_wilk(data: &[f64]) -> Result<ShapiroWilk, ShapiroWilkError> {
    let n = data.len();
    if n < SW_MIN_N {
        return Err(ShapiroWilkError::TooFewObservations(n));
    }
    if n > SW_MAX_N {
        return Err(ShapiroWilkError::TooManyObservations(n));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ShapiroWilkError::NonFinite);
    }

    let x = stats::sorted(data);
    if x[n - 1] - x[0] < 1e-10 {
        return Err(ShapiroWilkError::Constant);
    }

    let normal =
        Normal::new(0.0, 1.0).map_err(|e| ShapiroWilkError::Distribution(e.to_string()))?;
    let a = coefficients(n, &normal);

    let mean = stats::mean(&x).unwrap_or(0.0);
    let ssq: f64 = x.iter().map(|v| (v - mean) * (v - mean)).sum();
    let numerator: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let statistic = (numerator * numerator / ssq).min(1.0);
    let p_value = p_value(statistic, n, &normal);

    Ok(ShapiroWilk {
        statistic,
        p_value,
        n,
    })
}

/// Tests `values` (missing already removed) and wraps the outcome.
///
/// A failed test is recorded as [`NormalityOutcome::Failed`] and never
/// propagated.
pub fn test_normality(
    variable: &str,
    values: &[f64],
    subsampled: bool,
    significance_level: f64,
) -> NormalityTestResult {
    let outcome = match shapiro_wilk(values) {
        Ok(sw) => {
            let is_normal = sw.p_value > significance_level;
            let interpretation = if is_normal {
                format!("Data appears normally distributed (p > {significance_level})")
            } else {
                format!("Data does not appear normally distributed (p <= {significance_level})")
            };
            NormalityOutcome::Tested {
                statistic: sw.statistic,
                p_value: sw.p_value,
                is_normal,
                interpretation,
            }
        }
        Err(e) => {
            let error = ProfileError::StatisticalTestFailure {
                variable: variable.to_string(),
                reason: e.to_string(),
            };
            tracing::warn!(%error, "normality test failed");
            NormalityOutcome::Failed {
                error,
                interpretation: "Test could not be performed".to_string(),
            }
        }
    };

    NormalityTestResult {
        variable: variable.to_string(),
        sample_size: values.len(),
        subsampled,
        outcome,
    }
}

/// Uniform subsample of at most `max` values without replacement.
///
/// Returns the input unchanged (and `false`) when it already fits;
/// otherwise the drawn values in original order and `true`.
///
/// ```
/// use rand::SeedableRng;
/// use u_statprofile::distribution::subsample;
///
/// let data: Vec<f64> = (0..100).map(f64::from).collect();
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let (sample, drawn) = subsample(&data, 10, &mut rng);
/// assert!(drawn);
/// assert_eq!(sample.len(), 10);
/// ```
pub fn subsample<R: Rng + ?Sized>(values: &[f64], max: usize, rng: &mut R) -> (Vec<f64>, bool) {
    if values.len() <= max {
        return (values.to_vec(), false);
    }
    let mut picked = rand::seq::index::sample(rng, values.len(), max).into_vec();
    picked.sort_unstable();
    (picked.into_iter().map(|i| values[i]).collect(), true)
}

// ── Internals ───────────────────────────────────────────────────────

fn poly(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Antisymmetric weights a_1..a_n for sorted data.
fn coefficients(n: usize, normal: &Normal) -> Vec<f64> {
    if n == 3 {
        let a = std::f64::consts::FRAC_1_SQRT_2;
        return vec![-a, 0.0, a];
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let ssm: f64 = m.iter().map(|v| v * v).sum();
    let rssm = ssm.sqrt();
    let u = 1.0 / nf.sqrt();

    let mut a = vec![0.0; n];
    let an = poly(&C1, u) + m[n - 1] / rssm;
    a[n - 1] = an;
    a[0] = -an;

    if n > 5 {
        let an1 = poly(&C2, u) + m[n - 2] / rssm;
        let phi = (ssm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
        let s = phi.sqrt();
        for i in 2..n - 2 {
            a[i] = m[i] / s;
        }
        a[n - 2] = an1;
        a[1] = -an1;
    } else {
        let phi = (ssm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
        let s = phi.sqrt();
        for i in 1..n - 1 {
            a[i] = m[i] / s;
        }
    }
    a
}

fn p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }
    let nf = n as f64;

    if n == 3 {
        // 6/π and asin(sqrt(3/4))
        const PI6: f64 = 1.909_859_317_102_744;
        const STQR: f64 = 1.047_197_551_196_597_7;
        return (PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0);
    }

    let w1 = (1.0 - w).ln();
    let z = if n <= 11 {
        let gamma = -2.273 + 0.459 * nf;
        if w1 >= gamma {
            return 1e-99;
        }
        let y = -(gamma - w1).ln();
        let mu = poly(&[0.5440, -0.39978, 0.025054, -0.0006714], nf);
        let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
        (y - mu) / sigma
    } else {
        let ln_n = nf.ln();
        let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
        let sigma = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
        (w1 - mu) / sigma
    };

    (1.0 - normal.cdf(z)).clamp(0.0, 1.0)
}

// ── Tests ───────────────────────────────────────────────────────────
