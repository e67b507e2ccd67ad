//! Descriptive statistics primitives.
//!
//! All functions operate on already-filtered (non-missing) values and
//! return `None` when the statistic has no meaningful result. The
//! profiler lifts these into [`Statistic`] so that "undefined" stays
//! visible all the way to the renderer.
//!
//! # Algorithms
//!
//! - **Mean/Variance/StdDev**: `statrs` [`Statistics`], sample variance
//!   with Bessel's correction.
//! - **Quantile**: R-7 linear interpolation.
//!   Reference: Hyndman & Fan (1996), "Sample Quantiles in Statistical
//!   Packages", *The American Statistician* 50(4).
//! - **Pearson**: two-pass centered cross products.

use serde::Serialize;
use statrs::statistics::Statistics;
use std::fmt;

// ── Statistic ─────────────────────────────────────────────────────────

/// A derived value that may be undefined.
///
/// `Undefined` is never the same thing as a computed zero: standard
/// deviation of one observation, correlation of a pair with fewer than
/// two complete observations, and every statistic of an all-missing
/// column are `Undefined`.
///
/// ```
/// use u_statprofile::stats::Statistic;
///
/// assert_eq!(Statistic::from(Some(0.0)).value(), Some(0.0));
/// assert_eq!(Statistic::from(None), Statistic::Undefined);
/// assert_eq!(Statistic::Undefined.to_string(), "undefined");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Statistic {
    Defined(f64),
    Undefined,
}

impl Statistic {
    /// Returns the value if defined.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(v),
            Self::Undefined => None,
        }
    }

    /// Rounds a defined value to `decimals` places.
    pub fn rounded(self, decimals: u32) -> Self {
        match self {
            Self::Defined(v) => Self::Defined(round_to(v, decimals)),
            Self::Undefined => Self::Undefined,
        }
    }
}

impl From<Option<f64>> for Statistic {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(x) if x.is_finite() => Self::Defined(x),
            _ => Self::Undefined,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{v}"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

// ── Primitives ────────────────────────────────────────────────────────

/// Rounds half away from zero to `decimals` places.
///
/// ```
/// use u_statprofile::stats::round_to;
///
/// assert_eq!(round_to(2.34567, 3), 2.346);
/// assert_eq!(round_to(-1.005, 0), -1.0);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Percentage `100 * part / whole`, rounded to 2 decimals. Zero when
/// `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(100.0 * part as f64 / whole as f64, 2)
}

/// Arithmetic mean.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN/Inf.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() || !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(data.mean())
}

/// Sample variance (denominator `n - 1`).
///
/// # Returns
/// - `None` if `data.len() < 2` or contains NaN/Inf.
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 || !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(data.variance())
}

/// Sample standard deviation.
///
/// Equivalent to `sqrt(variance(data))`.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Sorts a copy of `data` ascending (NaN-free input assumed).
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Quantile of already-sorted data using linear interpolation between
/// order statistics (Hyndman & Fan type 7).
///
/// ```
/// use u_statprofile::stats::quantile_sorted;
///
/// let x = [1.0, 2.0, 3.0, 4.0, 100.0];
/// assert_eq!(quantile_sorted(&x, 0.25), Some(2.0));
/// assert_eq!(quantile_sorted(&x, 0.75), Some(4.0));
/// ```
///
/// # Returns
/// - `None` if `sorted_data` is empty or `p` is outside `[0, 1]`.
pub fn quantile_sorted(sorted_data: &[f64], p: f64) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted_data[0]);
    }

    let h = (n - 1) as f64 * p;
    let j = h.floor() as usize;
    let g = h - h.floor();

    if j + 1 >= n {
        Some(sorted_data[n - 1])
    } else {
        Some((1.0 - g) * sorted_data[j] + g * sorted_data[j + 1])
    }
}

/// Pearson correlation of paired observations.
///
/// Returns `None` for fewer than two pairs, mismatched lengths, or a
/// side with zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_sd() {
        let x = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(mean(&x), Some(22.0));
        let sd = std_dev(&x).unwrap();
        assert!((sd - 43.617_657).abs() < 1e-5, "sd = {sd}");
        assert_eq!(std_dev(&[5.0]), None);
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, f64::INFINITY]), None);
        assert_eq!(variance(&[2.0, 2.0, 2.0]), Some(0.0));
    }

    #[test]
    fn type7_quantiles() {
        let x = sorted(&[4.0, 1.0, 3.0, 2.0]);
        // h = 3 * 0.25 = 0.75 → 0.25 * 1 + 0.75 * 2
        assert_eq!(quantile_sorted(&x, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&x, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&x, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&x, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&[7.0], 0.75), Some(7.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&x, 1.5), None);
    }

    #[test]
    fn pearson_cases() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&x, &[1.0]), None);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(20.0, 2), 20.0);
        assert_eq!(round_to(1.0 / 3.0, 3), 0.333);
        assert_eq!(round_to(-0.0001, 2), 0.0);
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(percentage(1, 5), 20.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn statistic_lifting() {
        assert_eq!(Statistic::from(Some(1.23456)).rounded(3), Statistic::Defined(1.235));
        assert_eq!(Statistic::from(Some(f64::NAN)), Statistic::Undefined);
        assert_eq!(Statistic::Undefined.rounded(3), Statistic::Undefined);
        assert_eq!(Statistic::Defined(0.0).to_string(), "0");
    }
}
