//! IQR fence outlier rule.
//!
//! A value is an outlier when it lies strictly outside
//! `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`, with type-7 quartiles over the
//! non-missing values. The profiler's per-variable report and the
//! advisor's "outliers detected" guidance both go through
//! [`detect_iqr_outliers`], so they always agree.
//!
//! ```
//! use u_statprofile::dataframe::Column;
//! use u_statprofile::outlier::detect_iqr_outliers;
//!
//! let col = Column::numeric_from_options(
//!     vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)],
//! );
//! let detection = detect_iqr_outliers(&col).unwrap();
//! let fence = detection.fence.unwrap();
//! assert_eq!((fence.lower, fence.upper), (-1.0, 7.0));
//! assert_eq!(detection.indices, vec![4]);
//! ```

use crate::dataframe::Column;
use crate::stats;

/// Multiplier applied to the IQR when building fences.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Tukey fences for one numeric variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Builds fences from non-missing values. `None` when `values` is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = stats::sorted(values);
        let q1 = stats::quantile_sorted(&sorted, 0.25)?;
        let q3 = stats::quantile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        })
    }

    /// Interquartile range (Q3 - Q1).
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// `true` when `v` lies strictly outside `[lower, upper]`.
    #[inline]
    pub fn is_outlier(&self, v: f64) -> bool {
        v < self.lower || v > self.upper
    }
}

/// Outlier membership for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct IqrDetection {
    /// Fences, `None` when the column has no non-missing values.
    pub fence: Option<IqrFence>,
    /// Row indices of outliers, in row order. Missing rows never appear.
    pub indices: Vec<usize>,
    /// Number of non-missing values the fences were computed from.
    pub valid_count: usize,
}

impl IqrDetection {
    /// Number of outliers.
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

/// Applies the IQR fence rule to a numeric column.
///
/// Returns `None` for non-numeric columns.
pub fn detect_iqr_outliers(col: &Column) -> Option<IqrDetection> {
    let (values, validity) = match col {
        Column::Numeric { values, validity } => (values, validity),
        _ => return None,
    };

    let valid: Vec<f64> = validity.valid_indices().map(|i| values[i]).collect();
    let fence = IqrFence::from_values(&valid);
    let indices = match &fence {
        Some(f) => validity
            .valid_indices()
            .filter(|&i| f.is_outlier(values[i]))
            .collect(),
        None => Vec::new(),
    };

    Some(IqrDetection {
        fence,
        indices,
        valid_count: valid.len(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
