//! Dataset-level profiling.
//!
//! The profiler observes a dataset and reports its shape, missing
//! patterns, descriptive statistics, frequency tables, IQR outliers,
//! pairwise-complete correlation and structural quality defects. It
//! tolerates dirty data: missing values are expected input, not errors.
//!
//! # Example
//!
//! ```
//! use u_statprofile::csv_parser::CsvParser;
//! use u_statprofile::profiling::profile_dataset;
//!
//! let csv = "x,y\n1,a\n2,a\n3,b\n4,b\n100,a\n";
//! let ds = CsvParser::new().parse_str(csv).unwrap();
//! let profile = profile_dataset(&ds).unwrap();
//!
//! let x = profile.numeric_summary("x").unwrap();
//! assert_eq!(x.mean.value(), Some(22.0));
//! let outliers = profile.outlier_report("x").unwrap();
//! assert_eq!(outliers.samples, vec![100.0]);
//! ```

use crate::classify::{classify, VariableTypePartition};
use crate::dataframe::{CellKey, Column, DataType, Dataset};
use crate::error::ProfileError;
use crate::outlier::detect_iqr_outliers;
use crate::stats::{self, percentage, Statistic};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, instrument};

// ── Configuration ─────────────────────────────────────────────────────

/// Thresholds used by the profiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// A categorical/text column is high-cardinality when its distinct
    /// count (missing counted as a level) exceeds this share of rows.
    /// Default: 0.9.
    pub high_cardinality_ratio: f64,
    /// A column with at most this many distinct non-missing values is
    /// constant. Default: 1.
    pub constant_max_distinct: usize,
    /// Categories kept per frequency table. Default: 10.
    pub top_categories: usize,
    /// Outlier values reported per variable. Default: 5.
    pub outlier_samples: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            high_cardinality_ratio: 0.9,
            constant_max_distinct: 1,
            top_categories: 10,
            outlier_samples: 5,
        }
    }
}

impl ProfileConfig {
    /// Sets the high-cardinality ratio.
    pub fn high_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.high_cardinality_ratio = ratio;
        self
    }

    /// Sets the constant-variable distinct-count ceiling.
    pub fn constant_max_distinct(mut self, max: usize) -> Self {
        self.constant_max_distinct = max;
        self
    }

    /// Sets the number of categories kept per frequency table.
    pub fn top_categories(mut self, n: usize) -> Self {
        self.top_categories = n;
        self
    }

    /// Sets the number of sample outlier values reported.
    pub fn outlier_samples(mut self, n: usize) -> Self {
        self.outlier_samples = n;
        self
    }
}

// ── Missing values ────────────────────────────────────────────────────

/// Missing-value count for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingEntry {
    pub variable: String,
    pub missing_count: usize,
    /// `100 * missing_count / n`, 2 decimals.
    pub missing_pct: f64,
}

// ── Numeric summary ───────────────────────────────────────────────────

/// Descriptive statistics over the non-missing values of a numeric
/// variable, each rounded to 3 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub variable: String,
    /// Number of non-missing values.
    pub n: usize,
    pub mean: Statistic,
    /// Sample standard deviation; undefined below two values.
    pub sd: Statistic,
    pub median: Statistic,
    pub min: Statistic,
    pub max: Statistic,
    pub q25: Statistic,
    pub q75: Statistic,
    pub range: Statistic,
    pub iqr: Statistic,
}

// ── Categorical summary ───────────────────────────────────────────────

/// A frequency-table label: an observed value or the missing bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryLabel {
    Value(String),
    Missing,
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Missing => write!(f, "NA"),
        }
    }
}

/// One row of a frequency table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub label: CategoryLabel,
    pub count: usize,
    /// Share of all rows, 2 decimals.
    pub pct: f64,
}

/// Frequency table for a categorical or text variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub variable: String,
    /// Distinct levels, missing included as a level.
    pub distinct_count: usize,
    /// Most frequent levels, count descending, ties in first-encounter order.
    pub categories: Vec<CategoryCount>,
}

impl CategoricalSummary {
    /// Count of `label`, if it made the table.
    pub fn count_of(&self, label: &str) -> Option<usize> {
        self.categories
            .iter()
            .find(|c| matches!(&c.label, CategoryLabel::Value(v) if v == label))
            .map(|c| c.count)
    }
}

// ── Outliers ──────────────────────────────────────────────────────────

/// IQR-fence outlier report for a numeric variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub variable: String,
    /// `Q1 - 1.5*IQR`; undefined without non-missing values.
    pub lower: Statistic,
    /// `Q3 + 1.5*IQR`; undefined without non-missing values.
    pub upper: Statistic,
    pub count: usize,
    /// Share of non-missing values, 2 decimals.
    pub pct: f64,
    /// First few outlier values in row order.
    pub samples: Vec<f64>,
}

// ── Correlation ───────────────────────────────────────────────────────

/// Pairwise-complete Pearson correlation matrix over numeric variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<String>,
    /// Row-major `k×k` cells.
    pub values: Vec<Vec<Statistic>>,
}

impl CorrelationMatrix {
    /// Cell `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Option<Statistic> {
        self.values.get(i).and_then(|row| row.get(j)).copied()
    }

    /// Cell for a pair of variable names.
    pub fn between(&self, a: &str, b: &str) -> Option<Statistic> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        self.get(i, j)
    }

    /// Matrix dimension.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` for an empty matrix.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

// ── Quality ───────────────────────────────────────────────────────────

/// Structural data-quality defects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityIssues {
    /// Rows identical to an earlier row (missing markers included).
    pub duplicate_rows: usize,
    /// Columns with at most one distinct non-missing value.
    pub constant_variables: Vec<String>,
    /// Categorical/text columns whose distinct count nears the row count.
    pub high_cardinality_variables: Vec<String>,
}

/// A single quality defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QualityIssue {
    DuplicateRows(usize),
    ConstantVariable(String),
    HighCardinality(String),
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRows(n) => write!(f, "{n} duplicate rows"),
            Self::ConstantVariable(v) => write!(f, "constant variable: {v}"),
            Self::HighCardinality(v) => write!(f, "high cardinality variable: {v}"),
        }
    }
}

impl QualityIssues {
    /// Flattened defect list; a zero duplicate count is omitted.
    pub fn issues(&self) -> Vec<QualityIssue> {
        let mut out = Vec::new();
        if self.duplicate_rows > 0 {
            out.push(QualityIssue::DuplicateRows(self.duplicate_rows));
        }
        out.extend(
            self.constant_variables
                .iter()
                .cloned()
                .map(QualityIssue::ConstantVariable),
        );
        out.extend(
            self.high_cardinality_variables
                .iter()
                .cloned()
                .map(QualityIssue::HighCardinality),
        );
        out
    }

    /// Returns `true` when no defect was found.
    pub fn is_empty(&self) -> bool {
        self.duplicate_rows == 0
            && self.constant_variables.is_empty()
            && self.high_cardinality_variables.is_empty()
    }
}

// ── Profile ───────────────────────────────────────────────────────────

/// Complete profile of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub row_count: usize,
    pub column_count: usize,
    pub partition: VariableTypePartition,
    /// Sorted by missing count descending, ties in column order.
    pub missing: Vec<MissingEntry>,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    pub outliers: Vec<OutlierReport>,
    /// Present only with two or more numeric variables.
    pub correlation: Option<CorrelationMatrix>,
    pub quality: QualityIssues,
}

impl Profile {
    /// Numeric summary for `variable`.
    pub fn numeric_summary(&self, variable: &str) -> Option<&NumericSummary> {
        self.numeric.iter().find(|s| s.variable == variable)
    }

    /// Frequency table for `variable`.
    pub fn categorical_summary(&self, variable: &str) -> Option<&CategoricalSummary> {
        self.categorical.iter().find(|s| s.variable == variable)
    }

    /// Outlier report for `variable`.
    pub fn outlier_report(&self, variable: &str) -> Option<&OutlierReport> {
        self.outliers.iter().find(|s| s.variable == variable)
    }

    /// Total missing cells across all variables.
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|m| m.missing_count).sum()
    }
}

// ── Profiling functions ───────────────────────────────────────────────

/// Classifies `ds` and profiles it with the default configuration.
pub fn profile_dataset(ds: &Dataset) -> Result<Profile, ProfileError> {
    let partition = classify(ds);
    profile(ds, &partition, &ProfileConfig::default())
}

/// Profiles a dataset using a partition computed by
/// [`classify`](crate::classify::classify).
///
/// # Errors
///
/// [`ProfileError::InvalidInput`] when the dataset has zero rows, is
/// ragged, repeats a column name, or does not match `partition`. No
/// statistic is computed in that case.
///
/// ```
/// use u_statprofile::classify::classify;
/// use u_statprofile::dataframe::{Column, Dataset};
/// use u_statprofile::profiling::{profile, ProfileConfig};
///
/// let ds = Dataset::from_columns(vec![
///     ("a", Column::numeric_from_options(vec![Some(1.0), Some(1.0)])),
///     ("b", Column::numeric_from_options(vec![Some(1.0), Some(1.0)])),
/// ]).unwrap();
/// let p = profile(&ds, &classify(&ds), &ProfileConfig::default()).unwrap();
/// assert_eq!(p.quality.duplicate_rows, 1);
/// assert_eq!(p.quality.constant_variables, vec!["a", "b"]);
/// ```
#[instrument(skip_all, fields(rows = ds.row_count(), columns = ds.column_count()))]
pub fn profile(
    ds: &Dataset,
    partition: &VariableTypePartition,
    config: &ProfileConfig,
) -> Result<Profile, ProfileError> {
    validate(ds, partition)?;
    let n = ds.row_count();

    let missing = missing_profile(ds);
    debug!(
        incomplete_variables = missing.iter().filter(|m| m.missing_count > 0).count(),
        "missing pass done"
    );

    let numeric_cols: Vec<(&str, &Column)> = columns_of(ds, DataType::Numeric);

    let numeric: Vec<NumericSummary> = numeric_cols
        .iter()
        .map(|&(name, col)| numeric_summary(name, col))
        .collect();
    debug!(variables = numeric.len(), "numeric pass done");

    let categorical: Vec<CategoricalSummary> = ds
        .iter()
        .filter(|(_, col)| is_categorical_like(col))
        .map(|(name, col)| categorical_summary(name, col, config.top_categories))
        .collect();
    debug!(variables = categorical.len(), "categorical pass done");

    let outliers: Vec<OutlierReport> = numeric_cols
        .iter()
        .map(|&(name, col)| outlier_report(name, col, config.outlier_samples))
        .collect();
    debug!(
        flagged = outliers.iter().filter(|o| o.count > 0).count(),
        "outlier pass done"
    );

    let correlation = (numeric_cols.len() >= 2).then(|| correlation_matrix(&numeric_cols));

    let quality = quality_issues(ds, config);
    debug!(
        duplicate_rows = quality.duplicate_rows,
        constant = quality.constant_variables.len(),
        high_cardinality = quality.high_cardinality_variables.len(),
        "quality pass done"
    );

    Ok(Profile {
        row_count: n,
        column_count: ds.column_count(),
        partition: partition.clone(),
        missing,
        numeric,
        categorical,
        outliers,
        correlation,
        quality,
    })
}

/// Checks that `ds` can be profiled against `partition`.
pub fn validate(ds: &Dataset, partition: &VariableTypePartition) -> Result<(), ProfileError> {
    let n = ds.row_count();
    if ds.column_count() > 0 && n == 0 {
        return Err(ProfileError::invalid_input("dataset has zero rows"));
    }
    if ds.column_count() == 0 && !partition.is_empty() {
        return Err(ProfileError::invalid_input(
            "partition names columns the dataset does not have",
        ));
    }

    let mut seen = HashSet::with_capacity(ds.column_count());
    let buckets = partition.bucket_map();
    for (name, col) in ds.iter() {
        if col.len() != n {
            return Err(ProfileError::invalid_input(format!(
                "column '{name}' has {} rows, expected {n}",
                col.len()
            )));
        }
        if !seen.insert(name) {
            return Err(ProfileError::invalid_input(format!(
                "duplicate column name '{name}'"
            )));
        }
        if buckets.get(name) != Some(&col.data_type()) {
            return Err(ProfileError::invalid_input(format!(
                "column '{name}' is not classified as {}",
                col.data_type()
            )));
        }
    }
    if partition.len() != ds.column_count() {
        return Err(ProfileError::invalid_input(
            "partition names columns the dataset does not have",
        ));
    }
    Ok(())
}

// ── Internal passes ───────────────────────────────────────────────────

fn columns_of(ds: &Dataset, ty: DataType) -> Vec<(&str, &Column)> {
    ds.iter().filter(|(_, c)| c.data_type() == ty).collect()
}

fn is_categorical_like(col: &Column) -> bool {
    matches!(col.data_type(), DataType::Categorical | DataType::Text)
}

fn missing_profile(ds: &Dataset) -> Vec<MissingEntry> {
    let n = ds.row_count();
    let mut entries: Vec<MissingEntry> = ds
        .iter()
        .map(|(name, col)| {
            let missing_count = col.null_count();
            MissingEntry {
                variable: name.to_string(),
                missing_count,
                missing_pct: percentage(missing_count, n),
            }
        })
        .collect();
    // stable: ties keep column order
    entries.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));
    entries
}

fn numeric_summary(name: &str, col: &Column) -> NumericSummary {
    let valid = col.valid_numeric_values().unwrap_or_default();
    let sorted = stats::sorted(&valid);

    let min = sorted.first().copied();
    let max = sorted.last().copied();
    let q25 = stats::quantile_sorted(&sorted, 0.25);
    let q75 = stats::quantile_sorted(&sorted, 0.75);
    let lift = |v: Option<f64>| Statistic::from(v).rounded(3);

    NumericSummary {
        variable: name.to_string(),
        n: valid.len(),
        mean: lift(stats::mean(&valid)),
        sd: lift(stats::std_dev(&valid)),
        median: lift(stats::quantile_sorted(&sorted, 0.5)),
        min: lift(min),
        max: lift(max),
        q25: lift(q25),
        q75: lift(q75),
        range: lift(min.zip(max).map(|(lo, hi)| hi - lo)),
        iqr: lift(q25.zip(q75).map(|(lo, hi)| hi - lo)),
    }
}

fn categorical_summary(name: &str, col: &Column, top: usize) -> CategoricalSummary {
    let n = col.len();
    let mut position: HashMap<Option<&str>, usize> = HashMap::new();
    let mut table: Vec<(Option<&str>, usize)> = Vec::new();

    for idx in 0..n {
        let key = col.label_at(idx);
        match position.get(&key) {
            Some(&p) => table[p].1 += 1,
            None => {
                position.insert(key, table.len());
                table.push((key, 1));
            }
        }
    }

    let distinct_count = table.len();
    // stable: ties keep first-encounter order
    table.sort_by(|a, b| b.1.cmp(&a.1));

    let categories = table
        .into_iter()
        .take(top)
        .map(|(key, count)| CategoryCount {
            label: key.map_or(CategoryLabel::Missing, |v| CategoryLabel::Value(v.to_string())),
            count,
            pct: percentage(count, n),
        })
        .collect();

    CategoricalSummary {
        variable: name.to_string(),
        distinct_count,
        categories,
    }
}

fn outlier_report(name: &str, col: &Column, max_samples: usize) -> OutlierReport {
    let (fence, indices, valid_count) = match detect_iqr_outliers(col) {
        Some(d) => (d.fence, d.indices, d.valid_count),
        None => (None, Vec::new(), 0),
    };

    OutlierReport {
        variable: name.to_string(),
        lower: Statistic::from(fence.map(|f| f.lower)),
        upper: Statistic::from(fence.map(|f| f.upper)),
        count: indices.len(),
        pct: percentage(indices.len(), valid_count),
        samples: indices
            .iter()
            .take(max_samples)
            .filter_map(|&i| col.numeric_at(i))
            .collect(),
    }
}

fn correlation_matrix(cols: &[(&str, &Column)]) -> CorrelationMatrix {
    let k = cols.len();
    let mut values = vec![vec![Statistic::Undefined; k]; k];

    for i in 0..k {
        let (_, ci) = cols[i];
        if ci.valid_count() > 0 {
            values[i][i] = Statistic::Defined(1.0);
        }
        for j in (i + 1)..k {
            let (_, cj) = cols[j];
            let (xs, ys): (Vec<f64>, Vec<f64>) = (0..ci.len())
                .filter_map(|r| ci.numeric_at(r).zip(cj.numeric_at(r)))
                .unzip();
            let r = Statistic::from(stats::pearson(&xs, &ys));
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        variables: cols.iter().map(|(n, _)| n.to_string()).collect(),
        values,
    }
}

fn quality_issues(ds: &Dataset, config: &ProfileConfig) -> QualityIssues {
    let n = ds.row_count();
    let constant_variables = ds
        .iter()
        .filter(|(_, col)| col.distinct_count() <= config.constant_max_distinct)
        .map(|(name, _)| name.to_string())
        .collect();

    let limit = config.high_cardinality_ratio * n as f64;
    let high_cardinality_variables = ds
        .iter()
        .filter(|(_, col)| is_categorical_like(col))
        .filter(|(_, col)| col.distinct_count_with_missing() as f64 > limit)
        .map(|(name, _)| name.to_string())
        .collect();

    QualityIssues {
        duplicate_rows: count_duplicate_rows(ds),
        constant_variables,
        high_cardinality_variables,
    }
}

/// Counts rows identical to an earlier row in all columns (missing
/// status included). The first occurrence is not counted.
fn count_duplicate_rows(ds: &Dataset) -> usize {
    let n = ds.row_count();
    if n <= 1 || ds.is_empty() {
        return 0;
    }

    let cols: Vec<&Column> = ds.iter().map(|(_, c)| c).collect();
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(n);
    (0..n)
        .filter(|&row| !seen.insert(cols.iter().map(|c| c.cell_key(row)).collect()))
        .count()
}

// ── Tests ─────────────────────────────────────────────────────────────
