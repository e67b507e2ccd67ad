//! Column-major dataset for tabular data.
//!
//! The [`Dataset`] stores data in column-major order with typed columns
//! and a compact validity bitmap for tracking missing values.
//!
//! # Column Types
//!
//! | Type | Storage | Use case |
//! |------|---------|----------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | Continuous/integer values |
//! | [`Boolean`](Column::Boolean) | `Vec<bool>` + bitmap | True/false values |
//! | [`Categorical`](Column::Categorical) | Dictionary + `Vec<u32>` | Factor-like strings |
//! | [`Text`](Column::Text) | `Vec<String>` + bitmap | Free-form strings |
//! | [`DateTime`](Column::DateTime) | `Vec<i64>` (epoch ms) + bitmap | Dates and timestamps |
//!
//! # Example
//!
//! ```
//! use u_statprofile::dataframe::{Column, Dataset, ValidityBitmap};
//!
//! let mut ds = Dataset::new();
//! ds.add_column(
//!     "temperature".to_string(),
//!     Column::numeric(vec![20.5, 21.3, 19.8], ValidityBitmap::all_valid(3)),
//! ).unwrap();
//! assert_eq!(ds.row_count(), 3);
//! assert_eq!(ds.column_count(), 1);
//! ```

use crate::error::ProfileError;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── ValidityBitmap ────────────────────────────────────────────────────

/// Bit-packed validity bitmap using `Vec<u64>`.
///
/// Each bit indicates whether the corresponding row is valid (1) or
/// missing (0).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl ValidityBitmap {
    /// Creates a bitmap where all `len` positions are valid.
    pub fn all_valid(len: usize) -> Self {
        let n_words = len.div_ceil(64);
        let mut bits = vec![u64::MAX; n_words];
        let trailing = len % 64;
        if trailing != 0 && n_words > 0 {
            bits[n_words - 1] = (1u64 << trailing) - 1;
        }
        Self { bits, len }
    }

    /// Creates an empty bitmap with no rows.
    pub fn empty() -> Self {
        Self {
            bits: Vec::new(),
            len: 0,
        }
    }

    /// Builds a bitmap from per-row validity flags.
    pub fn from_flags(flags: impl IntoIterator<Item = bool>) -> Self {
        let mut bm = Self::empty();
        for valid in flags {
            bm.push(valid);
        }
        bm
    }

    /// Returns `true` if the value at `idx` is valid (not missing).
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        let (word, bit) = (idx / 64, idx % 64);
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Appends a new position (valid or missing).
    pub fn push(&mut self, valid: bool) {
        let idx = self.len;
        self.len += 1;
        let (word, bit) = (idx / 64, idx % 64);
        if word >= self.bits.len() {
            self.bits.push(0);
        }
        if valid {
            self.bits[word] |= 1u64 << bit;
        }
    }

    /// Returns the total number of tracked positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bitmap tracks zero positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts the number of missing positions.
    pub fn null_count(&self) -> usize {
        let valid_count: usize = self.bits.iter().map(|w| w.count_ones() as usize).sum();
        self.len - valid_count
    }

    /// Counts the number of valid positions.
    pub fn valid_count(&self) -> usize {
        self.len - self.null_count()
    }

    /// Returns an iterator over indices of valid positions.
    pub fn valid_indices(&self) -> ValidIndicesIter<'_> {
        ValidIndicesIter {
            bitmap: self,
            current: 0,
        }
    }
}

/// Iterator over valid indices in a [`ValidityBitmap`].
pub struct ValidIndicesIter<'a> {
    bitmap: &'a ValidityBitmap,
    current: usize,
}

impl Iterator for ValidIndicesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current < self.bitmap.len {
            let idx = self.current;
            self.current += 1;
            if self.bitmap.is_valid(idx) {
                return Some(idx);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bitmap.len - self.current))
    }
}

// ── DataType ──────────────────────────────────────────────────────────

/// Declared type of a column. Drives variable classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Continuous or integer numeric values (stored as `f64`).
    Numeric,
    /// Boolean (true/false) values.
    Boolean,
    /// Factor-like strings (dictionary-encoded).
    Categorical,
    /// Free-form text.
    Text,
    /// Dates and timestamps.
    DateTime,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Categorical => write!(f, "Categorical"),
            Self::Text => write!(f, "Text"),
            Self::DateTime => write!(f, "DateTime"),
        }
    }
}

// ── Cell keys ─────────────────────────────────────────────────────────

/// Hashable view of one cell, used for distinct counting and row
/// duplicate detection. Missing cells compare equal to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKey<'a> {
    Missing,
    Number(u64),
    Bool(bool),
    Str(&'a str),
    Time(i64),
}

/// Bit pattern of a float with `-0.0` folded onto `0.0`.
fn number_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column with validity bitmap for missing values.
///
/// Missing positions hold a placeholder value (0.0, false, empty string,
/// index 0 or 0 ms) that must be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Dense `f64` values.
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    /// Boolean values.
    Boolean {
        values: Vec<bool>,
        validity: ValidityBitmap,
    },
    /// Dictionary-encoded categorical column.
    ///
    /// `indices` maps each row to a `dictionary` entry.
    Categorical {
        dictionary: Vec<String>,
        indices: Vec<u32>,
        validity: ValidityBitmap,
    },
    /// Free-form text column.
    Text {
        values: Vec<String>,
        validity: ValidityBitmap,
    },
    /// Timestamps as milliseconds since the Unix epoch (UTC).
    DateTime {
        values: Vec<i64>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column. Non-finite values (NaN, ±∞) are
    /// marked missing.
    ///
    /// ```
    /// use u_statprofile::dataframe::{Column, ValidityBitmap};
    ///
    /// let col = Column::numeric(vec![1.0, f64::INFINITY, 3.0], ValidityBitmap::all_valid(3));
    /// assert_eq!(col.null_count(), 1);
    /// assert_eq!(col.numeric_at(1), None);
    /// ```
    pub fn numeric(values: Vec<f64>, validity: ValidityBitmap) -> Self {
        let validity = if values.iter().all(|v| v.is_finite()) {
            validity
        } else {
            ValidityBitmap::from_flags((0..validity.len()).map(|i| {
                validity.is_valid(i) && values.get(i).is_some_and(|v| v.is_finite())
            }))
        };
        Self::Numeric { values, validity }
    }

    /// Creates a boolean column.
    pub fn boolean(values: Vec<bool>, validity: ValidityBitmap) -> Self {
        Self::Boolean { values, validity }
    }

    /// Creates a categorical column from a dictionary and indices.
    pub fn categorical(
        dictionary: Vec<String>,
        indices: Vec<u32>,
        validity: ValidityBitmap,
    ) -> Self {
        Self::Categorical {
            dictionary,
            indices,
            validity,
        }
    }

    /// Creates a text column.
    pub fn text(values: Vec<String>, validity: ValidityBitmap) -> Self {
        Self::Text { values, validity }
    }

    /// Creates a date/time column from epoch milliseconds.
    pub fn datetime(values: Vec<i64>, validity: ValidityBitmap) -> Self {
        Self::DateTime { values, validity }
    }

    /// Creates a numeric column from optional values. `None` and
    /// non-finite values become missing.
    ///
    /// ```
    /// use u_statprofile::dataframe::Column;
    ///
    /// let col = Column::numeric_from_options(vec![Some(1.0), None, Some(f64::NAN)]);
    /// assert_eq!(col.null_count(), 2);
    /// ```
    pub fn numeric_from_options(values: Vec<Option<f64>>) -> Self {
        let values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        let validity = ValidityBitmap::from_flags(values.iter().map(Option::is_some));
        let values = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        Self::Numeric { values, validity }
    }

    /// Creates a boolean column from optional values.
    pub fn boolean_from_options(values: Vec<Option<bool>>) -> Self {
        let validity = ValidityBitmap::from_flags(values.iter().map(Option::is_some));
        let values = values.into_iter().map(|v| v.unwrap_or(false)).collect();
        Self::Boolean { values, validity }
    }

    /// Creates a categorical column from optional labels. The dictionary
    /// is built in first-encounter order.
    ///
    /// ```
    /// use u_statprofile::dataframe::Column;
    ///
    /// let col = Column::categorical_from_options(vec![Some("b"), Some("a"), None, Some("b")]);
    /// assert_eq!(col.category_at(0), Some("b"));
    /// assert_eq!(col.category_at(2), None);
    /// ```
    pub fn categorical_from_options<S: AsRef<str>>(values: Vec<Option<S>>) -> Self {
        let mut dict_map: HashMap<String, u32> = HashMap::new();
        let mut dictionary: Vec<String> = Vec::new();
        let mut indices = Vec::with_capacity(values.len());
        let mut validity = ValidityBitmap::empty();
        for v in &values {
            match v {
                Some(label) => {
                    let label = label.as_ref();
                    let idx = if let Some(&existing) = dict_map.get(label) {
                        existing
                    } else {
                        let idx = dictionary.len() as u32;
                        dictionary.push(label.to_string());
                        dict_map.insert(label.to_string(), idx);
                        idx
                    };
                    indices.push(idx);
                    validity.push(true);
                }
                None => {
                    indices.push(0);
                    validity.push(false);
                }
            }
        }
        Self::Categorical {
            dictionary,
            indices,
            validity,
        }
    }

    /// Creates a text column from optional strings.
    pub fn text_from_options<S: Into<String>>(values: Vec<Option<S>>) -> Self {
        let mut validity = ValidityBitmap::empty();
        let values = values
            .into_iter()
            .map(|v| {
                validity.push(v.is_some());
                v.map(Into::into).unwrap_or_default()
            })
            .collect();
        Self::Text { values, validity }
    }

    /// Creates a date/time column from optional timestamps.
    pub fn datetime_from_options(values: Vec<Option<NaiveDateTime>>) -> Self {
        let validity = ValidityBitmap::from_flags(values.iter().map(Option::is_some));
        let values = values
            .into_iter()
            .map(|v| v.map_or(0, |t| t.and_utc().timestamp_millis()))
            .collect();
        Self::DateTime { values, validity }
    }

    /// Returns the declared data type of this column.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric { .. } => DataType::Numeric,
            Self::Boolean { .. } => DataType::Boolean,
            Self::Categorical { .. } => DataType::Categorical,
            Self::Text { .. } => DataType::Text,
            Self::DateTime { .. } => DataType::DateTime,
        }
    }

    /// Returns the number of rows in this column.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Boolean { validity, .. }
            | Self::Categorical { validity, .. }
            | Self::Text { validity, .. }
            | Self::DateTime { validity, .. } => validity,
        }
    }

    /// Returns the number of missing values.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Returns the number of valid (non-missing) values.
    pub fn valid_count(&self) -> usize {
        self.validity().valid_count()
    }

    /// Checks that the payload covers every row of the validity bitmap
    /// and that valid categorical codes point into the dictionary.
    ///
    /// ```
    /// use u_statprofile::dataframe::{Column, ValidityBitmap};
    ///
    /// let ragged = Column::text(vec!["a".into()], ValidityBitmap::all_valid(2));
    /// assert!(ragged.check_layout().is_err());
    /// ```
    pub fn check_layout(&self) -> Result<(), ProfileError> {
        let rows = self.len();
        let payload = match self {
            Self::Numeric { values, .. } => values.len(),
            Self::Boolean { values, .. } => values.len(),
            Self::Text { values, .. } => values.len(),
            Self::DateTime { values, .. } => values.len(),
            Self::Categorical {
                dictionary,
                indices,
                validity,
            } => {
                let dangling = validity.valid_indices().find(|&i| {
                    indices
                        .get(i)
                        .is_some_and(|&code| code as usize >= dictionary.len())
                });
                if let Some(row) = dangling {
                    return Err(ProfileError::invalid_input(format!(
                        "row {row} refers to category {} of a {}-entry dictionary",
                        indices[row],
                        dictionary.len()
                    )));
                }
                indices.len()
            }
        };
        if payload != rows {
            return Err(ProfileError::invalid_input(format!(
                "column holds {payload} values for {rows} rows"
            )));
        }
        Ok(())
    }

    /// Returns `true` if the value at `idx` is valid (not missing).
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().is_valid(idx)
    }

    /// Returns valid numeric values (missing excluded) in row order.
    pub fn valid_numeric_values(&self) -> Option<Vec<f64>> {
        match self {
            Self::Numeric { values, validity } => {
                Some(validity.valid_indices().map(|i| values[i]).collect())
            }
            _ => None,
        }
    }

    /// Returns the numeric value at `idx`, `None` if missing or not numeric.
    pub fn numeric_at(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Numeric { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Returns the category string for a given row index in a categorical column.
    pub fn category_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Categorical {
                dictionary,
                indices,
                validity,
            } if validity.is_valid(idx) => {
                dictionary.get(indices[idx] as usize).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Returns the text value for a given row index in a text column.
    pub fn text_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Text { values, validity } if validity.is_valid(idx) => Some(&values[idx]),
            _ => None,
        }
    }

    /// Returns the string label at `idx` for categorical and text columns.
    pub fn label_at(&self, idx: usize) -> Option<&str> {
        self.category_at(idx).or_else(|| self.text_at(idx))
    }

    /// Returns the timestamp at `idx` in a date/time column.
    pub fn datetime_at(&self, idx: usize) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime { values, validity } if validity.is_valid(idx) => {
                DateTime::from_timestamp_millis(values[idx]).map(|t| t.naive_utc())
            }
            _ => None,
        }
    }

    /// Returns the hashable key of the cell at `idx`.
    pub fn cell_key(&self, idx: usize) -> CellKey<'_> {
        if !self.is_valid(idx) {
            return CellKey::Missing;
        }
        match self {
            Self::Numeric { values, .. } => CellKey::Number(number_bits(values[idx])),
            Self::Boolean { values, .. } => CellKey::Bool(values[idx]),
            Self::Categorical {
                dictionary,
                indices,
                ..
            } => CellKey::Str(
                dictionary
                    .get(indices[idx] as usize)
                    .map_or("", String::as_str),
            ),
            Self::Text { values, .. } => CellKey::Str(&values[idx]),
            Self::DateTime { values, .. } => CellKey::Time(values[idx]),
        }
    }

    /// Number of distinct non-missing values.
    ///
    /// ```
    /// use u_statprofile::dataframe::Column;
    ///
    /// let col = Column::numeric_from_options(vec![Some(1.0), Some(1.0), None, Some(2.0)]);
    /// assert_eq!(col.distinct_count(), 2);
    /// ```
    pub fn distinct_count(&self) -> usize {
        let distinct: HashSet<CellKey<'_>> = self
            .validity()
            .valid_indices()
            .map(|i| self.cell_key(i))
            .collect();
        distinct.len()
    }

    /// Number of distinct values, counting missing as one extra level
    /// when any value is missing.
    pub fn distinct_count_with_missing(&self) -> usize {
        self.distinct_count() + usize::from(self.null_count() > 0)
    }
}

// ── Dataset ───────────────────────────────────────────────────────────

/// Column-major tabular data structure.
///
/// Stores named columns of typed data. All columns must have the same
/// number of rows; [`add_column`](Dataset::add_column) rejects ragged input.
///
/// ```
/// use u_statprofile::dataframe::{Column, Dataset, ValidityBitmap};
///
/// let mut ds = Dataset::new();
/// ds.add_column(
///     "x".to_string(),
///     Column::numeric(vec![1.0, 2.0, 3.0], ValidityBitmap::all_valid(3)),
/// ).unwrap();
/// ds.add_column(
///     "label".to_string(),
///     Column::text(
///         vec!["a".into(), "b".into(), "c".into()],
///         ValidityBitmap::all_valid(3),
///     ),
/// ).unwrap();
/// assert_eq!(ds.row_count(), 3);
/// assert_eq!(ds.column_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Creates an empty dataset with no columns or rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from `(name, column)` pairs.
    ///
    /// ```
    /// use u_statprofile::dataframe::{Column, Dataset};
    ///
    /// let ds = Dataset::from_columns(vec![
    ///     ("x", Column::numeric_from_options(vec![Some(1.0), Some(2.0)])),
    ///     ("y", Column::categorical_from_options(vec![Some("a"), None])),
    /// ]).unwrap();
    /// assert_eq!(ds.row_count(), 2);
    /// ```
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Column)>,
    ) -> Result<Self, ProfileError> {
        let mut ds = Self::new();
        for (name, column) in columns {
            ds.add_column(name.into(), column)?;
        }
        Ok(ds)
    }

    /// Adds a named column.
    ///
    /// # Errors
    ///
    /// [`ProfileError::InvalidInput`] when the column's payload does not
    /// match its validity bitmap, [`ProfileError::DimensionMismatch`]
    /// when its length differs from the existing row count.
    pub fn add_column(&mut self, name: String, column: Column) -> Result<(), ProfileError> {
        column.check_layout().map_err(|e| match e {
            ProfileError::InvalidInput { reason } => {
                ProfileError::invalid_input(format!("column '{name}': {reason}"))
            }
            other => other,
        })?;
        let col_len = column.len();
        if self.columns.is_empty() {
            self.row_count = col_len;
        } else if col_len != self.row_count {
            return Err(ProfileError::DimensionMismatch {
                expected: self.row_count,
                actual: col_len,
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the dataset has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names in declaration order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns a reference to the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns a reference to the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Returns the index of the column with the given `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns an iterator over (name, column) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Returns the declared type of every column.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.iter().map(|(name, col)| (name, col.data_type())).collect()
    }

    fn row_has_missing(&self, idx: usize) -> bool {
        self.columns.iter().any(|c| !c.is_valid(idx))
    }

    /// Number of rows with at least one missing cell.
    pub fn incomplete_row_count(&self) -> usize {
        (0..self.row_count)
            .filter(|&i| self.row_has_missing(i))
            .count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
