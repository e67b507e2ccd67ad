//! Variable-type classification.
//!
//! Every column lands in exactly one bucket, decided by its declared
//! [`DataType`]. Both the profiler and the advisor consume the same
//! [`VariableTypePartition`] value, so the buckets cannot diverge
//! between them.
//!
//! ```
//! use u_statprofile::classify::classify;
//! use u_statprofile::dataframe::{Column, Dataset};
//!
//! let ds = Dataset::from_columns(vec![
//!     ("age", Column::numeric_from_options(vec![Some(31.0), Some(45.0)])),
//!     ("city", Column::categorical_from_options(vec![Some("Oslo"), Some("Rome")])),
//! ]).unwrap();
//! let partition = classify(&ds);
//! assert_eq!(partition.numeric, vec!["age"]);
//! assert_eq!(partition.categorical, vec!["city"]);
//! ```

use crate::dataframe::{DataType, Dataset};
use serde::Serialize;
use std::collections::HashMap;

/// Disjoint partition of column names by declared type, each list in
/// column declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableTypePartition {
    pub numeric: Vec<String>,
    pub text: Vec<String>,
    pub categorical: Vec<String>,
    pub boolean: Vec<String>,
    pub datetime: Vec<String>,
}

impl VariableTypePartition {
    /// Categorical and text variables together, in declaration order of
    /// each bucket. These are the variables with frequency tables.
    pub fn categorical_like(&self) -> impl Iterator<Item = &str> {
        self.categorical
            .iter()
            .chain(self.text.iter())
            .map(String::as_str)
    }

    /// Number of categorical and text variables.
    pub fn categorical_like_count(&self) -> usize {
        self.categorical.len() + self.text.len()
    }

    /// Total number of classified variables.
    pub fn len(&self) -> usize {
        self.numeric.len()
            + self.text.len()
            + self.categorical.len()
            + self.boolean.len()
            + self.datetime.len()
    }

    /// Returns `true` if no variable was classified.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps every classified name to its bucket.
    pub fn bucket_map(&self) -> HashMap<&str, DataType> {
        let mut map = HashMap::with_capacity(self.len());
        for (names, ty) in [
            (&self.numeric, DataType::Numeric),
            (&self.text, DataType::Text),
            (&self.categorical, DataType::Categorical),
            (&self.boolean, DataType::Boolean),
            (&self.datetime, DataType::DateTime),
        ] {
            for name in names {
                map.insert(name.as_str(), ty);
            }
        }
        map
    }
}

/// Classifies every column of `ds` by its declared type.
pub fn classify(ds: &Dataset) -> VariableTypePartition {
    let mut partition = VariableTypePartition::default();
    for (name, col) in ds.iter() {
        let bucket = match col.data_type() {
            DataType::Numeric => &mut partition.numeric,
            DataType::Text => &mut partition.text,
            DataType::Categorical => &mut partition.categorical,
            DataType::Boolean => &mut partition.boolean,
            DataType::DateTime => &mut partition.datetime,
        };
        bucket.push(name.to_string());
    }
    partition
}
