//! CSV loading with per-column type inference.
//!
//! Parses CSV text into a [`Dataset`] whose declared column types are
//! inferred from content, in priority order
//! Numeric → Boolean → DateTime → Categorical → Text.
//!
//! - RFC 4180 quoting (quoted fields, `""` escapes, embedded delimiters and newlines)
//! - Null markers: empty, `NA`, `N/A`, `null`, `NULL`, `None`, `.`, `NaN`, `#N/A`
//! - ISO-8601 dates (`2024-03-01`) and date-times (`2024-03-01T08:30:00`,
//!   `2024-03-01 08:30:00`)
//! - Strings with a unique-value ratio below 0.5 are dictionary-encoded
//!   as Categorical
//!
//! ```
//! use u_statprofile::csv_parser::CsvParser;
//! use u_statprofile::dataframe::DataType;
//!
//! let csv = "name,value,active,seen\nAlice,1.5,true,2024-01-02\nBob,2.3,false,2024-01-03\n";
//! let ds = CsvParser::new().parse_str(csv).unwrap();
//! assert_eq!(ds.row_count(), 2);
//! assert_eq!(
//!     ds.schema(),
//!     vec![
//!         ("name", DataType::Text),
//!         ("value", DataType::Numeric),
//!         ("active", DataType::Boolean),
//!         ("seen", DataType::DateTime),
//!     ]
//! );
//! ```

use crate::dataframe::{Column, DataType, Dataset, ValidityBitmap};
use crate::error::ProfileError;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};

const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "null", "NULL", "None", "none", ".", "NaN", "nan", "NAN",
    "#N/A", "#NA",
];

/// Unique-value ratio below which strings become Categorical.
const CATEGORICAL_THRESHOLD: f64 = 0.5;

/// Dictionary size ceiling for Categorical columns.
const MAX_CATEGORICAL_UNIQUE: usize = 1000;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// CSV parser configuration and entry point.
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
    has_header: bool,
    null_markers: HashSet<String>,
}

impl CsvParser {
    /// Comma delimiter, header row, standard null markers.
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            null_markers: DEFAULT_NULL_MARKERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Sets the field delimiter.
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Sets whether the first record is a header.
    pub fn has_header(mut self, header: bool) -> Self {
        self.has_header = header;
        self
    }

    /// Replaces the null markers.
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers.into_iter().collect();
        self
    }

    /// Parses CSV text into a dataset.
    ///
    /// Empty input yields an empty dataset. A header without records
    /// yields one zero-row column per header name, which profiling
    /// rejects.
    ///
    /// # Errors
    ///
    /// [`ProfileError::CsvParse`] for a record whose field count differs
    /// from the header.
    pub fn parse_str(&self, input: &str) -> Result<Dataset, ProfileError> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let records = self.split_records(input);

        let (headers, body, first_line) = match (self.has_header, records.split_first()) {
            (_, None) => return Ok(Dataset::new()),
            (true, Some((head, rest))) => (head.clone(), rest, 2),
            (false, Some((head, _))) => {
                let names = (0..head.len()).map(|i| format!("col_{i}")).collect();
                (names, records.as_slice(), 1)
            }
        };
        let width = headers.len();
        let mut raw_columns: Vec<Vec<&str>> = vec![Vec::with_capacity(body.len()); width];
        for (offset, record) in body.iter().enumerate() {
            if record.len() != width {
                return Err(ProfileError::CsvParse {
                    line: first_line + offset,
                    message: format!("expected {width} fields, got {}", record.len()),
                });
            }
            for (col, field) in record.iter().enumerate() {
                raw_columns[col].push(field.trim());
            }
        }

        let mut ds = Dataset::new();
        for (name, raw) in headers.into_iter().zip(&raw_columns) {
            ds.add_column(name, self.build_column(raw))?;
        }
        Ok(ds)
    }

    // ── Record splitting ─────────────────────────────────────────

    /// Splits text into records of raw fields. Blank records before the
    /// first data record and at the end are dropped.
    fn split_records(&self, input: &str) -> Vec<Vec<String>> {
        let delim = self.delimiter as char;
        let mut records: Vec<Vec<String>> = Vec::new();
        let mut record: Vec<String> = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ if in_quotes => field.push(c),
                '"' if field.is_empty() => in_quotes = true,
                c if c == delim => record.push(std::mem::take(&mut field)),
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' | '\r' => {
                    record.push(std::mem::take(&mut field));
                    end_record(&mut record, &mut records);
                }
                _ => field.push(c),
            }
        }
        if !field.is_empty() || !record.is_empty() {
            record.push(field);
            records.push(record);
        }

        while records
            .last()
            .is_some_and(|r| r.iter().all(String::is_empty))
        {
            records.pop();
        }
        records
    }

    // ── Type inference ───────────────────────────────────────────

    fn is_null(&self, value: &str) -> bool {
        self.null_markers.contains(value)
    }

    fn build_column(&self, raw: &[&str]) -> Column {
        let cells: Vec<Option<&str>> = raw
            .iter()
            .map(|&v| (!self.is_null(v)).then_some(v))
            .collect();

        match infer_type(&cells) {
            DataType::Numeric => {
                Column::numeric_from_options(map_cells(&cells, |v| v.parse::<f64>().ok()))
            }
            DataType::Boolean => Column::boolean_from_options(map_cells(&cells, parse_boolean)),
            DataType::DateTime => Column::datetime_from_options(map_cells(&cells, parse_datetime)),
            DataType::Categorical => build_categorical(&cells),
            DataType::Text => Column::text_from_options(cells),
        }
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helper functions ──────────────────────────────────────────────────

/// Most specific type that fits every non-null cell. All-null columns
/// are Numeric.
fn infer_type(cells: &[Option<&str>]) -> DataType {
    let present: Vec<&str> = cells.iter().flatten().copied().collect();
    if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        return DataType::Numeric;
    }
    if present.iter().all(|s| parse_boolean(s).is_some()) {
        return DataType::Boolean;
    }
    if present.iter().all(|s| parse_datetime(s).is_some()) {
        return DataType::DateTime;
    }

    let unique: HashSet<&str> = present.iter().copied().collect();
    let ratio = unique.len() as f64 / present.len() as f64;
    if ratio < CATEGORICAL_THRESHOLD && unique.len() <= MAX_CATEGORICAL_UNIQUE {
        DataType::Categorical
    } else {
        DataType::Text
    }
}

fn end_record(record: &mut Vec<String>, records: &mut Vec<Vec<String>>) {
    let blank = record.iter().all(String::is_empty);
    if !blank || !records.is_empty() {
        records.push(std::mem::take(record));
    } else {
        record.clear();
    }
}

fn map_cells<T>(cells: &[Option<&str>], parse: impl Fn(&str) -> Option<T>) -> Vec<Option<T>> {
    cells.iter().map(|c| c.and_then(&parse)).collect()
}

fn build_categorical(cells: &[Option<&str>]) -> Column {
    let mut lookup: HashMap<&str, u32> = HashMap::new();
    let mut dictionary: Vec<String> = Vec::new();
    let mut indices = Vec::with_capacity(cells.len());
    let mut validity = ValidityBitmap::empty();

    for cell in cells {
        match cell {
            Some(v) => {
                let idx = *lookup.entry(*v).or_insert_with(|| {
                    dictionary.push((*v).to_string());
                    (dictionary.len() - 1) as u32
                });
                indices.push(idx);
                validity.push(true);
            }
            None => {
                indices.push(0);
                validity.push(false);
            }
        }
    }

    Column::categorical(dictionary, indices, validity)
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "t" | "y" => Some(true),
        "false" | "no" | "f" | "n" => Some(false),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Basic parsing ────────────────────────────────────────────

    #[test]
    fn parse_simple_csv() {
        let ds = CsvParser::new().parse_str("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_names(), &["a", "b", "c"]);
    }

    #[test]
    fn parse_mixed_types() {
        let csv = "id,value,active,category\n1,10.5,true,A\n2,20.3,false,B\n3,30.1,true,A\n4,40.0,false,B\n5,50.5,true,A\n";
        let ds = CsvParser::new().parse_str(csv).unwrap();
        let types: Vec<DataType> = ds.schema().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            types,
            vec![
                DataType::Numeric,
                DataType::Numeric,
                DataType::Boolean,
                DataType::Categorical
            ]
        );
        let active = ds.column_by_name("active").unwrap();
        let expected = [true, false, true, false, true].map(Some).to_vec();
        assert_eq!(active, &Column::boolean_from_options(expected));
    }

    #[test]
    fn categorical_dictionary_in_first_encounter_order() {
        // 3 unique / 7 rows < 0.5
        let ds = CsvParser::new()
            .parse_str("status\nB\nA\nC\nA\nB\nA\nC\n")
            .unwrap();
        let status = ds.column_by_name("status").unwrap();
        assert_eq!(status.data_type(), DataType::Categorical);
        assert_eq!(status.category_at(0), Some("B"));
        assert_eq!(status.category_at(3), Some("A"));
        if let Column::Categorical { dictionary, .. } = status {
            assert_eq!(dictionary, &["B", "A", "C"]);
        }
    }

    #[test]
    fn categorical_threshold_is_strict() {
        // 2 unique / 4 rows = 0.5 → Text
        let ds = CsvParser::new().parse_str("x\nA\nB\nA\nB\n").unwrap();
        assert_eq!(ds.column(0).unwrap().data_type(), DataType::Text);
        // 2 unique / 5 rows = 0.4 → Categorical
        let ds = CsvParser::new().parse_str("x\nA\nB\nA\nB\nA\n").unwrap();
        assert_eq!(ds.column(0).unwrap().data_type(), DataType::Categorical);
    }

    #[test]
    fn single_non_numeric_demotes() {
        let ds = CsvParser::new().parse_str("x\n1\n2\nthree\n4\n").unwrap();
        assert_ne!(ds.column(0).unwrap().data_type(), DataType::Numeric);
    }

    // ── Date/time inference ──────────────────────────────────────

    #[test]
    fn iso_dates_and_datetimes() {
        let csv = "d,ts\n2024-03-01,2024-03-01T08:30:00\nNA,2024-03-02 09:15:30.250\n";
        let ds = CsvParser::new().parse_str(csv).unwrap();
        let d = ds.column_by_name("d").unwrap();
        assert_eq!(d.data_type(), DataType::DateTime);
        assert_eq!(d.null_count(), 1);
        assert_eq!(
            d.datetime_at(0),
            NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        let ts = ds.column_by_name("ts").unwrap();
        assert_eq!(ts.data_type(), DataType::DateTime);
        assert_eq!(
            ts.datetime_at(1),
            NaiveDate::from_ymd_opt(2024, 3, 2).and_then(|d| d.and_hms_milli_opt(9, 15, 30, 250))
        );
    }

    #[test]
    fn invalid_date_falls_back_to_strings() {
        let ds = CsvParser::new()
            .parse_str("d\n2024-02-30\n2024-01-01\n")
            .unwrap();
        assert_eq!(ds.column(0).unwrap().data_type(), DataType::Text);
    }

    // ── Null handling ────────────────────────────────────────────

    #[test]
    fn null_markers_recognized() {
        let ds = CsvParser::new()
            .parse_str("x\n1.0\nNA\n3.0\n\n5.0\nnull\nNaN\n")
            .unwrap();
        let x = ds.column(0).unwrap();
        assert_eq!(x.data_type(), DataType::Numeric);
        assert_eq!(x.null_count(), 4);
        assert!(x.is_valid(0));
        assert!(!x.is_valid(1));
        assert!(!x.is_valid(3));
    }

    #[test]
    fn all_null_column_is_numeric() {
        let ds = CsvParser::new().parse_str("x,y\nNA,1\n,2\nnull,3\n").unwrap();
        let x = ds.column(0).unwrap();
        assert_eq!(x.data_type(), DataType::Numeric);
        assert_eq!(x.valid_count(), 0);
    }

    #[test]
    fn custom_null_markers() {
        let ds = CsvParser::new()
            .null_markers(vec!["-999".to_string()])
            .parse_str("x\n1.0\n-999\n3.0\n")
            .unwrap();
        let x = ds.column(0).unwrap();
        assert_eq!(x.null_count(), 1);
        assert_eq!(x.numeric_at(2), Some(3.0));
    }

    // ── Quoting and layout ───────────────────────────────────────

    #[test]
    fn quoted_fields() {
        let csv = "name,desc\nAlice,\"hello, world\"\nBob,\"she said \"\"hi\"\"\"\n";
        let ds = CsvParser::new().parse_str(csv).unwrap();
        let desc = ds.column_by_name("desc").unwrap();
        assert_eq!(desc.text_at(0), Some("hello, world"));
        assert_eq!(desc.text_at(1), Some("she said \"hi\""));
    }

    #[test]
    fn quoted_newlines() {
        let csv = "name,note\nAlice,\"line1\nline2\"\nBob,simple\n";
        let ds = CsvParser::new().parse_str(csv).unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column(1).unwrap().text_at(0), Some("line1\nline2"));
    }

    #[test]
    fn crlf_bom_and_no_trailing_newline() {
        let ds = CsvParser::new().parse_str("\u{feff}a,b\r\n1,2\r\n3,4").unwrap();
        assert_eq!(ds.column_names(), &["a", "b"]);
        assert_eq!(ds.column(0).unwrap().valid_numeric_values().unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn empty_and_header_only() {
        assert_eq!(CsvParser::new().parse_str("").unwrap().column_count(), 0);
        let ds = CsvParser::new().parse_str("a,b,c\n").unwrap();
        assert_eq!((ds.row_count(), ds.column_count()), (0, 3));
        assert_eq!(ds.column_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn ragged_record_reports_line() {
        let err = CsvParser::new().parse_str("a,b\n1,2\n3\n").unwrap_err();
        assert_eq!(
            err,
            ProfileError::CsvParse {
                line: 3,
                message: "expected 2 fields, got 1".into()
            }
        );
    }

    #[test]
    fn headerless_and_custom_delimiter() {
        let ds = CsvParser::new()
            .has_header(false)
            .delimiter(b';')
            .parse_str("1;2\n3;4\n")
            .unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_names(), &["col_0", "col_1"]);
    }

    #[test]
    fn whitespace_trimmed_before_inference() {
        let ds = CsvParser::new().parse_str("x\n  1.5  \n  2.3  \n").unwrap();
        assert_eq!(ds.column(0).unwrap().valid_numeric_values().unwrap(), vec![1.5, 2.3]);
    }
}
