//! # u-statprofile
//!
//! Dataset profiling and statistical test recommendation.
//!
//! u-statprofile inspects an arbitrary rectangular dataset and reports
//! what it contains and which statistical tests fit it. It works in two
//! layers that share one variable-type partition:
//!
//! - **Profiling**: tolerates dirty data, reports missing patterns,
//!   descriptive statistics, frequency tables, outliers, correlation and
//!   structural quality defects
//! - **Advice**: runs normality tests and selects correlation and
//!   comparison tests from the dataset's structure
//!
//! ## Modules
//!
//! - [`dataframe`]: Column-major tabular data model (Dataset, Column, DataType)
//! - [`csv_parser`]: CSV parsing with automatic type inference
//! - [`classify`]: Variable-type partition shared by profiler and advisor
//! - [`stats`]: Descriptive primitives and the `Statistic` undefined marker
//! - [`outlier`]: IQR fence rule
//! - [`profiling`]: Dataset profiling
//! - [`distribution`]: Shapiro-Wilk normality test and subsampling
//! - [`advisor`]: Test recommendation
//! - [`engine`]: Classify once, profile, recommend
//! - [`error`]: Error types
//!
//! ## Quick Start
//!
//! ```
//! use u_statprofile::csv_parser::CsvParser;
//! use u_statprofile::engine::{analyze, AnalysisConfig};
//! use u_statprofile::advisor::StatisticalTest;
//!
//! let csv = "score,group\n12.5,a\n14.1,b\n13.3,a\n15.0,b\n11.8,a\n";
//! let ds = CsvParser::new().parse_str(csv).unwrap();
//! let analysis = analyze(&ds, &AnalysisConfig::default()).unwrap();
//!
//! assert_eq!(analysis.profile.row_count, 5);
//! assert!(analysis.recommendations.recommends(StatisticalTest::MannWhitneyU));
//! ```

pub mod advisor;
pub mod classify;
pub mod csv_parser;
pub mod dataframe;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod outlier;
pub mod profiling;
pub mod stats;

pub use advisor::{recommend, AdvisorConfig, RecommendationSet};
pub use classify::{classify, VariableTypePartition};
pub use dataframe::{Column, DataType, Dataset};
pub use engine::{analyze, Analysis, AnalysisConfig};
pub use error::ProfileError;
pub use profiling::{profile, Profile, ProfileConfig};
pub use stats::Statistic;
