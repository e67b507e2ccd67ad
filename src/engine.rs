//! One-call profiling and recommendation.
//!
//! [`analyze`] classifies the dataset once and hands the same partition
//! to both the profiler and the advisor.
//!
//! ```
//! use u_statprofile::csv_parser::CsvParser;
//! use u_statprofile::engine::{analyze, AnalysisConfig};
//!
//! let csv = "x,y\n1,a\n2,a\n3,b\n4,b\n100,a\n";
//! let ds = CsvParser::new().parse_str(csv).unwrap();
//! let analysis = analyze(&ds, &AnalysisConfig::default()).unwrap();
//!
//! assert_eq!(analysis.partition.numeric, vec!["x"]);
//! assert_eq!(analysis.profile.partition, analysis.partition);
//! ```

use crate::advisor::{self, AdvisorConfig, RecommendationSet};
use crate::classify::{classify, VariableTypePartition};
use crate::dataframe::Dataset;
use crate::error::ProfileError;
use crate::profiling::{self, Profile, ProfileConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Combined profiler and advisor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub profile: ProfileConfig,
    pub advisor: AdvisorConfig,
}

/// Profile and recommendations computed from one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub partition: VariableTypePartition,
    pub profile: Profile,
    pub recommendations: RecommendationSet,
}

/// Profiles `ds` and recommends tests for it.
///
/// # Errors
///
/// [`ProfileError::InvalidInput`] from profiling; the advisor is not run
/// in that case.
#[instrument(skip_all, fields(rows = ds.row_count(), columns = ds.column_count()))]
pub fn analyze(ds: &Dataset, config: &AnalysisConfig) -> Result<Analysis, ProfileError> {
    let partition = classify(ds);
    let profile = profiling::profile(ds, &partition, &config.profile)?;
    let recommendations = advisor::recommend(ds, &partition, &config.advisor);

    info!(
        quality_issues = profile.quality.issues().len(),
        normality_tests = recommendations.normality_tests.len(),
        comparison_tests = recommendations.comparison_tests.len(),
        "analysis complete"
    );

    Ok(Analysis {
        partition,
        profile,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{GeneralRecommendation, StatisticalTest};
    use crate::dataframe::Column;
    use crate::stats::Statistic;

    fn seeded() -> AnalysisConfig {
        AnalysisConfig {
            advisor: AdvisorConfig::default().seed(17),
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn end_to_end_example() {
        let ds = Dataset::from_columns(vec![
            (
                "x",
                Column::numeric_from_options(vec![
                    Some(1.0),
                    Some(2.0),
                    Some(3.0),
                    Some(4.0),
                    Some(100.0),
                ]),
            ),
            (
                "y",
                Column::categorical_from_options(vec![
                    Some("a"),
                    Some("a"),
                    Some("b"),
                    Some("b"),
                    Some("a"),
                ]),
            ),
        ])
        .unwrap();

        let a = analyze(&ds, &seeded()).unwrap();

        let x = a.profile.numeric_summary("x").unwrap();
        assert_eq!(x.n, 5);
        assert_eq!(x.mean, Statistic::Defined(22.0));
        assert_eq!(x.median, Statistic::Defined(3.0));
        assert_eq!(x.iqr, Statistic::Defined(2.0));

        let o = a.profile.outlier_report("x").unwrap();
        assert_eq!((o.lower, o.upper), (Statistic::Defined(-1.0), Statistic::Defined(7.0)));
        assert_eq!((o.count, o.pct), (1, 20.0));

        let y = a.profile.categorical_summary("y").unwrap();
        assert_eq!(y.count_of("a"), Some(3));
        assert_eq!(y.count_of("b"), Some(2));
        assert!(a.profile.quality.is_empty());

        let r = &a.recommendations;
        assert!(r.correlation_tests.is_empty());
        assert!(r.recommends(StatisticalTest::IndependentTTest));
        assert!(r.recommends(StatisticalTest::MannWhitneyU));
        assert!(r.recommends(StatisticalTest::OneWayAnova));
        assert!(r.recommends(StatisticalTest::KruskalWallis));
        assert!(!r.recommends(StatisticalTest::ChiSquare));
        assert!(r.general.contains(&GeneralRecommendation::OutliersDetected {
            variables: vec!["x".into()]
        }));
    }

    #[test]
    fn invalid_input_stops_before_advisor() {
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(vec![]))]).unwrap();
        assert!(matches!(
            analyze(&ds, &seeded()),
            Err(ProfileError::InvalidInput { .. })
        ));
    }

    #[test]
    fn partition_shared_by_both_components() {
        let ds = Dataset::from_columns(vec![
            ("a", Column::numeric_from_options(vec![Some(1.0), Some(2.0), Some(3.0)])),
            ("t", Column::text_from_options(vec![Some("p"), Some("q"), Some("r")])),
        ])
        .unwrap();
        let a = analyze(&ds, &seeded()).unwrap();
        assert_eq!(a.profile.partition, a.partition);
        assert_eq!(a.profile.categorical.len(), a.partition.categorical_like_count());
        assert!(a.recommendations.recommends(StatisticalTest::KruskalWallis));
    }

    #[test]
    fn seeded_analysis_is_reproducible() {
        let values: Vec<Option<f64>> = (0..5200).map(|i| Some(f64::from(i % 113).ln_1p())).collect();
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values))]).unwrap();
        let first = analyze(&ds, &seeded()).unwrap();
        let second = analyze(&ds, &seeded()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn config_round_trips_through_json() {
        let json = r#"{"profile": {"top_categories": 3}, "advisor": {"seed": 4}}"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.profile.top_categories, 3);
        assert_eq!(config.profile.outlier_samples, 5);
        assert_eq!(config.advisor.seed, Some(4));
    }

    #[test]
    fn analysis_serializes() {
        let ds = Dataset::from_columns(vec![(
            "x",
            Column::numeric_from_options(vec![Some(1.0), None, Some(3.0)]),
        )])
        .unwrap();
        let a = analyze(&ds, &seeded()).unwrap();
        let value = serde_json::to_value(&a).unwrap();
        assert!(value.get("profile").is_some());
        assert!(value.get("recommendations").is_some());
    }
}
