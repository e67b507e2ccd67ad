//! Statistical test recommendation.
//!
//! The advisor reuses the variable-type partition to run per-variable
//! normality tests and to select the correlation and comparison tests
//! that fit the dataset's structure. It also emits general guidance
//! driven by sample size, missing-data rate and outlier presence.
//!
//! Individual test failures are recorded against their variable; a
//! `recommend` call never fails.
//!
//! # Example
//!
//! ```
//! use u_statprofile::advisor::{recommend, AdvisorConfig, StatisticalTest};
//! use u_statprofile::classify::classify;
//! use u_statprofile::csv_parser::CsvParser;
//!
//! let csv = "x,y\n1,a\n2,a\n3,b\n4,b\n100,a\n";
//! let ds = CsvParser::new().parse_str(csv).unwrap();
//! let recs = recommend(&ds, &classify(&ds), &AdvisorConfig::default().seed(1));
//!
//! assert!(recs.correlation_tests.is_empty());
//! assert!(recs.recommends(StatisticalTest::MannWhitneyU));
//! assert!(recs.recommends(StatisticalTest::KruskalWallis));
//! assert!(!recs.recommends(StatisticalTest::ChiSquare));
//! ```

use crate::classify::VariableTypePartition;
use crate::dataframe::{DataType, Dataset};
use crate::distribution::{subsample, test_normality, NormalityTestResult};
use crate::outlier::detect_iqr_outliers;
use crate::stats::percentage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

// ── Configuration ─────────────────────────────────────────────────────

/// Thresholds used by the advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Numeric variables tested for normality, in declaration order.
    /// Default: 10.
    pub max_normality_variables: usize,
    /// Larger samples are uniformly subsampled to this size. Default: 5000.
    pub max_normality_sample: usize,
    /// Variables with fewer observations are not tested. Default: 3.
    pub min_normality_sample: usize,
    /// Normality is rejected when `p <= significance_level`. Default: 0.05.
    pub significance_level: f64,
    /// Row counts below this get a small-sample caveat. Default: 30.
    pub small_sample_threshold: usize,
    /// Row counts above this get a large-sample caveat. Default: 10000.
    pub large_sample_threshold: usize,
    /// Share of rows with any missing value above which a missing-data
    /// caveat is emitted. Default: 0.10.
    pub missing_row_ratio: f64,
    /// Subsampling seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_normality_variables: 10,
            max_normality_sample: 5000,
            min_normality_sample: 3,
            significance_level: 0.05,
            small_sample_threshold: 30,
            large_sample_threshold: 10_000,
            missing_row_ratio: 0.10,
            seed: None,
        }
    }
}

impl AdvisorConfig {
    /// Sets the subsampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of numeric variables tested for normality.
    pub fn max_normality_variables(mut self, n: usize) -> Self {
        self.max_normality_variables = n;
        self
    }

    /// Sets the normality subsample ceiling.
    pub fn max_normality_sample(mut self, n: usize) -> Self {
        self.max_normality_sample = n;
        self
    }

    /// Sets the normality significance level.
    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = alpha;
        self
    }

    /// Sets the missing-row ratio threshold.
    pub fn missing_row_ratio(mut self, ratio: f64) -> Self {
        self.missing_row_ratio = ratio;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

// ── Recommendations ───────────────────────────────────────────────────

/// A statistical test the advisor can recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatisticalTest {
    Pearson,
    Spearman,
    IndependentTTest,
    MannWhitneyU,
    OneWayAnova,
    KruskalWallis,
    ChiSquare,
}

impl StatisticalTest {
    /// `true` for tests that assume normally distributed data.
    pub fn is_parametric(self) -> bool {
        matches!(self, Self::Pearson | Self::IndependentTTest | Self::OneWayAnova)
    }
}

impl fmt::Display for StatisticalTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pearson => "Pearson correlation",
            Self::Spearman => "Spearman rank correlation",
            Self::IndependentTTest => "Independent samples t-test",
            Self::MannWhitneyU => "Mann-Whitney U test",
            Self::OneWayAnova => "One-way ANOVA",
            Self::KruskalWallis => "Kruskal-Wallis test",
            Self::ChiSquare => "Chi-square test of independence",
        };
        f.write_str(name)
    }
}

/// One structural test recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecommendation {
    pub test: StatisticalTest,
    /// When to use it.
    pub use_case: String,
    pub parametric: bool,
}

impl TestRecommendation {
    fn new(test: StatisticalTest, use_case: &str) -> Self {
        Self {
            test,
            use_case: use_case.to_string(),
            parametric: test.is_parametric(),
        }
    }
}

/// Dataset-wide guidance independent of specific test choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GeneralRecommendation {
    SmallSample { n: usize },
    LargeSample { n: usize },
    /// `pct` is the share of rows with at least one missing value.
    MissingData { pct: f64 },
    OutliersDetected { variables: Vec<String> },
}

impl fmt::Display for GeneralRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallSample { n } => write!(
                f,
                "Small sample size (n = {n}): prefer non-parametric tests and interpret results with caution"
            ),
            Self::LargeSample { n } => write!(
                f,
                "Large sample size (n = {n}): small effects may be statistically significant, report effect sizes"
            ),
            Self::MissingData { pct } => write!(
                f,
                "{pct}% of rows contain missing values: consider imputation or complete-case analysis"
            ),
            Self::OutliersDetected { variables } => write!(
                f,
                "Outliers detected in {}: consider robust or non-parametric methods",
                variables.join(", ")
            ),
        }
    }
}

/// Everything the advisor recommends for a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationSet {
    /// Columns with exactly two distinct non-missing values.
    pub binary_variables: Vec<String>,
    pub normality_tests: Vec<NormalityTestResult>,
    pub correlation_tests: Vec<TestRecommendation>,
    pub comparison_tests: Vec<TestRecommendation>,
    pub general: Vec<GeneralRecommendation>,
}

impl RecommendationSet {
    /// `true` if `test` appears among the structural recommendations.
    pub fn recommends(&self, test: StatisticalTest) -> bool {
        self.correlation_tests
            .iter()
            .chain(&self.comparison_tests)
            .any(|r| r.test == test)
    }

    /// Normality result for `variable`, if it was tested.
    pub fn normality_of(&self, variable: &str) -> Option<&NormalityTestResult> {
        self.normality_tests.iter().find(|r| r.variable == variable)
    }
}

// ── Advisor ───────────────────────────────────────────────────────────

/// Recommends tests for `ds`, subsampling with a generator seeded from
/// `config.seed` (or OS entropy).
pub fn recommend(
    ds: &Dataset,
    partition: &VariableTypePartition,
    config: &AdvisorConfig,
) -> RecommendationSet {
    let mut rng = config.rng();
    recommend_with_rng(ds, partition, config, &mut rng)
}

/// Like [`recommend`] with an explicit subsampling generator.
///
/// Partition names that do not resolve to a column of the matching
/// type are skipped.
#[instrument(skip_all, fields(rows = ds.row_count(), numeric = partition.numeric.len()))]
pub fn recommend_with_rng<R: Rng + ?Sized>(
    ds: &Dataset,
    partition: &VariableTypePartition,
    config: &AdvisorConfig,
    rng: &mut R,
) -> RecommendationSet {
    let binary_variables = binary_variables(ds);
    let normality_tests = normality_tests(ds, partition, config, rng);

    let numeric = partition.numeric.len();
    let categorical = partition.categorical_like_count();
    let binary = binary_variables.len();
    debug!(numeric, categorical, binary, "bucket counts");

    let mut correlation_tests = Vec::new();
    if numeric >= 2 {
        correlation_tests.push(TestRecommendation::new(
            StatisticalTest::Pearson,
            "Linear association between numeric variables (assumes normality)",
        ));
        correlation_tests.push(TestRecommendation::new(
            StatisticalTest::Spearman,
            "Monotonic association between numeric variables",
        ));
    }

    let mut comparison_tests = Vec::new();
    if numeric >= 1 && binary >= 1 {
        comparison_tests.push(TestRecommendation::new(
            StatisticalTest::IndependentTTest,
            "Compare a numeric variable between two groups (assumes normality)",
        ));
        comparison_tests.push(TestRecommendation::new(
            StatisticalTest::MannWhitneyU,
            "Compare a numeric variable between two groups",
        ));
    }
    if numeric >= 1 && categorical >= 1 {
        comparison_tests.push(TestRecommendation::new(
            StatisticalTest::OneWayAnova,
            "Compare a numeric variable across category groups (assumes normality)",
        ));
        comparison_tests.push(TestRecommendation::new(
            StatisticalTest::KruskalWallis,
            "Compare a numeric variable across category groups",
        ));
    }
    if categorical >= 2 {
        comparison_tests.push(TestRecommendation::new(
            StatisticalTest::ChiSquare,
            "Association between two categorical variables",
        ));
    }

    let general = general_recommendations(ds, partition, config);
    debug!(
        normality = normality_tests.len(),
        structural = correlation_tests.len() + comparison_tests.len(),
        general = general.len(),
        "recommendations ready"
    );

    RecommendationSet {
        binary_variables,
        normality_tests,
        correlation_tests,
        comparison_tests,
        general,
    }
}

/// Names of columns with exactly two distinct non-missing values, in
/// column order, regardless of type.
pub fn binary_variables(ds: &Dataset) -> Vec<String> {
    ds.iter()
        .filter(|(_, col)| col.distinct_count() == 2)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn normality_tests<R: Rng + ?Sized>(
    ds: &Dataset,
    partition: &VariableTypePartition,
    config: &AdvisorConfig,
    rng: &mut R,
) -> Vec<NormalityTestResult> {
    let mut results = Vec::new();
    for name in partition.numeric.iter().take(config.max_normality_variables) {
        let Some(values) = ds.column_by_name(name).and_then(|c| c.valid_numeric_values()) else {
            debug!(variable = %name, "not a numeric column, skipped");
            continue;
        };
        if values.len() < config.min_normality_sample {
            debug!(variable = %name, n = values.len(), "too few observations for normality test");
            continue;
        }
        let (sample, subsampled) = subsample(&values, config.max_normality_sample, rng);
        results.push(test_normality(
            name,
            &sample,
            subsampled,
            config.significance_level,
        ));
    }
    results
}

fn general_recommendations(
    ds: &Dataset,
    partition: &VariableTypePartition,
    config: &AdvisorConfig,
) -> Vec<GeneralRecommendation> {
    let n = ds.row_count();
    let mut out = Vec::new();

    if n < config.small_sample_threshold {
        out.push(GeneralRecommendation::SmallSample { n });
    }
    if n > config.large_sample_threshold {
        out.push(GeneralRecommendation::LargeSample { n });
    }

    if n > 0 {
        let incomplete = ds.incomplete_row_count();
        if incomplete as f64 / n as f64 > config.missing_row_ratio {
            out.push(GeneralRecommendation::MissingData {
                pct: percentage(incomplete, n),
            });
        }
    }

    let with_outliers: Vec<String> = partition
        .numeric
        .iter()
        .filter(|name| {
            ds.column_by_name(name)
                .filter(|c| c.data_type() == DataType::Numeric)
                .and_then(detect_iqr_outliers)
                .is_some_and(|d| d.count() > 0)
        })
        .cloned()
        .collect();
    if !with_outliers.is_empty() {
        out.push(GeneralRecommendation::OutliersDetected {
            variables: with_outliers,
        });
    }

    out
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::dataframe::Column;
    use crate::distribution::NormalityOutcome;
    use crate::error::ProfileError;
    use crate::profiling::profile_dataset;

    fn example() -> Dataset {
        Dataset::from_columns(vec![
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
        .unwrap()
    }

    fn run(ds: &Dataset) -> RecommendationSet {
        recommend(ds, &classify(ds), &AdvisorConfig::default().seed(42))
    }

    // ── Decision table ───────────────────────────────────────────

    #[test]
    fn example_recommendations() {
        let recs = run(&example());
        assert_eq!(recs.binary_variables, vec!["y"]);
        assert!(recs.correlation_tests.is_empty());
        let tests: Vec<StatisticalTest> = recs.comparison_tests.iter().map(|r| r.test).collect();
        assert_eq!(
            tests,
            vec![
                StatisticalTest::IndependentTTest,
                StatisticalTest::MannWhitneyU,
                StatisticalTest::OneWayAnova,
                StatisticalTest::KruskalWallis,
            ]
        );
        assert!(!recs.recommends(StatisticalTest::ChiSquare));
    }

    #[test]
    fn two_numeric_gives_correlation() {
        let ds = Dataset::from_columns(vec![
            ("a", Column::numeric_from_options(vec![Some(1.0), Some(2.0), Some(3.0)])),
            ("b", Column::numeric_from_options(vec![Some(3.0), Some(1.0), Some(2.0)])),
        ])
        .unwrap();
        let recs = run(&ds);
        assert!(recs.recommends(StatisticalTest::Pearson));
        assert!(recs.recommends(StatisticalTest::Spearman));
        assert!(recs.comparison_tests.is_empty());
    }

    #[test]
    fn text_counts_as_categorical() {
        let ds = Dataset::from_columns(vec![
            ("c", Column::categorical_from_options(vec![Some("u"), Some("v"), Some("w")])),
            ("t", Column::text_from_options(vec![Some("p"), Some("q"), Some("r")])),
        ])
        .unwrap();
        let recs = run(&ds);
        assert_eq!(recs.comparison_tests.len(), 1);
        assert!(recs.recommends(StatisticalTest::ChiSquare));
        assert!(recs.correlation_tests.is_empty());
    }

    #[test]
    fn binary_regardless_of_type() {
        let ds = Dataset::from_columns(vec![
            ("n", Column::numeric_from_options(vec![Some(0.0), Some(1.0), None, Some(1.0)])),
            ("b", Column::boolean_from_options(vec![Some(true), Some(false), Some(true), None])),
            ("k", Column::boolean_from_options(vec![Some(true), Some(true), None, None])),
            ("z", Column::numeric_from_options(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])),
        ])
        .unwrap();
        let recs = run(&ds);
        assert_eq!(recs.binary_variables, vec!["n", "b"]);
        assert!(recs.recommends(StatisticalTest::IndependentTTest));
        // No categorical or text columns.
        assert!(!recs.recommends(StatisticalTest::OneWayAnova));
    }

    #[test]
    fn parametric_flag_follows_test() {
        let recs = run(&example());
        for r in recs.comparison_tests {
            assert_eq!(r.parametric, r.test.is_parametric());
        }
        assert_eq!(StatisticalTest::MannWhitneyU.to_string(), "Mann-Whitney U test");
    }

    // ── Normality ────────────────────────────────────────────────

    #[test]
    fn normality_skips_tiny_variables() {
        let ds = Dataset::from_columns(vec![
            ("short", Column::numeric_from_options(vec![Some(1.0), Some(2.0), None, None])),
            ("ok", Column::numeric_from_options(vec![Some(1.0), Some(2.0), Some(4.0), Some(3.0)])),
        ])
        .unwrap();
        let recs = run(&ds);
        assert_eq!(recs.normality_tests.len(), 1);
        assert!(recs.normality_of("short").is_none());
        let ok = recs.normality_of("ok").unwrap();
        assert_eq!(ok.sample_size, 4);
        assert!(!ok.subsampled);
        assert_eq!(ok.is_normal(), Some(true));
    }

    #[test]
    fn constant_variable_records_failure() {
        let ds = Dataset::from_columns(vec![(
            "k",
            Column::numeric_from_options(vec![Some(2.0); 5]),
        )])
        .unwrap();
        let recs = run(&ds);
        let k = recs.normality_of("k").unwrap();
        assert!(matches!(
            &k.outcome,
            NormalityOutcome::Failed {
                error: ProfileError::StatisticalTestFailure { variable, .. },
                ..
            } if variable == "k"
        ));
        assert_eq!(k.interpretation(), "Test could not be performed");
        assert_eq!(k.is_normal(), None);
    }

    #[test]
    fn normality_limited_to_first_variables() {
        let cols: Vec<(String, Column)> = (0..12)
            .map(|i| {
                let values = (0..6).map(|j| Some(f64::from(j * (i + 1)))).collect();
                (format!("v{i}"), Column::numeric_from_options(values))
            })
            .collect();
        let ds = Dataset::from_columns(cols).unwrap();
        let recs = run(&ds);
        let tested: Vec<&str> = recs.normality_tests.iter().map(|r| r.variable.as_str()).collect();
        assert_eq!(tested.len(), 10);
        assert_eq!(tested[0], "v0");
        assert_eq!(tested[9], "v9");
    }

    #[test]
    fn large_variable_subsampled_deterministically() {
        let values: Vec<Option<f64>> = (0..6000).map(|i| Some(f64::from(i % 97))).collect();
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values))]).unwrap();
        let first = run(&ds);
        let second = run(&ds);
        let x = first.normality_of("x").unwrap();
        assert!(x.subsampled);
        assert_eq!(x.sample_size, 5000);
        assert_eq!(first.normality_tests, second.normality_tests);
    }

    #[test]
    fn explicit_rng_is_used() {
        let values: Vec<Option<f64>> = (0..300).map(|i| Some(f64::from(i).sqrt())).collect();
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values))]).unwrap();
        let partition = classify(&ds);
        let config = AdvisorConfig::default().max_normality_sample(50);

        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let ra = recommend_with_rng(&ds, &partition, &config, &mut a);
        let rb = recommend_with_rng(&ds, &partition, &config, &mut b);
        assert_eq!(ra.normality_tests, rb.normality_tests);
        assert_eq!(ra.normality_tests[0].sample_size, 50);
    }

    #[test]
    fn unknown_partition_names_skipped() {
        let ds = example();
        let mut partition = classify(&ds);
        partition.numeric.push("ghost".into());
        let recs = recommend(&ds, &partition, &AdvisorConfig::default().seed(3));
        assert!(recs.normality_of("ghost").is_none());
        assert_eq!(recs.normality_tests.len(), 1);
    }

    // ── General guidance ─────────────────────────────────────────

    #[test]
    fn small_sample_and_outliers() {
        let recs = run(&example());
        assert!(recs
            .general
            .contains(&GeneralRecommendation::SmallSample { n: 5 }));
        assert!(recs.general.contains(&GeneralRecommendation::OutliersDetected {
            variables: vec!["x".into()]
        }));
        assert!(!recs
            .general
            .iter()
            .any(|g| matches!(g, GeneralRecommendation::MissingData { .. })));
    }

    #[test]
    fn outlier_guidance_agrees_with_profile() {
        let ds = Dataset::from_columns(vec![
            (
                "clean",
                Column::numeric_from_options((0..40).map(|i| Some(f64::from(i))).collect()),
            ),
            (
                "spiky",
                Column::numeric_from_options(
                    (0..40).map(|i| Some(if i == 7 { 1e4 } else { f64::from(i % 5) })).collect(),
                ),
            ),
        ])
        .unwrap();
        let profile = profile_dataset(&ds).unwrap();
        let flagged: Vec<String> = profile
            .outliers
            .iter()
            .filter(|o| o.count > 0)
            .map(|o| o.variable.clone())
            .collect();
        let recs = run(&ds);
        assert_eq!(
            recs.general,
            vec![GeneralRecommendation::OutliersDetected { variables: flagged }]
        );
    }

    #[test]
    fn missing_rows_threshold_is_strict() {
        // 4 of 40 rows incomplete = exactly 10%, no caveat
        let mut values: Vec<Option<f64>> = (0..40).map(|i| Some(f64::from(i))).collect();
        for v in values.iter_mut().take(4) {
            *v = None;
        }
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values.clone()))])
            .unwrap();
        assert!(run(&ds).general.is_empty());

        values[4] = None;
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values))]).unwrap();
        assert_eq!(
            run(&ds).general,
            vec![GeneralRecommendation::MissingData { pct: 12.5 }]
        );
    }

    #[test]
    fn large_sample_caveat() {
        let values: Vec<Option<f64>> = (0..10_001).map(|i| Some(f64::from(i))).collect();
        let ds = Dataset::from_columns(vec![("x", Column::numeric_from_options(values))]).unwrap();
        let recs = recommend(
            &ds,
            &classify(&ds),
            &AdvisorConfig::default().seed(5).max_normality_variables(0),
        );
        assert_eq!(
            recs.general,
            vec![GeneralRecommendation::LargeSample { n: 10_001 }]
        );
    }

    #[test]
    fn general_display() {
        let g = GeneralRecommendation::OutliersDetected {
            variables: vec!["a".into(), "b".into()],
        };
        assert!(g.to_string().starts_with("Outliers detected in a, b"));
        let g = GeneralRecommendation::MissingData { pct: 12.5 };
        assert!(g.to_string().starts_with("12.5% of rows"));
    }

    #[test]
    fn empty_dataset_never_fails() {
        let recs = run(&Dataset::new());
        assert!(recs.normality_tests.is_empty());
        assert!(recs.correlation_tests.is_empty());
        assert_eq!(recs.general, vec![GeneralRecommendation::SmallSample { n: 0 }]);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AdvisorConfig = serde_json::from_str(r#"{"seed": 11}"#).unwrap();
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.max_normality_sample, 5000);
        assert_eq!(config.significance_level, 0.05);
    }
}
