//! Configuration types for the analysis pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! The configuration is passed explicitly into every component call; no
//! component reads ambient state.

use serde::{Deserialize, Serialize};

/// Default outlier threshold, in units of the column's spread.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;
/// Default number of clusters.
pub const DEFAULT_CLUSTER_COUNT: usize = 3;
/// Default upper bound on k-means iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
/// Default number of k-means initializations.
pub const DEFAULT_RESTARTS: usize = 10;
/// Default random seed for k-means++ and isolation forest sampling.
pub const DEFAULT_SEED: u64 = 42;
/// Default share of rows an isolation forest flags.
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Method used to decide which values are outliers.
///
/// The default is the robust z-score rather than mean ± threshold·std: on
/// n values a classic z-score can never exceed (n − 1)/√n, so with
/// `[1, 2, 3, 100]` no value reaches 3.0 and the extreme row goes unflagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Median centre, MAD-based spread (scaled to estimate the standard deviation)
    #[default]
    RobustZScore,
    /// Mean centre, sample standard deviation spread
    ZScore,
    /// Seeded isolation forest over complete rows of all numeric columns.
    /// Flags the `contamination` share of rows with the highest anomaly
    /// scores; `outlier_threshold` is not used.
    IsolationForest,
}

/// How the number of clusters is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterCount {
    /// Always use exactly `k` clusters
    Fixed(usize),
    /// Pick k in `1..=max_k` with the inertia-drop (elbow) rule
    Elbow { max_k: usize },
}

impl Default for ClusterCount {
    fn default() -> Self {
        ClusterCount::Fixed(DEFAULT_CLUSTER_COUNT)
    }
}

impl ClusterCount {
    /// Largest k this setting can produce.
    pub fn max_k(&self) -> usize {
        match *self {
            ClusterCount::Fixed(k) => k,
            ClusterCount::Elbow { max_k } => max_k,
        }
    }
}

/// Configuration for an analysis run.
///
/// Use [`AnalysisConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_insight::config::{AnalysisConfig, OutlierMethod};
///
/// let config = AnalysisConfig::builder()
///     .outlier_threshold(2.5)
///     .outlier_method(OutlierMethod::ZScore)
///     .cluster_count(4)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Multiple of the column spread a value must exceed to be flagged.
    /// Higher values produce fewer flags.
    /// Default: 3.0
    pub outlier_threshold: f64,

    /// Scoring method for outlier detection.
    /// Default: RobustZScore
    pub outlier_method: OutlierMethod,

    /// Expected share of anomalous rows, used by the isolation forest.
    /// Must lie in (0, 0.5].
    /// Default: 0.05
    pub contamination: f64,

    /// Cluster count selection.
    /// Default: Fixed(3)
    pub cluster_count: ClusterCount,

    /// Upper bound on k-means refinement iterations.
    /// Default: 100
    pub max_iterations: usize,

    /// Number of seeded k-means++ initializations; the lowest inertia wins.
    /// Default: 10
    pub restarts: usize,

    /// Seed for k-means++ initialization and isolation forest sampling.
    /// Default: 42
    pub seed: u64,

    /// Treat boolean columns as numeric 0/1 instead of categorical.
    /// Default: false
    pub booleans_as_numeric: bool,

    /// Run the analytical components concurrently.
    /// Default: true
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            outlier_method: OutlierMethod::default(),
            contamination: DEFAULT_CONTAMINATION,
            cluster_count: ClusterCount::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            restarts: DEFAULT_RESTARTS,
            seed: DEFAULT_SEED,
            booleans_as_numeric: false,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "outlier_threshold".to_string(),
                value: self.outlier_threshold,
            });
        }

        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigValidationError::InvalidContamination(self.contamination));
        }

        match self.cluster_count {
            ClusterCount::Fixed(0) => return Err(ConfigValidationError::InvalidClusterCount(0)),
            ClusterCount::Elbow { max_k: 0 } => {
                return Err(ConfigValidationError::InvalidElbowMaxK(0));
            }
            _ => {}
        }

        if self.max_iterations == 0 {
            return Err(ConfigValidationError::InvalidMaxIterations(
                self.max_iterations,
            ));
        }

        if self.restarts == 0 {
            return Err(ConfigValidationError::InvalidRestarts(self.restarts));
        }

        Ok(())
    }

    /// Validate the configuration against the table it will run on.
    ///
    /// A fixed cluster count larger than the table's row count is rejected.
    /// An elbow search is not, since its upper bound is only a limit.
    pub fn validate_for_rows(&self, row_count: usize) -> Result<(), ConfigValidationError> {
        self.validate()?;

        if let ClusterCount::Fixed(k) = self.cluster_count
            && k > row_count
        {
            return Err(ConfigValidationError::ClusterCountExceedsRows { k, row_count });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be a finite value greater than 0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid contamination: {0} (must be greater than 0 and at most 0.5)")]
    InvalidContamination(f64),

    #[error("Invalid cluster count: {0} (must be at least 1)")]
    InvalidClusterCount(usize),

    #[error("Invalid elbow search bound: {0} (must be at least 1)")]
    InvalidElbowMaxK(usize),

    #[error("Invalid max iterations: {0} (must be at least 1)")]
    InvalidMaxIterations(usize),

    #[error("Invalid restarts: {0} (must be at least 1)")]
    InvalidRestarts(usize),

    #[error("Invalid cluster count: {k} exceeds the table row count {row_count}")]
    ClusterCountExceedsRows { k: usize, row_count: usize },
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    outlier_threshold: Option<f64>,
    outlier_method: Option<OutlierMethod>,
    contamination: Option<f64>,
    cluster_count: Option<ClusterCount>,
    max_iterations: Option<usize>,
    restarts: Option<usize>,
    seed: Option<u64>,
    booleans_as_numeric: Option<bool>,
    parallel: Option<bool>,
}

impl AnalysisConfigBuilder {
    /// Set the outlier threshold multiplier.
    ///
    /// # Arguments
    /// * `threshold` - Value greater than 0.0 (e.g., 3.0 = three spreads)
    pub fn outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = Some(threshold);
        self
    }

    /// Set the outlier scoring method.
    pub fn outlier_method(mut self, method: OutlierMethod) -> Self {
        self.outlier_method = Some(method);
        self
    }

    /// Set the share of rows the isolation forest flags.
    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = Some(contamination);
        self
    }

    /// Use a fixed number of clusters.
    pub fn cluster_count(mut self, k: usize) -> Self {
        self.cluster_count = Some(ClusterCount::Fixed(k));
        self
    }

    /// Choose the number of clusters with the elbow rule, trying `1..=max_k`.
    pub fn elbow(mut self, max_k: usize) -> Self {
        self.cluster_count = Some(ClusterCount::Elbow { max_k });
        self
    }

    /// Set the maximum number of k-means iterations.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Set the number of k-means initializations.
    pub fn restarts(mut self, restarts: usize) -> Self {
        self.restarts = Some(restarts);
        self
    }

    /// Set the random seed used for initialization.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Treat boolean columns as numeric 0/1.
    pub fn booleans_as_numeric(mut self, enable: bool) -> Self {
        self.booleans_as_numeric = Some(enable);
        self
    }

    /// Enable or disable concurrent execution of the analytical components.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let config = AnalysisConfig {
            outlier_threshold: self.outlier_threshold.unwrap_or(DEFAULT_OUTLIER_THRESHOLD),
            outlier_method: self.outlier_method.unwrap_or_default(),
            contamination: self.contamination.unwrap_or(DEFAULT_CONTAMINATION),
            cluster_count: self.cluster_count.unwrap_or_default(),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            restarts: self.restarts.unwrap_or(DEFAULT_RESTARTS),
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            booleans_as_numeric: self.booleans_as_numeric.unwrap_or(false),
            parallel: self.parallel.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.outlier_threshold, 3.0);
        assert_eq!(config.outlier_method, OutlierMethod::RobustZScore);
        assert_eq!(config.contamination, 0.05);
        assert_eq!(config.cluster_count, ClusterCount::Fixed(3));
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.seed, 42);
        assert!(!config.booleans_as_numeric);
        assert!(config.parallel);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .outlier_threshold(2.0)
            .outlier_method(OutlierMethod::ZScore)
            .elbow(6)
            .max_iterations(50)
            .restarts(2)
            .seed(7)
            .booleans_as_numeric(true)
            .parallel(false)
            .build()
            .unwrap();

        assert_eq!(config.outlier_threshold, 2.0);
        assert_eq!(config.outlier_method, OutlierMethod::ZScore);
        assert_eq!(config.cluster_count, ClusterCount::Elbow { max_k: 6 });
        assert_eq!(config.cluster_count.max_k(), 6);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.restarts, 2);
        assert_eq!(config.seed, 7);
        assert!(config.booleans_as_numeric);
        assert!(!config.parallel);
    }

    #[test]
    fn test_validation_rejects_non_positive_threshold() {
        for threshold in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = AnalysisConfig::builder()
                .outlier_threshold(threshold)
                .build();
            assert!(
                matches!(result, Err(ConfigValidationError::InvalidThreshold { .. })),
                "threshold {threshold} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_rejects_zero_clusters() {
        let result = AnalysisConfig::builder().cluster_count(0).build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::InvalidClusterCount(0))
        ));

        let result = AnalysisConfig::builder().elbow(0).build();
        assert!(matches!(result, Err(ConfigValidationError::InvalidElbowMaxK(0))));
    }

    #[test]
    fn test_validation_rejects_contamination_out_of_range() {
        for contamination in [0.0, -0.1, 0.6, f64::NAN] {
            let result = AnalysisConfig::builder()
                .outlier_method(OutlierMethod::IsolationForest)
                .contamination(contamination)
                .build();
            assert!(
                matches!(result, Err(ConfigValidationError::InvalidContamination(_))),
                "contamination {contamination} should be rejected"
            );
        }
        assert!(AnalysisConfig::builder().contamination(0.5).build().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_iterations_and_restarts() {
        assert!(AnalysisConfig::builder().max_iterations(0).build().is_err());
        assert!(AnalysisConfig::builder().restarts(0).build().is_err());
    }

    #[test]
    fn test_validate_for_rows() {
        let config = AnalysisConfig::builder().cluster_count(5).build().unwrap();
        assert!(config.validate_for_rows(5).is_ok());
        assert!(matches!(
            config.validate_for_rows(4),
            Err(ConfigValidationError::ClusterCountExceedsRows { k: 5, row_count: 4 })
        ));

        // The elbow bound is a search limit, not a requirement.
        let config = AnalysisConfig::builder().elbow(10).build().unwrap();
        assert!(config.validate_for_rows(3).is_ok());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = AnalysisConfig::builder().elbow(4).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("elbow"));
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
