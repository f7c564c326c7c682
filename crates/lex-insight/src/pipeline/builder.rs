//! Main analysis pipeline.
//!
//! This module provides the [`Analyzer`] and its builder. An analyzer
//! classifies the table once, then runs the missing-value, summary,
//! correlation, outlier and clustering components over it, either on
//! scoped worker threads or one after another. Both modes produce the same
//! report.

use crate::analysis::{ClusteringEngine, CorrelationEngine, OutlierDetector};
use crate::config::{AnalysisConfig, ConfigValidationError};
use crate::error::{AnalysisError, Result};
use crate::pipeline::progress::{
    AnalysisStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::profiler::{DataProfiler, NumericColumn};
use crate::reporting::ReportGenerator;
use crate::table::Table;
use crate::types::{
    AnalysisReport, CategoricalSummary, ClusterAssignment, ColumnDescriptor, CorrelationMatrix,
    MissingCount, OutlierSet, SummaryRecord,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

/// Outputs of the per-table components.
struct ComponentResults {
    missing: Vec<MissingCount>,
    summaries: Vec<SummaryRecord>,
    categorical_summaries: Vec<CategoricalSummary>,
    correlation: CorrelationMatrix,
    outliers: OutlierSet,
    clusters: ClusterAssignment,
}

/// Runs the full exploratory analysis over a [`Table`].
///
/// Use [`Analyzer::builder()`] to create one with a custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_insight::{Analyzer, AnalysisConfig};
///
/// let config = AnalysisConfig::builder()
///     .outlier_threshold(3.5)
///     .elbow(8)
///     .build()?;
///
/// let report = Analyzer::builder()
///     .config(config)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .analyze(&table)?;
///
/// println!("{} rows flagged", report.outliers.flagged_rows().len());
/// ```
pub struct Analyzer {
    config: AnalysisConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Analyzer {
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze a table.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] when the configuration does
    /// not fit the table (e.g. more clusters than rows) and
    /// [`AnalysisError::Internal`] if a component worker panics. Degenerate
    /// data never fails; it is reported in the result.
    pub fn analyze(&self, table: &Table) -> Result<AnalysisReport> {
        match self.analyze_internal(table) {
            Ok(report) => {
                self.report_progress(ProgressUpdate::complete("Analysis completed successfully"));
                Ok(report)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Analysis error: {}", e);
                Err(e)
            }
        }
    }

    /// Analyze a table and write `analysis.json` and `README.md` into
    /// `output_dir`. Returns the report and the written paths.
    pub fn analyze_to_dir(
        &self,
        table: &Table,
        output_dir: impl AsRef<Path>,
    ) -> Result<(AnalysisReport, Vec<PathBuf>)> {
        let result = self.analyze_internal(table).and_then(|report| {
            let paths = self.write_reports(&report, output_dir.as_ref())?;
            Ok((report, paths))
        });

        match result {
            Ok(done) => {
                self.report_progress(ProgressUpdate::complete("Analysis and reports complete"));
                Ok(done)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Analysis error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn analyze_internal(&self, table: &Table) -> Result<AnalysisReport> {
        let start_time = Instant::now();
        let (row_count, column_count) = table.shape();

        info!(rows = row_count, columns = column_count, "Starting analysis");
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Initializing,
            0.0,
            "Validating configuration...",
        ));
        self.config.validate_for_rows(row_count)?;

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Classification,
            0.0,
            "Classifying columns...",
        ));
        let descriptors = DataProfiler::classify(table, &self.config);
        let numeric = DataProfiler::numeric_columns(table, &descriptors, &self.config);
        info!(
            numeric = numeric.len(),
            total = descriptors.len(),
            "Column classification complete"
        );
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Classification,
            1.0,
            format!("{} of {} columns are numeric", numeric.len(), descriptors.len()),
        ));

        let results = if self.config.parallel {
            debug!("Running components on worker threads");
            self.run_concurrent(table, &descriptors, &numeric)?
        } else {
            debug!("Running components sequentially");
            self.run_sequential(table, &descriptors, &numeric)
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            duration_ms,
            flagged_rows = results.outliers.rows.len(),
            clusters = results.clusters.k,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            row_count,
            column_count,
            config: self.config.clone(),
            descriptors,
            summaries: results.summaries,
            categorical_summaries: results.categorical_summaries,
            missing: results.missing,
            correlation: results.correlation,
            outliers: results.outliers,
            clusters: results.clusters,
            duration_ms,
        })
    }

    fn run_sequential(
        &self,
        table: &Table,
        descriptors: &[ColumnDescriptor],
        numeric: &[NumericColumn],
    ) -> ComponentResults {
        let missing = self.missing_stage(table);
        let (summaries, categorical_summaries) = self.summary_stage(table, descriptors, numeric);
        ComponentResults {
            missing,
            summaries,
            categorical_summaries,
            correlation: self.correlation_stage(numeric),
            outliers: self.outlier_stage(numeric),
            clusters: self.clustering_stage(numeric),
        }
    }

    /// Each component gets its own scoped thread over the shared table.
    fn run_concurrent(
        &self,
        table: &Table,
        descriptors: &[ColumnDescriptor],
        numeric: &[NumericColumn],
    ) -> Result<ComponentResults> {
        thread::scope(|scope| {
            let missing = scope.spawn(|| self.missing_stage(table));
            let summaries = scope.spawn(|| self.summary_stage(table, descriptors, numeric));
            let correlation = scope.spawn(|| self.correlation_stage(numeric));
            let outliers = scope.spawn(|| self.outlier_stage(numeric));
            let clusters = scope.spawn(|| self.clustering_stage(numeric));

            // Join every worker before propagating, so no panic is left unjoined.
            let missing = join_component(missing, "missing values");
            let summaries = join_component(summaries, "summary statistics");
            let correlation = join_component(correlation, "correlation");
            let outliers = join_component(outliers, "outlier detection");
            let clusters = join_component(clusters, "clustering");

            let (summaries, categorical_summaries) = summaries?;
            Ok(ComponentResults {
                missing: missing?,
                summaries,
                categorical_summaries,
                correlation: correlation?,
                outliers: outliers?,
                clusters: clusters?,
            })
        })
    }

    fn missing_stage(&self, table: &Table) -> Vec<MissingCount> {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::MissingValues,
            0.0,
            "Counting missing values...",
        ));
        let missing = DataProfiler::missing_values(table);
        let total: usize = missing.iter().map(|m| m.missing).sum();
        debug!(total_missing = total, "Missing values counted");
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::MissingValues,
            1.0,
            format!("{total} missing cells"),
        ));
        missing
    }

    fn summary_stage(
        &self,
        table: &Table,
        descriptors: &[ColumnDescriptor],
        numeric: &[NumericColumn],
    ) -> (Vec<SummaryRecord>, Vec<CategoricalSummary>) {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Summary,
            0.0,
            "Summarizing columns...",
        ));
        let summaries = DataProfiler::summarize(numeric);
        let categorical = DataProfiler::summarize_categorical(table, descriptors);
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Summary,
            1.0,
            "Summary statistics complete",
        ));
        (summaries, categorical)
    }

    fn correlation_stage(&self, numeric: &[NumericColumn]) -> CorrelationMatrix {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Correlation,
            0.0,
            "Computing correlations...",
        ));
        let matrix = CorrelationEngine::compute(numeric);
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Correlation,
            1.0,
            "Correlation complete",
        ));
        matrix
    }

    fn outlier_stage(&self, numeric: &[NumericColumn]) -> OutlierSet {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Outliers,
            0.0,
            "Detecting outliers...",
        ));
        let outliers = OutlierDetector::detect(numeric, &self.config);
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Outliers,
            1.0,
            format!("{} rows flagged", outliers.rows.len()),
        ));
        outliers
    }

    fn clustering_stage(&self, numeric: &[NumericColumn]) -> ClusterAssignment {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Clustering,
            0.0,
            "Clustering rows...",
        ));
        let clusters = ClusteringEngine::cluster(numeric, &self.config);
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Clustering,
            1.0,
            format!("{} clusters", clusters.k),
        ));
        clusters
    }

    fn write_reports(&self, report: &AnalysisReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let generator = ReportGenerator::new(output_dir);
        let total = 2;

        self.report_progress(ProgressUpdate::with_items(
            AnalysisStage::ReportGeneration,
            "analysis.json",
            0,
            total,
            "Writing JSON report...",
        ));
        let json_path = generator.write_json(report)?;

        self.report_progress(ProgressUpdate::with_items(
            AnalysisStage::ReportGeneration,
            "README.md",
            1,
            total,
            "Writing markdown report...",
        ));
        let markdown_path = generator.write_markdown(report)?;

        info!(output_dir = %output_dir.display(), "Reports written");
        Ok(vec![json_path, markdown_path])
    }
}

fn join_component<T>(handle: ScopedJoinHandle<'_, T>, component: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| AnalysisError::Internal(format!("{component} worker panicked")))
}

/// Builder for [`Analyzer`].
#[derive(Default)]
pub struct AnalyzerBuilder {
    config: Option<AnalysisConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl AnalyzerBuilder {
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during analysis.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Shorthand for [`progress_reporter`](Self::progress_reporter) with a
    /// [`ClosureProgressReporter`].
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the analyzer.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Analyzer, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Analyzer {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use std::sync::Mutex;

    fn sample_table() -> Table {
        Table::from_columns(vec![
            Column::numeric(
                "x",
                vec![Some(1.0), Some(2.0), Some(3.0), Some(100.0), Some(2.5), None],
            ),
            Column::numeric(
                "y",
                vec![Some(-1.0), Some(-2.0), Some(-3.0), Some(-100.0), Some(-2.5), Some(0.0)],
            ),
            Column::text(
                "group",
                vec![Some("a"), Some("b"), Some("a"), Some("c"), None, Some("a")],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_analyzer_builder_default() {
        let analyzer = Analyzer::builder().build().unwrap();
        assert_eq!(analyzer.config(), &AnalysisConfig::default());
        assert!(analyzer.progress_reporter.is_none());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = AnalysisConfig {
            outlier_threshold: -1.0,
            ..AnalysisConfig::default()
        };
        assert!(Analyzer::builder().config(config).build().is_err());
    }

    #[test]
    fn test_cluster_count_above_rows_is_rejected() {
        let config = AnalysisConfig::builder().cluster_count(10).build().unwrap();
        let analyzer = Analyzer::builder().config(config).build().unwrap();

        let err = analyzer.analyze(&sample_table()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.is_rejected_input());
    }

    #[test]
    fn test_analyze_produces_every_component() {
        let report = Analyzer::builder()
            .build()
            .unwrap()
            .analyze(&sample_table())
            .unwrap();

        assert_eq!(report.row_count, 6);
        assert_eq!(report.column_count, 3);
        assert_eq!(report.numeric_columns(), vec!["x", "y"]);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.categorical_summaries.len(), 1);
        assert_eq!(report.missing.len(), 3);
        assert_eq!(report.missing_count("x"), Some(1));
        assert!((report.correlation.get("x", "y").unwrap() + 1.0).abs() < 1e-9);
        assert!(report.outliers.is_flagged(3));
        assert_eq!(report.clusters.excluded_rows, 1);
        assert_eq!(report.clusters.k, 3);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let table = sample_table();
        let parallel = Analyzer::builder()
            .config(AnalysisConfig::builder().parallel(true).build().unwrap())
            .build()
            .unwrap()
            .analyze(&table)
            .unwrap();
        let sequential = Analyzer::builder()
            .config(AnalysisConfig::builder().parallel(false).build().unwrap())
            .build()
            .unwrap()
            .analyze(&table)
            .unwrap();

        assert_eq!(parallel.descriptors, sequential.descriptors);
        assert_eq!(parallel.summaries, sequential.summaries);
        assert_eq!(parallel.missing, sequential.missing);
        assert_eq!(parallel.correlation, sequential.correlation);
        assert_eq!(parallel.outliers, sequential.outliers);
        assert_eq!(parallel.clusters, sequential.clusters);
    }

    #[test]
    fn test_progress_reported_through_completion() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        Analyzer::builder()
            .on_progress(move |update| {
                stages_clone.lock().unwrap().push(update.stage);
            })
            .build()
            .unwrap()
            .analyze(&sample_table())
            .unwrap();

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first(), Some(&AnalysisStage::Initializing));
        assert_eq!(stages.last(), Some(&AnalysisStage::Complete));
        for stage in [
            AnalysisStage::Classification,
            AnalysisStage::MissingValues,
            AnalysisStage::Summary,
            AnalysisStage::Correlation,
            AnalysisStage::Outliers,
            AnalysisStage::Clustering,
        ] {
            assert!(stages.contains(&stage), "missing {stage:?}");
        }
    }

    #[test]
    fn test_failure_reported_as_progress() {
        let failed = Arc::new(Mutex::new(false));
        let failed_clone = failed.clone();

        let config = AnalysisConfig::builder().cluster_count(50).build().unwrap();
        let result = Analyzer::builder()
            .config(config)
            .on_progress(move |update| {
                if update.stage == AnalysisStage::Failed {
                    *failed_clone.lock().unwrap() = true;
                }
            })
            .build()
            .unwrap()
            .analyze(&sample_table());

        assert!(result.is_err());
        assert!(*failed.lock().unwrap());
    }

    #[test]
    fn test_empty_table_is_degenerate_not_an_error() {
        let table = Table::from_columns(vec![]).unwrap();
        let config = AnalysisConfig::builder().cluster_count(1).build().unwrap();
        // An empty table has zero rows, so any fixed k exceeds it.
        assert!(Analyzer::builder()
            .config(config)
            .build()
            .unwrap()
            .analyze(&table)
            .is_err());

        let config = AnalysisConfig::builder().elbow(3).build().unwrap();
        let report = Analyzer::builder()
            .config(config)
            .build()
            .unwrap()
            .analyze(&table)
            .unwrap();
        assert!(report.correlation.is_empty());
        assert!(report.outliers.degenerate.is_some());
        assert!(report.clusters.degenerate.is_some());
    }
}
