//! Progress reporting for an analysis run.
//!
//! Each component reports when it starts and finishes. When components run
//! concurrently their updates may arrive in any order, so consumers should
//! rely on the stage carried by each update rather than arrival order.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_insight::Analyzer;
//!
//! let report = Analyzer::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .analyze(&table)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Validating configuration against the table
    Initializing,
    /// Classifying columns as numeric, categorical or unusable
    Classification,
    /// Counting missing cells
    MissingValues,
    /// Numeric and categorical summaries
    Summary,
    /// Pairwise correlation
    Correlation,
    /// Outlier detection
    Outliers,
    /// k-means clustering
    Clustering,
    /// Writing report files
    ReportGeneration,
    /// Analysis finished
    Complete,
    /// Analysis failed with an error
    Failed,
}

impl AnalysisStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Classification => "Classifying Columns",
            Self::MissingValues => "Counting Missing Values",
            Self::Summary => "Summarizing Columns",
            Self::Correlation => "Computing Correlations",
            Self::Outliers => "Detecting Outliers",
            Self::Clustering => "Clustering Rows",
            Self::ReportGeneration => "Generating Reports",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run taken by this stage (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Classification => 0.08,
            Self::MissingValues => 0.05,
            Self::Summary => 0.15,
            Self::Correlation => 0.15,
            Self::Outliers => 0.15,
            Self::Clustering => 0.30,
            Self::ReportGeneration => 0.10,
            Self::Complete => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Classification => 0.02,
            Self::MissingValues => 0.10,
            Self::Summary => 0.15,
            Self::Correlation => 0.30,
            Self::Outliers => 0.45,
            Self::Clustering => 0.60,
            Self::ReportGeneration => 0.90,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A single progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: AnalysisStage,

    /// Optional detail such as the column being processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: AnalysisStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Progress update with item counts, e.g. files written out of total.
    pub fn with_items(
        stage: AnalysisStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: Some(sub_stage.into()),
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: AnalysisStage::Complete,
            sub_stage: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: AnalysisStage::Failed,
            sub_stage: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }
}

/// Receives progress updates during an analysis run.
///
/// Implementations must be `Send + Sync`: components running on worker
/// threads report through the same reporter.
pub trait ProgressReporter: Send + Sync {
    /// Called at stage boundaries. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
