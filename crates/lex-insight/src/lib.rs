//! Automated exploratory analysis of tabular data.
//!
//! # Overview
//!
//! Given a table of mixed-type columns, this library produces:
//!
//! - **Column classification**: numeric, categorical or unusable
//! - **Summary statistics**: count, mean, standard deviation, min, quartiles, max
//! - **Missing values**: per-column counts over the raw table
//! - **Correlation**: pairwise-complete Pearson matrix over numeric columns
//! - **Outliers**: rows with extreme values under a robust or classic z-score,
//!   or an isolation forest over complete rows
//! - **Clustering**: seeded k-means over standardized numeric features
//! - **Reports**: `analysis.json` and a markdown summary
//!
//! Degenerate data (no numeric columns, zero variance, too few rows) never
//! fails a run; each component reports why its result is empty. Only an
//! invalid configuration or a malformed table is an error.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_insight::{Analyzer, AnalysisConfig, IngestOptions, ReportGenerator};
//!
//! let table = lex_insight::ingest::load_csv("data.csv", &IngestOptions::default())?;
//!
//! let config = AnalysisConfig::builder()
//!     .outlier_threshold(3.0)
//!     .cluster_count(4)
//!     .seed(7)
//!     .build()?;
//!
//! let report = Analyzer::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .analyze(&table)?;
//!
//! ReportGenerator::new("output").write_all(&report)?;
//! ```
//!
//! # Building tables
//!
//! A [`Table`] can come from a polars `DataFrame`, from raw string records
//! or from typed columns:
//!
//! ```rust,ignore
//! use lex_insight::{Table, default_missing_tokens};
//!
//! let table = Table::from_records(
//!     ["id", "city"],
//!     vec![vec!["1", "Paris"], vec!["2", "NA"]],
//!     &default_missing_tokens(),
//! )?;
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analysis::{ClusteringEngine, CorrelationEngine, OutlierDetector};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ClusterCount, ConfigValidationError, OutlierMethod,
};
pub use error::{AnalysisError, Result as AnalysisResult, ResultExt};
pub use ingest::{IngestOptions, load_csv};
pub use pipeline::{
    AnalysisStage, Analyzer, AnalyzerBuilder, ClosureProgressReporter, ProgressReporter,
    ProgressUpdate,
};
pub use profiler::{DataProfiler, NumericColumn};
pub use reporting::{ReportDocument, ReportGenerator};
pub use table::{Column, ColumnValues, StorageKind, Table};
pub use types::{
    AnalysisReport, CategoricalSummary, ClusterAssignment, ColumnDescriptor, ColumnType,
    CorrelationMatrix, CorrelationPair, Degeneracy, ElbowPoint, MissingCount, OutlierFlag,
    OutlierSet, SummaryRecord,
};
pub use utils::{default_missing_tokens, is_missing_token, parse_numeric_string};
