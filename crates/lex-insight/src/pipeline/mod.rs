//! Pipeline module.
//!
//! This module provides the analyzer that drives a run and its progress
//! reporting types.

mod builder;
pub mod progress;

pub use builder::{Analyzer, AnalyzerBuilder};
pub use progress::{AnalysisStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate};
