//! Analytical components run over the numeric columns of a table.
//!
//! - [`CorrelationEngine`]: pairwise Pearson correlation
//! - [`OutlierDetector`]: per-column robust or classic z-score flags, or
//!   row-level isolation forest flags
//! - [`ClusteringEngine`]: seeded k-means with restarts and elbow selection
//!
//! Each component is a pure function of its inputs and the configuration.
//! A degenerate input yields an empty result that carries its reason.

mod clustering;
mod correlation;
mod isolation_forest;
mod outliers;

pub use clustering::ClusteringEngine;
pub use correlation::CorrelationEngine;
pub use outliers::OutlierDetector;

use crate::profiler::NumericColumn;

/// Indices of rows present in every column.
pub(crate) fn complete_rows(columns: &[NumericColumn]) -> Vec<usize> {
    let row_count = columns.first().map_or(0, |c| c.cells.len());
    (0..row_count)
        .filter(|&row| columns.iter().all(|c| c.cells[row].is_some()))
        .collect()
}
