//! Outlier detection.
//!
//! Under the z-score methods each numeric column is scored on its own. A
//! value is flagged when its distance from the column centre, measured in
//! units of the column's spread, exceeds the configured threshold.
//!
//! The isolation forest instead scores complete rows over all numeric
//! columns at once and flags the `contamination` share with the highest
//! anomaly scores.

use super::{complete_rows, isolation_forest};
use crate::config::{AnalysisConfig, OutlierMethod};
use crate::profiler::NumericColumn;
use crate::types::{Degeneracy, OutlierFlag, OutlierSet};
use crate::utils::{is_constant, mean, median, quantile_sorted, sample_std, sorted_copy};
use std::collections::BTreeMap;
use tracing::debug;

/// Scales the MAD into a consistent estimate of the standard deviation.
const MAD_SCALE: f64 = 1.4826;

/// Scales the mean absolute deviation when the MAD collapses to zero.
const MEAN_AD_SCALE: f64 = 1.2533;

/// Flags rows holding extreme values in at least one numeric column.
pub struct OutlierDetector;

impl OutlierDetector {
    pub fn detect(columns: &[NumericColumn], config: &AnalysisConfig) -> OutlierSet {
        let mut set = OutlierSet {
            method: config.outlier_method,
            threshold: config.outlier_threshold,
            rows: BTreeMap::new(),
            columns_checked: columns.iter().map(|c| c.name.clone()).collect(),
            zero_spread_columns: Vec::new(),
            degenerate: None,
        };

        if columns.is_empty() {
            set.degenerate = Some(Degeneracy::NoNumericColumns);
            return set;
        }

        match config.outlier_method {
            OutlierMethod::IsolationForest => flag_isolated_rows(columns, config, &mut set),
            method => flag_extreme_values(columns, method, config.outlier_threshold, &mut set),
        }

        set
    }
}

fn flag_extreme_values(
    columns: &[NumericColumn],
    method: OutlierMethod,
    threshold: f64,
    set: &mut OutlierSet,
) {
    // Columns are visited in order, so each row's flags stay in column order.
    for column in columns {
        let indexed = column.present_indexed();
        let values: Vec<f64> = indexed.iter().map(|(_, v)| *v).collect();

        let Some((centre, spread)) = centre_and_spread(&values, method) else {
            debug!(column = %column.name, "Zero spread, no outliers flagged");
            set.zero_spread_columns.push(column.name.clone());
            continue;
        };

        let mut flagged = 0usize;
        for (row, value) in indexed {
            let score = (value - centre) / spread;
            if score.abs() > threshold {
                set.rows.entry(row).or_default().push(OutlierFlag {
                    column: column.name.clone(),
                    value,
                    score,
                });
                flagged += 1;
            }
        }

        debug!(column = %column.name, centre, spread, flagged, "Scored column");
    }
}

/// Isolation forest over complete rows. The set's threshold becomes the
/// anomaly score cutoff; a flagged row lists its values in every column
/// that varies, each carrying the row's score.
fn flag_isolated_rows(columns: &[NumericColumn], config: &AnalysisConfig, set: &mut OutlierSet) {
    let retained = complete_rows(columns);
    if retained.len() < 2 {
        debug!(retained = retained.len(), "Skipping isolation forest: too few complete rows");
        set.degenerate = Some(Degeneracy::TooFewRows {
            required: 2,
            actual: retained.len(),
        });
        return;
    }

    let points: Vec<Vec<f64>> = retained
        .iter()
        .map(|&row| columns.iter().filter_map(|c| c.cells[row]).collect())
        .collect();

    let varying: Vec<bool> = (0..columns.len())
        .map(|j| !is_constant(&points.iter().map(|p| p[j]).collect::<Vec<_>>()))
        .collect();
    for (column, _) in columns.iter().zip(&varying).filter(|(_, v)| !**v) {
        set.zero_spread_columns.push(column.name.clone());
    }

    let scores = isolation_forest::anomaly_scores(&points, config.seed);
    // Strictly above the cutoff, so identical scores never flag.
    let cutoff = quantile_sorted(&sorted_copy(&scores), 1.0 - config.contamination).unwrap_or(1.0);
    set.threshold = cutoff;

    for ((&row, point), &score) in retained.iter().zip(&points).zip(&scores) {
        if score <= cutoff {
            continue;
        }
        let flags = columns
            .iter()
            .zip(point)
            .zip(&varying)
            .filter(|(_, varies)| **varies)
            .map(|((column, &value), _)| OutlierFlag {
                column: column.name.clone(),
                value,
                score,
            })
            .collect();
        set.rows.insert(row, flags);
    }

    debug!(
        rows = retained.len(),
        cutoff,
        flagged = set.rows.len(),
        "Scored rows with isolation forest"
    );
}

/// Centre and spread under a z-score method, `None` when the spread is zero.
fn centre_and_spread(values: &[f64], method: OutlierMethod) -> Option<(f64, f64)> {
    // Identical values are zero spread even when rounding in the mean
    // would leave a tiny non-zero standard deviation.
    if values.len() < 2 || is_constant(values) {
        return None;
    }

    let (centre, spread) = match method {
        OutlierMethod::ZScore => (mean(values)?, sample_std(values)?),
        OutlierMethod::RobustZScore => {
            let centre = median(values)?;
            let deviations: Vec<f64> = values.iter().map(|v| (v - centre).abs()).collect();
            let mad = median(&deviations)?;
            let spread = if mad > 0.0 {
                MAD_SCALE * mad
            } else {
                MEAN_AD_SCALE * mean(&deviations)?
            };
            (centre, spread)
        }
        OutlierMethod::IsolationForest => return None,
    };

    (spread > 0.0 && spread.is_finite()).then_some((centre, spread))
}
