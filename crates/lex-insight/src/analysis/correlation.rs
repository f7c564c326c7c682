//! Pairwise Pearson correlation over numeric columns.

use crate::profiler::NumericColumn;
use crate::types::{CorrelationMatrix, Degeneracy};
use crate::utils::is_constant;
use tracing::debug;

/// Computes the correlation matrix of the numeric columns.
pub struct CorrelationEngine;

impl CorrelationEngine {
    /// Pearson correlation for every pair of numeric columns.
    ///
    /// Each pair uses only rows where both columns are present. Undefined
    /// entries (fewer than two joint rows, or zero variance over them) are
    /// `None`. Fewer than two columns yields an empty matrix.
    pub fn compute(columns: &[NumericColumn]) -> CorrelationMatrix {
        let n = columns.len();
        if n < 2 {
            debug!(numeric_columns = n, "Skipping correlation");
            return CorrelationMatrix::empty(Degeneracy::TooFewNumericColumns {
                required: 2,
                actual: n,
            });
        }

        let mut values = vec![vec![None; n]; n];
        let mut observations = vec![vec![0usize; n]; n];

        for i in 0..n {
            values[i][i] = Some(1.0);
            observations[i][i] = columns[i].cells.iter().flatten().count();

            for j in (i + 1)..n {
                let (r, joint) = pearson_pairwise(&columns[i].cells, &columns[j].cells);
                values[i][j] = r;
                values[j][i] = r;
                observations[i][j] = joint;
                observations[j][i] = joint;
            }
        }

        let undefined = values
            .iter()
            .flatten()
            .filter(|entry| entry.is_none())
            .count();
        debug!(columns = n, undefined_entries = undefined, "Computed correlation matrix");

        CorrelationMatrix {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            values,
            observations,
            degenerate: None,
        }
    }
}

/// Pearson r over the rows where both cells are present, plus that row count.
fn pearson_pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> (Option<f64>, usize) {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    let joint = pairs.len();

    if joint < 2 {
        return (None, joint);
    }

    // Zero variance is decided on the values, not on sums of squares that
    // carry rounding error from the mean.
    let xs: Vec<f64> = pairs.iter().map(|(a, _)| *a).collect();
    let ys: Vec<f64> = pairs.iter().map(|(_, b)| *b).collect();
    if is_constant(&xs) || is_constant(&ys) {
        return (None, joint);
    }

    let len = joint as f64;
    let mean_x = xs.iter().sum::<f64>() / len;
    let mean_y = ys.iter().sum::<f64>() / len;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in xs.iter().zip(&ys) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let r = sxy / (sxx.sqrt() * syy.sqrt());
    (r.is_finite().then(|| r.clamp(-1.0, 1.0)), joint)
}
