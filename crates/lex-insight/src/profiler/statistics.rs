//! Summary statistics for numeric and categorical columns.

use super::NumericColumn;
use crate::table::Column;
use crate::types::{CategoricalSummary, SummaryRecord};
use crate::utils::{mean, quantile_sorted, sample_std, sorted_copy};
use std::collections::HashMap;

/// Describe a numeric column over its non-missing values.
///
/// Standard deviation uses the n - 1 denominator and is 0.0 for a single
/// value. Quartiles interpolate linearly between order statistics.
pub(crate) fn summarize_numeric(column: &NumericColumn) -> SummaryRecord {
    let present = column.present();
    let sorted = sorted_copy(&present);

    SummaryRecord {
        column: column.name.clone(),
        count: present.len(),
        missing: column.cells.len() - present.len(),
        mean: mean(&present),
        std: sample_std(&present),
        min: sorted.first().copied(),
        p25: quantile_sorted(&sorted, 0.25),
        p50: quantile_sorted(&sorted, 0.50),
        p75: quantile_sorted(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Frequency summary of a categorical column.
///
/// The most frequent value wins; on equal frequency the value seen first
/// in the column wins.
pub(crate) fn summarize_categorical(column: &Column) -> CategoricalSummary {
    let values = column.values().present_strings();

    // value -> (frequency, first position)
    let mut frequencies: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.iter().enumerate() {
        frequencies
            .entry(value.as_str())
            .or_insert((0, position))
            .0 += 1;
    }

    let top = frequencies
        .iter()
        .max_by(|(_, (freq_a, pos_a)), (_, (freq_b, pos_b))| {
            freq_a.cmp(freq_b).then(pos_b.cmp(pos_a))
        })
        .map(|(value, (freq, _))| (value.to_string(), *freq));

    CategoricalSummary {
        column: column.name().to_string(),
        count: values.len(),
        missing: column.missing_count(),
        distinct: frequencies.len(),
        top_frequency: top.as_ref().map(|(_, f)| *f).unwrap_or(0),
        top: top.map(|(v, _)| v),
    }
}
