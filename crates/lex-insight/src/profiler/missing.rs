//! Missing-value counting.

use crate::table::Table;
use crate::types::MissingCount;

/// Count missing cells in every column, in table order.
///
/// Runs on the raw table and ignores classification: unusable and
/// categorical columns are counted like any other.
pub(crate) fn count_missing(table: &Table) -> Vec<MissingCount> {
    let rows = table.row_count();

    table
        .columns()
        .iter()
        .map(|column| {
            let missing = column.missing_count();
            let percentage = if rows > 0 {
                (missing as f64 / rows as f64) * 100.0
            } else {
                0.0
            };
            MissingCount {
                column: column.name().to_string(),
                missing,
                percentage,
            }
        })
        .collect()
}
