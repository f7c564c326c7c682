//! Type inference logic for column analysis.

use crate::table::{Column, ColumnValues};
use crate::types::ColumnType;
use crate::utils::{parse_boolean_string, parse_numeric_string};

/// Classify a column as numeric, categorical or unusable.
///
/// A column is numeric when every non-missing value is a finite real
/// number. Booleans (native or `true`/`false` text) only count as numeric
/// when `booleans_as_numeric` is set. A column mixing numeric-looking and
/// non-numeric text is categorical as a whole.
pub(crate) fn classify_column(column: &Column, booleans_as_numeric: bool) -> ColumnType {
    if column.missing_count() == column.len() {
        return ColumnType::Unusable;
    }

    if numeric_cells(column, booleans_as_numeric).is_some() {
        ColumnType::Numeric
    } else {
        ColumnType::Categorical
    }
}

/// Numeric view of a column, or `None` if any non-missing value is not
/// numeric under the boolean policy. Missing cells stay `None`.
pub(crate) fn numeric_cells(column: &Column, booleans_as_numeric: bool) -> Option<Vec<Option<f64>>> {
    match column.values() {
        ColumnValues::Numeric(cells) => Some(cells.clone()),
        ColumnValues::Boolean(cells) => {
            booleans_as_numeric.then(|| cells.iter().map(|c| c.map(bool_to_f64)).collect())
        }
        ColumnValues::Text(cells) => {
            let parsed = parse_text_cells(cells, parse_numeric_string);
            if parsed.is_some() || !booleans_as_numeric {
                return parsed;
            }
            parse_text_cells(cells, |s| parse_boolean_string(s).map(bool_to_f64))
        }
    }
}

fn parse_text_cells(
    cells: &[Option<String>],
    parse: impl Fn(&str) -> Option<f64>,
) -> Option<Vec<Option<f64>>> {
    cells
        .iter()
        .map(|cell| match cell {
            // An unparseable value makes the whole column non-numeric.
            Some(s) => parse(s).map(Some),
            None => Some(None),
        })
        .collect()
}

fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}
