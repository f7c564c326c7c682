//! Column profiling: classification, summary statistics and missing values.
//!
//! Classification runs once per table and its descriptors are passed as data
//! to every downstream component.

mod missing;
mod statistics;
mod type_inference;

use crate::config::AnalysisConfig;
use crate::table::Table;
use crate::types::{CategoricalSummary, ColumnDescriptor, ColumnType, MissingCount, SummaryRecord};
use std::collections::HashSet;
use tracing::debug;

pub(crate) use type_inference::{classify_column, numeric_cells};

/// A numeric column's cells as floats, missing cells kept as `None` so row
/// indices line up with the table.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: String,
    pub cells: Vec<Option<f64>>,
}

impl NumericColumn {
    /// Non-missing values in row order.
    pub fn present(&self) -> Vec<f64> {
        self.cells.iter().flatten().copied().collect()
    }

    /// Non-missing values with their 0-based row index.
    pub fn present_indexed(&self) -> Vec<(usize, f64)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(row, cell)| cell.map(|v| (row, v)))
            .collect()
    }
}

/// Profiler for the columns of a [`Table`].
pub struct DataProfiler;

impl DataProfiler {
    /// Classify every column of the table, in table order.
    pub fn classify(table: &Table, config: &AnalysisConfig) -> Vec<ColumnDescriptor> {
        table
            .columns()
            .iter()
            .map(|column| {
                let inferred_type = classify_column(column, config.booleans_as_numeric);
                let distinct_count = column
                    .values()
                    .present_strings()
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .len();
                let missing_count = column.missing_count();

                debug!(
                    column = column.name(),
                    inferred_type = inferred_type.as_str(),
                    missing_count,
                    distinct_count,
                    "Classified column"
                );

                ColumnDescriptor {
                    name: column.name().to_string(),
                    inferred_type,
                    storage: column.storage_kind(),
                    missing_count,
                    non_missing_count: column.len() - missing_count,
                    distinct_count,
                    constant: distinct_count == 1,
                }
            })
            .collect()
    }

    /// Float views of the columns classified numeric, in table order.
    pub fn numeric_columns(
        table: &Table,
        descriptors: &[ColumnDescriptor],
        config: &AnalysisConfig,
    ) -> Vec<NumericColumn> {
        table
            .columns()
            .iter()
            .zip(descriptors)
            .filter(|(_, descriptor)| descriptor.inferred_type == ColumnType::Numeric)
            .filter_map(|(column, _)| {
                numeric_cells(column, config.booleans_as_numeric).map(|cells| NumericColumn {
                    name: column.name().to_string(),
                    cells,
                })
            })
            .collect()
    }

    /// One summary record per numeric column.
    pub fn summarize(columns: &[NumericColumn]) -> Vec<SummaryRecord> {
        columns.iter().map(statistics::summarize_numeric).collect()
    }

    /// One frequency summary per categorical column.
    pub fn summarize_categorical(
        table: &Table,
        descriptors: &[ColumnDescriptor],
    ) -> Vec<CategoricalSummary> {
        table
            .columns()
            .iter()
            .zip(descriptors)
            .filter(|(_, descriptor)| descriptor.inferred_type == ColumnType::Categorical)
            .map(|(column, _)| statistics::summarize_categorical(column))
            .collect()
    }

    /// Missing-cell counts for every column regardless of type.
    pub fn missing_values(table: &Table) -> Vec<MissingCount> {
        missing::count_missing(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn sample_table() -> Table {
        Table::from_columns(vec![
            Column::numeric("age", vec![Some(30.0), Some(40.0), None, Some(50.0)]),
            Column::text("city", vec![Some("Paris"), Some("Lyon"), Some("Paris"), None]),
            Column::text("amount", vec![Some("1.5"), Some("2"), Some("3"), Some("4")]),
            Column::text::<String>("notes", vec![None, None, None, None]),
            Column::text("country", vec![Some("FR"), Some("FR"), Some("FR"), Some("FR")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_classify_descriptors() {
        let table = sample_table();
        let descriptors = DataProfiler::classify(&table, &AnalysisConfig::default());

        let types: Vec<_> = descriptors.iter().map(|d| d.inferred_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Numeric,
                ColumnType::Categorical,
                ColumnType::Numeric,
                ColumnType::Unusable,
                ColumnType::Categorical,
            ]
        );

        assert_eq!(descriptors[0].missing_count, 1);
        assert_eq!(descriptors[0].non_missing_count, 3);
        assert_eq!(descriptors[1].distinct_count, 2);
        assert!(!descriptors[1].constant);
        assert!(descriptors[4].constant);
        assert_eq!(descriptors[3].distinct_count, 0);
    }

    #[test]
    fn test_numeric_columns_include_parsed_text() {
        let table = sample_table();
        let config = AnalysisConfig::default();
        let descriptors = DataProfiler::classify(&table, &config);
        let numeric = DataProfiler::numeric_columns(&table, &descriptors, &config);

        let names: Vec<_> = numeric.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["age", "amount"]);
        assert_eq!(numeric[1].cells[0], Some(1.5));
    }

    #[test]
    fn test_summaries_cover_their_column_types() {
        let table = sample_table();
        let config = AnalysisConfig::default();
        let descriptors = DataProfiler::classify(&table, &config);
        let numeric = DataProfiler::numeric_columns(&table, &descriptors, &config);

        let summaries = DataProfiler::summarize(&numeric);
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.count + s.missing == table.row_count()));

        let categorical = DataProfiler::summarize_categorical(&table, &descriptors);
        let names: Vec<_> = categorical.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["city", "country"]);
    }

    #[test]
    fn test_missing_values_reports_every_column() {
        let table = sample_table();
        let missing = DataProfiler::missing_values(&table);
        assert_eq!(missing.len(), 5);
        assert_eq!(missing[3].missing, 4);
    }

    #[test]
    fn test_present_indexed_keeps_row_positions() {
        let column = NumericColumn {
            name: "x".into(),
            cells: vec![None, Some(2.0), None, Some(4.0)],
        };
        assert_eq!(column.present(), vec![2.0, 4.0]);
        assert_eq!(column.present_indexed(), vec![(1, 2.0), (3, 4.0)]);
    }
}
