//! In-memory table consumed by the analysis pipeline.
//!
//! A [`Table`] is an ordered, rectangular set of named columns. Every cell
//! is either a value or the missing sentinel (`None`); null-like text tokens
//! are canonicalized when the table is built, so downstream components never
//! interpret raw formats. Tables are immutable once constructed and are
//! shared read-only between the analytical components.

use crate::error::{AnalysisError, Result, ResultExt};
use crate::utils::{is_missing_token, is_numeric_dtype};
use polars::prelude::{DataFrame, DataType, PolarsError, Series};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Physical storage of a column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Numeric,
    Boolean,
    Text,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Text => "text",
        }
    }
}

/// The cells of one column. `None` is the missing sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cells", rename_all = "snake_case")]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    /// Number of cells, missing included.
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the cell at `row` holds the missing sentinel.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Self::Numeric(v) => v.get(row).is_none_or(Option::is_none),
            Self::Boolean(v) => v.get(row).is_none_or(Option::is_none),
            Self::Text(v) => v.get(row).is_none_or(Option::is_none),
        }
    }

    /// Number of cells holding the missing sentinel.
    pub fn missing_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Boolean(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            Self::Numeric(_) => StorageKind::Numeric,
            Self::Boolean(_) => StorageKind::Boolean,
            Self::Text(_) => StorageKind::Text,
        }
    }

    /// Render the non-missing cells as strings, in row order.
    pub fn present_strings(&self) -> Vec<String> {
        match self {
            Self::Numeric(v) => v.iter().flatten().map(|x| format_number(*x)).collect(),
            Self::Boolean(v) => v.iter().flatten().map(|b| b.to_string()).collect(),
            Self::Text(v) => v.iter().flatten().cloned().collect(),
        }
    }
}

/// Format a float the way it would read in a CSV cell (`3` rather than `3.0`).
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    /// Build a column. Non-finite numeric cells (`NaN`, `±inf`) become
    /// missing, matching how text cells like `inf` fail to parse.
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        let values = match values {
            ColumnValues::Numeric(cells) => ColumnValues::Numeric(finite_cells(cells)),
            other => other,
        };
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a numeric column. Non-finite cells are treated as missing.
    pub fn numeric(name: impl Into<String>, cells: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnValues::Numeric(cells))
    }

    pub fn boolean(name: impl Into<String>, cells: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnValues::Boolean(cells))
    }

    /// Build a text column. Cells are taken as-is; use [`Table::from_records`]
    /// when null-like tokens still need canonicalizing.
    pub fn text<S: Into<String>>(name: impl Into<String>, cells: Vec<Option<S>>) -> Self {
        let cells = cells.into_iter().map(|c| c.map(Into::into)).collect();
        Self::new(name, ColumnValues::Text(cells))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.missing_count()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.values.storage_kind()
    }
}

/// Immutable, rectangular table of named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table from columns whose missing cells are already `None`.
    ///
    /// Fails with [`AnalysisError::MalformedInput`] when column lengths
    /// differ or a column name is empty or duplicated.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::with_capacity(columns.len());

        for (index, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(AnalysisError::malformed(format!(
                    "column {} has an empty name",
                    index + 1
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AnalysisError::malformed(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            if column.len() != row_count {
                return Err(AnalysisError::malformed(format!(
                    "column '{}' has {} cells, expected {}",
                    column.name,
                    column.len(),
                    row_count
                )));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Build a text table from raw string records.
    ///
    /// Every record must have exactly one cell per header. Cells matching
    /// one of `missing_tokens` (or blank) become missing.
    pub fn from_records<H, R, C>(headers: H, rows: R, missing_tokens: &[String]) -> Result<Self>
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for (row_index, row) in rows.into_iter().enumerate() {
            let row: Vec<C> = row.into_iter().collect();
            if row.len() != headers.len() {
                return Err(AnalysisError::malformed(format!(
                    "row {} has {} cells, expected {}",
                    row_index + 1,
                    row.len(),
                    headers.len()
                )));
            }
            for (column_cells, cell) in cells.iter_mut().zip(row) {
                let cell = cell.as_ref();
                column_cells.push((!is_missing_token(cell, missing_tokens)).then(|| cell.to_string()));
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, ColumnValues::Text(cells)))
            .collect();

        Self::from_columns(columns)
    }

    /// Build a table from a polars DataFrame.
    ///
    /// Integer and float columns become numeric (`NaN` and nulls are
    /// missing), boolean columns stay boolean, everything else is read as
    /// text with null-like tokens canonicalized to missing.
    pub fn from_dataframe(df: &DataFrame, missing_tokens: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let name = series.name().to_string();
            let values = series_to_values(series, missing_tokens)
                .context(format!("Failed to read column '{name}'"))?;
            columns.push(Column::new(name, values));
        }

        Self::from_columns(columns)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AnalysisError::ColumnNotFound(name.to_string()))
    }
}

fn finite_cells(cells: Vec<Option<f64>>) -> Vec<Option<f64>> {
    cells
        .into_iter()
        .map(|c| c.filter(|v| v.is_finite()))
        .collect()
}

fn series_to_values(
    series: &Series,
    missing_tokens: &[String],
) -> std::result::Result<ColumnValues, PolarsError> {
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) {
        let float_series = series.cast(&DataType::Float64)?;
        let cells = float_series.f64()?.into_iter().collect();
        return Ok(ColumnValues::Numeric(finite_cells(cells)));
    }

    if dtype == &DataType::Boolean {
        let cells = series.bool()?.into_iter().collect();
        return Ok(ColumnValues::Boolean(cells));
    }

    let string_series = if dtype == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    let cells = string_series
        .str()?
        .into_iter()
        .map(|v| {
            v.filter(|s| !is_missing_token(s, missing_tokens))
                .map(str::to_string)
        })
        .collect();

    Ok(ColumnValues::Text(cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::default_missing_tokens;
    use polars::prelude::*;

    #[test]
    fn test_from_columns_rejects_length_mismatch() {
        let result = Table::from_columns(vec![
            super::Column::numeric("a", vec![Some(1.0), Some(2.0)]),
            super::Column::numeric("b", vec![Some(1.0)]),
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_INPUT");
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_from_columns_rejects_duplicate_names() {
        let result = Table::from_columns(vec![
            super::Column::numeric("a", vec![Some(1.0)]),
            super::Column::numeric("a", vec![Some(2.0)]),
        ]);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_from_columns_rejects_empty_name() {
        let result = Table::from_columns(vec![super::Column::numeric(" ", vec![Some(1.0)])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_columns(vec![]).unwrap();
        assert_eq!(table.shape(), (0, 0));
    }

    #[test]
    fn test_from_records_canonicalizes_missing_tokens() {
        let tokens = default_missing_tokens();
        let table = Table::from_records(
            ["id", "city"],
            vec![vec!["1", "Paris"], vec!["NA", ""], vec!["3", " null "]],
            &tokens,
        )
        .unwrap();

        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.column("id").unwrap().missing_count(), 1);
        assert_eq!(table.column("city").unwrap().missing_count(), 2);
        assert_eq!(
            table.column("city").unwrap().values(),
            &ColumnValues::Text(vec![Some("Paris".to_string()), None, None])
        );
    }

    #[test]
    fn test_from_records_rejects_ragged_rows() {
        let tokens = default_missing_tokens();
        let result = Table::from_records(
            ["a", "b"],
            vec![vec!["1", "2"], vec!["3"]],
            &tokens,
        );
        let err = result.unwrap_err();
        assert!(err.is_rejected_input());
        assert!(err.to_string().contains("row 2 has 1 cells, expected 2"));
    }

    #[test]
    fn test_from_dataframe_maps_dtypes() {
        let df = df![
            "int" => [Some(1i64), None, Some(3)],
            "float" => [Some(1.5f64), Some(f64::NAN), None],
            "flag" => [Some(true), Some(false), None],
            "name" => [Some("a"), Some("N/A"), None],
        ]
        .unwrap();

        let table = Table::from_dataframe(&df, &default_missing_tokens()).unwrap();
        assert_eq!(table.shape(), (3, 4));

        let int = table.column("int").unwrap();
        assert_eq!(int.storage_kind(), StorageKind::Numeric);
        assert_eq!(int.values(), &ColumnValues::Numeric(vec![Some(1.0), None, Some(3.0)]));

        let float = table.column("float").unwrap();
        assert_eq!(float.missing_count(), 2);

        let flag = table.column("flag").unwrap();
        assert_eq!(flag.storage_kind(), StorageKind::Boolean);
        assert_eq!(flag.missing_count(), 1);

        let name = table.column("name").unwrap();
        assert_eq!(name.storage_kind(), StorageKind::Text);
        assert_eq!(name.missing_count(), 2);
    }

    #[test]
    fn test_from_dataframe_treats_infinities_as_missing() {
        let df = df![
            "x" => [Some(1.0f64), Some(2.5), Some(f64::INFINITY), Some(f64::NEG_INFINITY), Some(4.0)],
        ]
        .unwrap();

        let table = Table::from_dataframe(&df, &default_missing_tokens()).unwrap();
        assert_eq!(
            table.column("x").unwrap().values(),
            &ColumnValues::Numeric(vec![Some(1.0), Some(2.5), None, None, Some(4.0)])
        );
    }

    #[test]
    fn test_column_new_normalizes_non_finite_cells() {
        let column = super::Column::new(
            "x",
            ColumnValues::Numeric(vec![Some(f64::INFINITY), Some(f64::NAN), Some(1.0)]),
        );
        assert_eq!(column.missing_count(), 2);
    }

    #[test]
    fn test_column_not_found() {
        let table = Table::from_columns(vec![super::Column::numeric("a", vec![Some(1.0)])]).unwrap();
        assert_eq!(table.column("b").unwrap_err().error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_present_strings_and_is_missing() {
        let values = ColumnValues::Numeric(vec![Some(3.0), None, Some(2.5)]);
        assert_eq!(values.present_strings(), vec!["3", "2.5"]);
        assert!(values.is_missing(1));
        assert!(!values.is_missing(0));
        assert!(values.is_missing(10));
    }
}
