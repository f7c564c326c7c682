//! CSV ingestion into a [`Table`].
//!
//! Files are read with polars. When the first attempt fails, reading is
//! retried without quote handling and then on a copy of the content with
//! stray doubled quotes collapsed. Null-like tokens are canonicalized to
//! missing when the table is built.

use crate::error::{AnalysisError, Result, ResultExt};
use crate::table::Table;
use crate::utils::default_missing_tokens;
use polars::prelude::{CsvParseOptions, CsvReadOptions, DataFrame, SerReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for reading a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    /// Text cells equal to one of these (trimmed, ASCII case-insensitive)
    /// become missing. Blank cells are always missing.
    pub missing_tokens: Vec<String>,
    /// Field delimiter.
    pub delimiter: u8,
    /// Rows scanned to infer column dtypes. `None` scans the whole file.
    pub infer_schema_length: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            missing_tokens: default_missing_tokens(),
            delimiter: b',',
            infer_schema_length: Some(100),
        }
    }
}

/// Read a CSV file with a header row into a [`Table`].
pub fn load_csv(path: impl AsRef<Path>, options: &IngestOptions) -> Result<Table> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AnalysisError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )));
    }

    info!("Loading dataset from: {}", path.display());
    let df = read_with_fallbacks(path, options)?;
    info!(rows = df.height(), columns = df.width(), "Dataset loaded");

    Table::from_dataframe(&df, &options.missing_tokens)
}

fn read_options(options: &IngestOptions, quote_char: Option<u8>) -> CsvReadOptions {
    CsvReadOptions::default()
        .with_infer_schema_length(options.infer_schema_length)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(options.delimiter)
                .with_quote_char(quote_char),
        )
}

fn read_with_fallbacks(path: &Path, options: &IngestOptions) -> Result<DataFrame> {
    // Standard loading with quote handling
    match read_options(options, Some(b'"'))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    // Without quote handling
    match read_options(options, None)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Loading without quotes failed: {}", e),
    }

    // Pre-cleaned content
    let content = std::fs::read_to_string(path)
        .map_err(AnalysisError::from)
        .context(format!("Could not read {}", path.display()))?;
    read_options(options, Some(b'"'))
        .into_reader_with_file_handle(Cursor::new(clean_csv_content(&content)))
        .finish()
        .context(format!("Could not parse {} as CSV", path.display()))
}

/// Collapse doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnValues, StorageKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_csv_maps_types_and_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(
            &path,
            "id,score,city,flag\n1,1.5,Paris,true\n2,NA,,false\n3,3.5,Lyon,\n",
        )
        .unwrap();

        let table = load_csv(&path, &IngestOptions::default()).unwrap();
        assert_eq!(table.shape(), (3, 4));

        let id = table.column("id").unwrap();
        assert_eq!(id.storage_kind(), StorageKind::Numeric);

        // "NA" makes polars read the column as text; it is canonicalized.
        let score = table.column("score").unwrap();
        assert_eq!(score.missing_count(), 1);

        let city = table.column("city").unwrap();
        assert_eq!(
            city.values(),
            &ColumnValues::Text(vec![Some("Paris".into()), None, Some("Lyon".into())])
        );

        assert_eq!(table.column("flag").unwrap().missing_count(), 1);
    }

    #[test]
    fn test_custom_delimiter_and_tokens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "a;b\n1;x\n-;y\n").unwrap();

        let options = IngestOptions {
            missing_tokens: vec!["-".to_string()],
            delimiter: b';',
            ..IngestOptions::default()
        };
        let table = load_csv(&path, &options).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.column("a").unwrap().missing_count(), 1);
    }

    #[test]
    fn test_infinite_cells_become_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "x\n1.0\n2.5\ninf\n4.0\n").unwrap();

        let table = load_csv(&path, &IngestOptions::default()).unwrap();
        let x = table.column("x").unwrap();
        assert_eq!(
            x.values(),
            &ColumnValues::Numeric(vec![Some(1.0), Some(2.5), None, Some(4.0)])
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_csv("/definitely/not/here.csv", &IngestOptions::default()).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_clean_csv_content() {
        let cleaned = clean_csv_content("a,b\n\n\"\"x\"\",1\n");
        assert_eq!(cleaned, "a,b\n\"x\",1");
    }
}
