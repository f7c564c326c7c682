use crate::config::{AnalysisConfig, OutlierMethod};
use crate::table::StorageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic type assigned to a column by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Every non-missing value is a finite real number
    Numeric,
    /// At least one non-missing value, and non-numeric content
    Categorical,
    /// Entirely missing
    Unusable,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Unusable => "unusable",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub inferred_type: ColumnType,
    pub storage: StorageKind,
    pub missing_count: usize,
    pub non_missing_count: usize,
    pub distinct_count: usize,
    /// A single distinct non-missing value (low information).
    pub constant: bool,
}

/// Descriptive statistics of one numeric column.
///
/// `count` covers non-missing values only and `missing` is the raw missing
/// count, so `count + missing` equals the table's row count. Every
/// statistic is `None` when `count` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Frequency summary of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub distinct: usize,
    pub top: Option<String>,
    pub top_frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
    /// Share of the row count, in percent. 0.0 for an empty table.
    pub percentage: f64,
}

/// Why a component produced an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Degeneracy {
    NoNumericColumns,
    TooFewNumericColumns { required: usize, actual: usize },
    TooFewRows { required: usize, actual: usize },
}

impl Degeneracy {
    /// Human-readable explanation used by the report.
    pub fn description(&self) -> String {
        match self {
            Self::NoNumericColumns => "no numeric columns".to_string(),
            Self::TooFewNumericColumns { required, actual } => {
                format!("needs at least {required} numeric columns, found {actual}")
            }
            Self::TooFewRows { required, actual } => {
                format!("needs at least {required} complete rows, found {actual}")
            }
        }
    }
}

// ============================================================================
// Correlation
// ============================================================================

/// Pairwise Pearson correlation over numeric columns.
///
/// `values[i][j]` is `None` when the pair has fewer than two jointly
/// non-missing rows or zero variance over them. The diagonal is always 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    /// Jointly non-missing row count per pair.
    pub observations: Vec<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<Degeneracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
    pub observations: usize,
}

impl CorrelationMatrix {
    /// An empty matrix carrying the reason it is empty.
    pub fn empty(reason: Degeneracy) -> Self {
        Self {
            columns: Vec::new(),
            values: Vec::new(),
            observations: Vec::new(),
            degenerate: Some(reason),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Coefficient between two named columns, `None` if undefined or unknown.
    pub fn get(&self, left: &str, right: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == left)?;
        let j = self.columns.iter().position(|c| c == right)?;
        self.values[i][j]
    }

    /// Defined off-diagonal pairs with `|r| >= min_abs`, strongest first.
    ///
    /// Ties keep matrix order (upper triangle, row-major).
    pub fn strongest_pairs(&self, min_abs: f64) -> Vec<CorrelationPair> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                if let Some(r) = self.values[i][j]
                    && r.abs() >= min_abs
                {
                    pairs.push(CorrelationPair {
                        left: self.columns[i].clone(),
                        right: self.columns[j].clone(),
                        coefficient: r,
                        observations: self.observations[i][j],
                    });
                }
            }
        }
        pairs.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        pairs
    }
}

// ============================================================================
// Outliers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFlag {
    pub column: String,
    pub value: f64,
    /// Signed deviation from the column centre in units of its spread, or
    /// the row's anomaly score under the isolation forest.
    pub score: f64,
}

/// Rows flagged in at least one numeric column, keyed by 0-based row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSet {
    pub method: OutlierMethod,
    /// Spread multiple for the z-score methods; anomaly score cutoff for
    /// the isolation forest.
    pub threshold: f64,
    pub rows: BTreeMap<usize, Vec<OutlierFlag>>,
    pub columns_checked: Vec<String>,
    /// Columns whose spread is zero; they flag nothing.
    pub zero_spread_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<Degeneracy>,
}

impl OutlierSet {
    pub fn is_flagged(&self, row: usize) -> bool {
        self.rows.contains_key(&row)
    }

    pub fn flagged_rows(&self) -> Vec<usize> {
        self.rows.keys().copied().collect()
    }

    /// Total number of (row, column) flags.
    pub fn total_flags(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// Number of flags per checked column, in column order.
    pub fn flags_per_column(&self) -> Vec<(String, usize)> {
        self.columns_checked
            .iter()
            .map(|col| {
                let count = self
                    .rows
                    .values()
                    .flatten()
                    .filter(|flag| &flag.column == col)
                    .count();
                (col.clone(), count)
            })
            .collect()
    }
}

// ============================================================================
// Clustering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
}

/// k-means result over standardized numeric features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub k: usize,
    pub features: Vec<String>,
    /// 0-based row index to cluster id in `[0, k)`, retained rows only.
    pub assignments: BTreeMap<usize, usize>,
    /// Centroids in standardized feature space (k x features).
    pub centroids: Vec<Vec<f64>>,
    pub cluster_sizes: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Rows left out because a numeric feature was missing.
    pub excluded_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_selection: Option<Vec<ElbowPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<Degeneracy>,
}

impl ClusterAssignment {
    /// A result for a clustering that could not run.
    pub fn empty(features: Vec<String>, excluded_rows: usize, reason: Degeneracy) -> Self {
        Self {
            k: 0,
            features,
            assignments: BTreeMap::new(),
            centroids: Vec::new(),
            cluster_sizes: Vec::new(),
            inertia: 0.0,
            iterations: 0,
            converged: false,
            excluded_rows,
            k_selection: None,
            degenerate: Some(reason),
        }
    }

    pub fn cluster_of(&self, row: usize) -> Option<usize> {
        self.assignments.get(&row).copied()
    }
}

// ============================================================================
// Report
// ============================================================================

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub row_count: usize,
    pub column_count: usize,
    pub config: AnalysisConfig,
    pub descriptors: Vec<ColumnDescriptor>,
    pub summaries: Vec<SummaryRecord>,
    pub categorical_summaries: Vec<CategoricalSummary>,
    pub missing: Vec<MissingCount>,
    pub correlation: CorrelationMatrix,
    pub outliers: OutlierSet,
    pub clusters: ClusterAssignment,
    pub duration_ms: u64,
}

impl AnalysisReport {
    /// Names of the columns classified numeric, in table order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.descriptors
            .iter()
            .filter(|d| d.inferred_type.is_numeric())
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn descriptor(&self, column: &str) -> Option<&ColumnDescriptor> {
        self.descriptors.iter().find(|d| d.name == column)
    }

    pub fn summary(&self, column: &str) -> Option<&SummaryRecord> {
        self.summaries.iter().find(|s| s.column == column)
    }

    pub fn missing_count(&self, column: &str) -> Option<usize> {
        self.missing
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.missing)
    }

    /// Count of columns per inferred type.
    pub fn type_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for descriptor in &self.descriptors {
            *counts.entry(descriptor.inferred_type.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CorrelationMatrix {
        CorrelationMatrix {
            columns: vec!["a".into(), "b".into(), "c".into()],
            values: vec![
                vec![Some(1.0), Some(-0.9), None],
                vec![Some(-0.9), Some(1.0), Some(0.3)],
                vec![None, Some(0.3), Some(1.0)],
            ],
            observations: vec![vec![5, 5, 1], vec![5, 5, 4], vec![1, 4, 4]],
            degenerate: None,
        }
    }

    #[test]
    fn test_correlation_get() {
        let m = matrix();
        assert_eq!(m.get("a", "b"), Some(-0.9));
        assert_eq!(m.get("a", "c"), None);
        assert_eq!(m.get("a", "zzz"), None);
    }

    #[test]
    fn test_strongest_pairs_sorted_by_magnitude() {
        let pairs = matrix().strongest_pairs(0.0);
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].left.as_str(), pairs[0].right.as_str()), ("a", "b"));
        assert_eq!(pairs[1].coefficient, 0.3);

        assert_eq!(matrix().strongest_pairs(0.5).len(), 1);
    }

    #[test]
    fn test_degeneracy_serialization() {
        let json = serde_json::to_string(&Degeneracy::TooFewRows {
            required: 2,
            actual: 1,
        })
        .unwrap();
        assert!(json.contains("too_few_rows"));
        assert!(Degeneracy::NoNumericColumns
            .description()
            .contains("no numeric"));
    }

    #[test]
    fn test_outlier_set_helpers() {
        let mut rows = BTreeMap::new();
        rows.insert(
            3,
            vec![OutlierFlag {
                column: "x".into(),
                value: 100.0,
                score: 65.8,
            }],
        );
        let set = OutlierSet {
            method: OutlierMethod::RobustZScore,
            threshold: 3.0,
            rows,
            columns_checked: vec!["x".into(), "y".into()],
            zero_spread_columns: vec![],
            degenerate: None,
        };
        assert!(set.is_flagged(3));
        assert!(!set.is_flagged(0));
        assert_eq!(set.flagged_rows(), vec![3]);
        assert_eq!(set.total_flags(), 1);
        assert_eq!(
            set.flags_per_column(),
            vec![("x".to_string(), 1), ("y".to_string(), 0)]
        );
    }
}
