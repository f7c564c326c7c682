use crate::config::OutlierMethod;
use crate::error::{AnalysisError, Result, ResultExt};
use crate::types::{AnalysisReport, ClusterAssignment, CorrelationMatrix, OutlierSet};
use chrono::Local;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the JSON report.
pub const JSON_REPORT_FILE: &str = "analysis.json";

/// File name of the markdown report.
pub const MARKDOWN_REPORT_FILE: &str = "README.md";

/// Correlations at or above this magnitude are listed as highlights.
const HIGHLIGHT_CORRELATION: f64 = 0.5;

/// Number of numeric columns that get a distribution plot.
const DISTRIBUTION_PLOTS: usize = 3;

/// Flagged rows listed individually in the markdown report.
const MAX_LISTED_OUTLIER_ROWS: usize = 20;

/// Serialized form of a report: the analysis plus metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument<'a> {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Plot files the markdown report refers to. They are rendered
    /// outside this crate from the JSON report.
    pub artifacts: Vec<String>,
    pub analysis: &'a AnalysisReport,
}

/// Writes `analysis.json` and `README.md` for an [`AnalysisReport`].
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Wrap a report with its generation time and artifact list.
    pub fn build_document(report: &AnalysisReport) -> ReportDocument<'_> {
        ReportDocument {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            artifacts: Self::artifact_names(report),
            analysis: report,
        }
    }

    /// Plot files referenced by the markdown report, in report order.
    pub fn artifact_names(report: &AnalysisReport) -> Vec<String> {
        let mut names = vec!["correlation_heatmap.png".to_string()];
        names.extend(
            report
                .numeric_columns()
                .into_iter()
                .take(DISTRIBUTION_PLOTS)
                .map(distribution_file_name),
        );
        names.push("pairplot.png".to_string());
        names.push("outliers.png".to_string());
        names.push("clusters.png".to_string());
        names
    }

    /// Pretty-printed JSON of the report document.
    pub fn to_json(report: &AnalysisReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::build_document(report))?)
    }

    /// Write both reports. Returns the written paths.
    pub fn write_all(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        Ok(vec![self.write_json(report)?, self.write_markdown(report)?])
    }

    pub fn write_json(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.prepare_path(JSON_REPORT_FILE)?;
        let json = Self::to_json(report)?;
        fs::write(&path, json)
            .map_err(AnalysisError::from)
            .context(format!("Failed to write {}", path.display()))?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    pub fn write_markdown(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.prepare_path(MARKDOWN_REPORT_FILE)?;
        fs::write(&path, Self::render_markdown(report)?)
            .map_err(AnalysisError::from)
            .context(format!("Failed to write {}", path.display()))?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    fn prepare_path(&self, file_name: &str) -> Result<PathBuf> {
        if self.output_dir.is_file() {
            return Err(AnalysisError::ReportGenerationFailed(format!(
                "output path {} is a file, not a directory",
                self.output_dir.display()
            )));
        }
        fs::create_dir_all(&self.output_dir)
            .map_err(AnalysisError::from)
            .context(format!("Failed to create {}", self.output_dir.display()))?;
        Ok(self.output_dir.join(file_name))
    }

    /// Render the markdown report. Undefined values render as `n/a`.
    pub fn render_markdown(report: &AnalysisReport) -> Result<String> {
        let mut md = String::new();
        write_markdown(&mut md, report).map_err(|e| {
            AnalysisError::ReportGenerationFailed(format!("markdown rendering failed: {e}"))
        })?;

        debug!(bytes = md.len(), "Rendered markdown report");
        Ok(md)
    }
}

fn write_markdown(md: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(md, "# Exploratory Data Analysis\n")?;
    writeln!(
        md,
        "_Generated {} in {} ms._\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.duration_ms
    )?;

    render_overview(md, report)?;
    render_summaries(md, report)?;
    render_missing(md, report)?;
    render_correlation(md, &report.correlation)?;
    render_distributions(md, report)?;
    render_outliers(md, &report.outliers)?;
    render_clusters(md, &report.clusters)
}

fn distribution_file_name(column: &str) -> String {
    let safe: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("distribution_{safe}.png")
}

fn fmt_value(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Escape table delimiters in user-provided text.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn render_overview(md: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(md, "## Data Overview\n")?;
    writeln!(md, "- Rows: {}", report.row_count)?;
    writeln!(md, "- Columns: {}", report.column_count)?;
    for (kind, count) in report.type_counts() {
        writeln!(md, "- {kind} columns: {count}")?;
    }
    md.push('\n');

    if report.descriptors.is_empty() {
        return Ok(());
    }

    writeln!(md, "| Column | Type | Storage | Missing | Distinct | Constant |")?;
    writeln!(md, "|---|---|---|---|---|---|")?;
    for d in &report.descriptors {
        writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} |",
            cell(&d.name),
            d.inferred_type.as_str(),
            d.storage.as_str(),
            d.missing_count,
            d.distinct_count,
            if d.constant { "yes" } else { "no" }
        )?;
    }
    md.push('\n');
    Ok(())
}

fn render_summaries(md: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(md, "## Summary Statistics\n")?;

    if report.summaries.is_empty() {
        writeln!(md, "_No numeric columns._\n")?;
    } else {
        writeln!(
            md,
            "| Column | Count | Missing | Mean | Std | Min | 25% | 50% | 75% | Max |"
        )?;
        writeln!(md, "|---|---|---|---|---|---|---|---|---|---|")?;
        for s in &report.summaries {
            writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                cell(&s.column),
                s.count,
                s.missing,
                fmt_value(s.mean),
                fmt_value(s.std),
                fmt_value(s.min),
                fmt_value(s.p25),
                fmt_value(s.p50),
                fmt_value(s.p75),
                fmt_value(s.max)
            )?;
        }
        md.push('\n');
    }

    if !report.categorical_summaries.is_empty() {
        writeln!(md, "### Categorical Columns\n")?;
        writeln!(md, "| Column | Count | Missing | Distinct | Top | Frequency |")?;
        writeln!(md, "|---|---|---|---|---|---|")?;
        for c in &report.categorical_summaries {
            writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} |",
                cell(&c.column),
                c.count,
                c.missing,
                c.distinct,
                c.top.as_deref().map(cell).unwrap_or_else(|| "n/a".to_string()),
                c.top_frequency
            )?;
        }
        md.push('\n');
    }
    Ok(())
}

fn render_missing(md: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(md, "## Missing Values\n")?;

    let total: usize = report.missing.iter().map(|m| m.missing).sum();
    if total == 0 {
        writeln!(md, "No missing values.\n")?;
        return Ok(());
    }

    writeln!(md, "| Column | Missing | Percent |")?;
    writeln!(md, "|---|---|---|")?;
    for m in &report.missing {
        writeln!(md, "| {} | {} | {:.1}% |", cell(&m.column), m.missing, m.percentage)?;
    }
    md.push('\n');
    Ok(())
}

fn render_correlation(md: &mut String, matrix: &CorrelationMatrix) -> fmt::Result {
    writeln!(md, "## Correlation\n")?;

    if let Some(reason) = &matrix.degenerate {
        writeln!(md, "_Correlation not computed: {}._\n", reason.description())?;
        return Ok(());
    }

    write!(md, "| |")?;
    for name in &matrix.columns {
        write!(md, " {} |", cell(name))?;
    }
    md.push('\n');
    writeln!(md, "|---|{}", "---|".repeat(matrix.columns.len()))?;
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        write!(md, "| {} |", cell(name))?;
        for value in row {
            write!(md, " {} |", fmt_value(*value))?;
        }
        md.push('\n');
    }
    md.push('\n');

    let pairs = matrix.strongest_pairs(HIGHLIGHT_CORRELATION);
    if pairs.is_empty() {
        writeln!(md, "No pairs with |r| >= {HIGHLIGHT_CORRELATION}.\n")?;
    } else {
        writeln!(md, "Strongest pairs (|r| >= {HIGHLIGHT_CORRELATION}):\n")?;
        for pair in pairs {
            writeln!(
                md,
                "- {} / {}: {:.4} ({} rows)",
                pair.left, pair.right, pair.coefficient, pair.observations
            )?;
        }
        md.push('\n');
    }

    writeln!(md, "![Correlation heatmap](correlation_heatmap.png)\n")?;
    Ok(())
}

fn render_distributions(md: &mut String, report: &AnalysisReport) -> fmt::Result {
    let numeric = report.numeric_columns();
    if numeric.is_empty() {
        return Ok(());
    }

    writeln!(md, "## Distributions\n")?;
    for column in numeric.into_iter().take(DISTRIBUTION_PLOTS) {
        writeln!(
            md,
            "![Distribution of {}]({})",
            column,
            distribution_file_name(column)
        )?;
    }
    writeln!(md, "\n![Pair plot](pairplot.png)\n")?;
    Ok(())
}

fn render_outliers(md: &mut String, outliers: &OutlierSet) -> fmt::Result {
    writeln!(md, "## Outliers\n")?;

    if let Some(reason) = &outliers.degenerate {
        writeln!(md, "_Outlier detection not run: {}._\n", reason.description())?;
        return Ok(());
    }

    let method = match outliers.method {
        OutlierMethod::RobustZScore => "robust z-score (median / MAD)",
        OutlierMethod::ZScore => "z-score (mean / standard deviation)",
        OutlierMethod::IsolationForest => "isolation forest",
    };
    writeln!(md, "- Method: {method}")?;
    if outliers.method == OutlierMethod::IsolationForest {
        writeln!(md, "- Anomaly score cutoff: {:.4}", outliers.threshold)?;
    } else {
        writeln!(md, "- Threshold: {}", outliers.threshold)?;
    }
    writeln!(md, "- Flagged rows: {}", outliers.rows.len())?;
    if !outliers.zero_spread_columns.is_empty() {
        writeln!(
            md,
            "- Zero-spread columns (skipped): {}",
            outliers.zero_spread_columns.join(", ")
        )?;
    }
    md.push('\n');

    writeln!(md, "| Column | Flags |")?;
    writeln!(md, "|---|---|")?;
    for (column, count) in outliers.flags_per_column() {
        writeln!(md, "| {} | {} |", cell(&column), count)?;
    }
    md.push('\n');

    if !outliers.rows.is_empty() {
        writeln!(md, "| Row | Column | Value | Score |")?;
        writeln!(md, "|---|---|---|---|")?;
        for (row, flags) in outliers.rows.iter().take(MAX_LISTED_OUTLIER_ROWS) {
            for flag in flags {
                writeln!(
                    md,
                    "| {} | {} | {} | {:.2} |",
                    row,
                    cell(&flag.column),
                    flag.value,
                    flag.score
                )?;
            }
        }
        if outliers.rows.len() > MAX_LISTED_OUTLIER_ROWS {
            writeln!(
                md,
                "\n_{} more flagged rows in {JSON_REPORT_FILE}._",
                outliers.rows.len() - MAX_LISTED_OUTLIER_ROWS
            )?;
        }
        md.push('\n');
    }

    writeln!(md, "![Outliers](outliers.png)\n")?;
    Ok(())
}

fn render_clusters(md: &mut String, clusters: &ClusterAssignment) -> fmt::Result {
    writeln!(md, "## Clusters\n")?;

    if let Some(reason) = &clusters.degenerate {
        writeln!(md, "_Clustering not run: {}._\n", reason.description())?;
        return Ok(());
    }

    writeln!(md, "- k: {}", clusters.k)?;
    writeln!(md, "- Features: {}", clusters.features.join(", "))?;
    writeln!(md, "- Rows clustered: {}", clusters.assignments.len())?;
    writeln!(md, "- Rows excluded (missing values): {}", clusters.excluded_rows)?;
    writeln!(md, "- Inertia: {:.4}", clusters.inertia)?;
    writeln!(
        md,
        "- Iterations: {} ({})",
        clusters.iterations,
        if clusters.converged { "converged" } else { "iteration limit reached" }
    )?;
    md.push('\n');

    writeln!(md, "| Cluster | Size |")?;
    writeln!(md, "|---|---|")?;
    for (id, size) in clusters.cluster_sizes.iter().enumerate() {
        writeln!(md, "| {id} | {size} |")?;
    }
    md.push('\n');

    if let Some(curve) = &clusters.k_selection {
        writeln!(md, "Elbow search:\n")?;
        writeln!(md, "| k | Inertia |")?;
        writeln!(md, "|---|---|")?;
        for point in curve {
            writeln!(md, "| {} | {:.4} |", point.k, point.inertia)?;
        }
        md.push('\n');
    }

    writeln!(md, "![Clusters](clusters.png)")?;
    Ok(())
}
