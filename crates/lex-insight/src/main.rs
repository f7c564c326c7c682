//! CLI entry point for the exploratory analysis pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_insight::{
    AnalysisConfig, AnalysisReport, Analyzer, IngestOptions, OutlierMethod, ReportGenerator,
    default_missing_tokens, load_csv,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// CLI-compatible outlier method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierMethod {
    /// Median and scaled median absolute deviation
    Robust,
    /// Mean and sample standard deviation
    Zscore,
    /// Seeded isolation forest over complete rows
    IsolationForest,
}

impl From<CliOutlierMethod> for OutlierMethod {
    fn from(cli: CliOutlierMethod) -> Self {
        match cli {
            CliOutlierMethod::Robust => OutlierMethod::RobustZScore,
            CliOutlierMethod::Zscore => OutlierMethod::ZScore,
            CliOutlierMethod::IsolationForest => OutlierMethod::IsolationForest,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lex-insight",
    version,
    about = "Automated exploratory analysis of CSV data",
    after_help = "EXAMPLES:\n  \
                  # Analyze a file and write analysis.json + README.md to ./outputs\n  \
                  lex-insight -i data.csv\n\n  \
                  # Pick k with the elbow rule, up to 8 clusters\n  \
                  lex-insight -i data.csv --elbow-max-k 8\n\n  \
                  # Print the JSON report only\n  \
                  lex-insight -i data.csv --json | jq .analysis.outliers"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for analysis.json and README.md
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Flag values further than this many spreads from the column centre
    #[arg(long, default_value_t = lex_insight::config::DEFAULT_OUTLIER_THRESHOLD)]
    outlier_threshold: f64,

    /// Outlier scoring method
    #[arg(long, value_enum, default_value = "robust")]
    outlier_method: CliOutlierMethod,

    /// Share of rows the isolation forest flags, in (0, 0.5]
    #[arg(long, default_value_t = lex_insight::config::DEFAULT_CONTAMINATION)]
    contamination: f64,

    /// Fixed number of clusters (default 3)
    #[arg(short = 'k', long, conflicts_with = "elbow_max_k")]
    clusters: Option<usize>,

    /// Choose k with the elbow rule, searching 1..=N
    #[arg(long)]
    elbow_max_k: Option<usize>,

    /// Maximum k-means iterations per run
    #[arg(long, default_value_t = lex_insight::config::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Number of k-means++ restarts
    #[arg(long, default_value_t = lex_insight::config::DEFAULT_RESTARTS)]
    restarts: usize,

    /// Seed for k-means++ initialization
    #[arg(long, default_value_t = lex_insight::config::DEFAULT_SEED)]
    seed: u64,

    /// Treat boolean columns as numeric 0/1
    #[arg(long)]
    booleans_as_numeric: bool,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Extra token read as a missing value (repeatable)
    #[arg(long = "missing-token")]
    missing_tokens: Vec<String>,

    /// Run the analysis components one after another
    #[arg(long)]
    sequential: bool,

    /// Output JSON to stdout instead of writing report files
    ///
    /// Disables all logs; only the JSON report is printed.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let config = build_config(&args)?;
    let options = build_ingest_options(&args)?;

    let table = load_csv(&args.input, &options)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let analyzer = Analyzer::builder()
        .config(config)
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?;

    if args.json {
        let report = analyzer.analyze(&table)?;
        println!("{}", ReportGenerator::to_json(&report)?);
        return Ok(());
    }

    let (report, paths) = analyzer.analyze_to_dir(&table, &args.output)?;
    for path in &paths {
        info!("Wrote {}", path.display());
    }

    if !args.quiet {
        print_human_readable_summary(&report, &args);
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .outlier_threshold(args.outlier_threshold)
        .outlier_method(args.outlier_method.into())
        .contamination(args.contamination)
        .max_iterations(args.max_iterations)
        .restarts(args.restarts)
        .seed(args.seed)
        .booleans_as_numeric(args.booleans_as_numeric)
        .parallel(!args.sequential);

    if let Some(k) = args.clusters {
        builder = builder.cluster_count(k);
    }
    if let Some(max_k) = args.elbow_max_k {
        builder = builder.elbow(max_k);
    }

    Ok(builder.build()?)
}

fn build_ingest_options(args: &Args) -> Result<IngestOptions> {
    if !args.delimiter.is_ascii() {
        return Err(anyhow!(
            "Delimiter must be a single ASCII character, got '{}'",
            args.delimiter
        ));
    }

    let mut missing_tokens = default_missing_tokens();
    missing_tokens.extend(args.missing_tokens.iter().cloned());

    Ok(IngestOptions {
        missing_tokens,
        delimiter: args.delimiter as u8,
        ..IngestOptions::default()
    })
}

/// Print a human-readable summary of the analysis.
///
/// Uses `println!` on purpose: this is the command's result, not a log.
fn print_human_readable_summary(report: &AnalysisReport, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    println!("ANALYSIS COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input.display(),
        report.row_count,
        report.column_count
    );
    println!("Output: {}", args.output.display());
    println!();

    println!("Columns:");
    for (kind, count) in report.type_counts() {
        println!("  {kind}: {count}");
    }
    println!();

    let missing: usize = report.missing.iter().map(|m| m.missing).sum();
    println!("Missing cells: {missing}");

    match &report.correlation.degenerate {
        Some(reason) => println!("Correlation: skipped ({})", reason.description()),
        None => {
            let pairs = report.correlation.strongest_pairs(0.5);
            println!("Correlation: {} strong pairs (|r| >= 0.5)", pairs.len());
            for pair in pairs.iter().take(5) {
                println!("  {} / {}: {:.3}", pair.left, pair.right, pair.coefficient);
            }
        }
    }

    match &report.outliers.degenerate {
        Some(reason) => println!("Outliers: skipped ({})", reason.description()),
        None => println!(
            "Outliers: {} rows flagged ({} flags)",
            report.outliers.rows.len(),
            report.outliers.total_flags()
        ),
    }

    match &report.clusters.degenerate {
        Some(reason) => println!("Clusters: skipped ({})", reason.description()),
        None => println!(
            "Clusters: k = {}, sizes {:?}, inertia {:.3}",
            report.clusters.k, report.clusters.cluster_sizes, report.clusters.inertia
        ),
    }

    println!();
    println!("Duration: {}ms", report.duration_ms);
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
