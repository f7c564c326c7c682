//! Report generation module.
//!
//! Turns an [`AnalysisReport`](crate::types::AnalysisReport) into files:
//!
//! - `analysis.json`: the full report plus generation metadata
//! - `README.md`: a human-readable summary that references plot files
//!   rendered elsewhere from the JSON
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_insight::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new("output");
//! let paths = generator.write_all(&report)?;
//!
//! // Or print the JSON document
//! println!("{}", ReportGenerator::to_json(&report)?);
//! ```

mod generator;

pub use generator::{JSON_REPORT_FILE, MARKDOWN_REPORT_FILE, ReportDocument, ReportGenerator};
